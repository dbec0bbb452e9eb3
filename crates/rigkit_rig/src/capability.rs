// SPDX-License-Identifier: MIT OR Apache-2.0
//! Composable capabilities a rig node type can opt into.
//!
//! Each capability contributes named steps to the type's [`Lifecycle`]. A
//! type calls the `register_*_steps` helpers of the capabilities it
//! implements from its own `register_steps`, then adds its own steps,
//! usually anchored after a capability step.

use crate::error::{RigError, RigResult};
use crate::lifecycle::{Lifecycle, RigContext, RigNode};
use crate::steps::Section;
use crate::transform::{self, ports};
use glam::{Mat4, Quat, Vec3};
use rigkit_graph::{math, NodeId, NodeKind, Port, PortType, PortValue, TransformRole};

/// Control port holding the display size of its shape
pub const SHAPE_SIZE: &str = "shapeSize";

/// Input group, input matrix ports and the `connect_inputs` step
pub trait HasInputPorts: RigNode {
    /// Register `create_hierarchy`, `register_inputs` and `connect_inputs`
    fn register_input_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        lifecycle.add_build_step(
            "create_hierarchy",
            transform::create_hierarchy::<Self>,
            Section::Build,
            None,
        )?;
        lifecycle.add_build_step(
            "register_inputs",
            transform::register_inputs::<Self>,
            Section::Build,
            None,
        )?;
        lifecycle.add_build_step(
            "connect_inputs",
            transform::connect_inputs::<Self>,
            Section::Connect,
            None,
        )
    }
}

/// Output group and output/hierarchy matrix ports
pub trait HasOutputPorts: HasInputPorts {
    /// Register `register_outputs`
    fn register_output_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        lifecycle.add_build_step(
            "register_outputs",
            transform::register_outputs::<Self>,
            Section::Build,
            None,
        )
    }
}

/// What a joint or control hangs under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Directly under the input group
    Content,
    /// Under the previously created element of the same kind
    Previous,
    /// Under the joint at this index
    Joint(usize),
    /// Under the control at this index
    Control(usize),
}

/// Layout of one joint
#[derive(Debug, Clone)]
pub struct JointSpec {
    /// Extra name token
    pub token: String,
    /// World matrix at build time
    pub world: Mat4,
    /// Hierarchy parent
    pub parent: Placement,
}

/// Layout of one control
#[derive(Debug, Clone)]
pub struct ControlSpec {
    /// Extra name token
    pub token: String,
    /// World matrix at build time
    pub world: Mat4,
    /// Hierarchy parent
    pub parent: Placement,
    /// Display shape
    pub shape: String,
    /// Display size of the shape
    pub size: f32,
}

/// Joints laid out from a type-provided list
pub trait BuildsJoints: HasOutputPorts {
    /// Joints to create, in order
    fn joint_layout(&self, ctx: &RigContext<'_>) -> RigResult<Vec<JointSpec>>;

    /// Register `create_joints`
    fn register_joint_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        lifecycle.add_build_step("create_joints", create_joints::<Self>, Section::Build, None)
    }
}

/// Controls laid out from a type-provided list
pub trait BuildsControls: HasOutputPorts {
    /// Controls to create, in order
    fn control_layout(&self, ctx: &RigContext<'_>) -> RigResult<Vec<ControlSpec>>;

    /// Register `create_controls`
    fn register_control_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        lifecycle.add_build_step(
            "create_controls",
            create_controls::<Self>,
            Section::Build,
            None,
        )
    }
}

/// World matrix at `position` whose X axis points along `direction`
pub fn aimed(position: Vec3, direction: Vec3) -> Mat4 {
    let rotation = match direction.try_normalize() {
        Some(dir) => Quat::from_rotation_arc(Vec3::X, dir),
        None => Quat::IDENTITY,
    };
    Mat4::from_rotation_translation(rotation, position)
}

fn resolve_parent(
    placement: Placement,
    content: NodeId,
    previous: Option<NodeId>,
    joints: &[NodeId],
    controls: &[NodeId],
) -> RigResult<NodeId> {
    let missing = |what: &str, index: usize| {
        RigError::invalid_arg("layout", format!("{what} {index} does not exist yet"))
    };
    Ok(match placement {
        Placement::Content => content,
        Placement::Previous => previous.unwrap_or(content),
        Placement::Joint(i) => *joints.get(i).ok_or_else(|| missing("joint", i))?,
        Placement::Control(i) => *controls.get(i).ok_or_else(|| missing("control", i))?,
    })
}

/// Create a transform under `parent` whose world matrix is `world`
pub fn place_transform(
    ctx: &mut RigContext<'_>,
    role: TransformRole,
    name: &str,
    parent: NodeId,
    world: Mat4,
) -> RigResult<NodeId> {
    let node = ctx
        .graph
        .create_node(NodeKind::Transform(role), name, Some(parent))?;
    let parent_world = ctx.graph.get_matrix(parent, ports::WORLD_MATRIX)?;
    let (translate, rotate, scale) = math::decompose_trs(parent_world.inverse() * world);
    for (channel, value) in [("translate", translate), ("rotate", rotate), ("scale", scale)] {
        for (axis, component) in ["X", "Y", "Z"].into_iter().zip(value.to_array()) {
            ctx.set(node, &format!("{channel}{axis}"), PortValue::Float(component))?;
        }
    }
    Ok(node)
}

/// Build step: create the joints of a [`BuildsJoints`] type
pub fn create_joints<N: BuildsJoints>(node: &mut N, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let layout = node.joint_layout(ctx)?;
    let core = node.core();
    let root = core.root()?;
    let content = core.input()?;

    let mut created: Vec<NodeId> = core.joints.clone();
    for spec in layout {
        let name = core.compose_part(ctx, &spec.token, "jnt")?;
        let parent = resolve_parent(
            spec.parent,
            content,
            created.last().copied(),
            &created,
            &core.controls,
        )?;
        let joint = place_transform(ctx, TransformRole::Joint, &name, parent, spec.world)?;
        ctx.graph.append_handle(root, ports::JOINTS, joint)?;
        created.push(joint);
    }
    tracing::debug!("Created {} joints for '{}'", created.len(), core.name);
    node.core_mut().joints = created;
    Ok(())
}

/// Build step: create the controls of a [`BuildsControls`] type.
///
/// Each control sits under a zero group carrying its placement, so the
/// control's own channels start at rest values.
pub fn create_controls<N: BuildsControls>(
    node: &mut N,
    ctx: &mut RigContext<'_>,
) -> RigResult<()> {
    let layout = node.control_layout(ctx)?;
    let core = node.core();
    let root = core.root()?;
    let content = core.input()?;

    let mut created: Vec<NodeId> = core.controls.clone();
    for spec in layout {
        let zero_name = core.compose_part(ctx, &spec.token, "zero")?;
        let control_name = core.compose_part(ctx, &spec.token, "ctl")?;
        let parent = resolve_parent(
            spec.parent,
            content,
            created.last().copied(),
            &core.joints,
            &created,
        )?;
        let zero = place_transform(ctx, TransformRole::Group, &zero_name, parent, spec.world)?;
        let control = ctx.graph.create_node(
            NodeKind::Transform(TransformRole::Control),
            &control_name,
            Some(zero),
        )?;
        ctx.set(control, "shape", PortValue::String(spec.shape))?;
        ctx.graph.add_port(
            control,
            Port::input(SHAPE_SIZE, PortType::Float).with_default(PortValue::Float(spec.size)),
        )?;
        ctx.graph.append_handle(root, ports::CONTROLS, control)?;
        created.push(control);
    }
    node.core_mut().controls = created;
    Ok(())
}
