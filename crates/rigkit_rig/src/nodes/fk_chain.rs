// SPDX-License-Identifier: MIT OR Apache-2.0
//! FK chain: one joint and one control per guide position.

use crate::args::{ArgKind, ArgSpec, ArgValue};
use crate::capability::{
    aimed, BuildsControls, BuildsJoints, ControlSpec, HasInputPorts, HasOutputPorts, JointSpec,
    Placement,
};
use crate::constraint::{constrain, Channels, Target, TargetWeight};
use crate::error::{RigError, RigResult};
use crate::lifecycle::{Lifecycle, RigContext, RigNode, RigNodeCore};
use crate::steps::Section;
use crate::transform::{self, ports};
use glam::{Mat4, Vec3};
use rigkit_graph::{NodeId, PortRef};

/// Forward-kinematics chain built from guide positions
#[derive(Debug, Clone)]
pub struct FkChain {
    core: RigNodeCore,
}

fn segment_token(index: usize) -> String {
    format!("seg{index:02}")
}

/// World matrices along `guides`, each aimed at the next guide. The last
/// one keeps the direction of the segment before it.
fn guide_frames(guides: &[Vec3]) -> Vec<Mat4> {
    (0..guides.len())
        .map(|i| {
            let direction = match (guides.get(i + 1), i.checked_sub(1)) {
                (Some(next), _) => *next - guides[i],
                (None, Some(prev)) => guides[i] - guides[prev],
                (None, None) => Vec3::X,
            };
            aimed(guides[i], direction)
        })
        .collect()
}

impl FkChain {
    fn frames(&self) -> RigResult<Vec<Mat4>> {
        let guides = self.core.args.vec3_list("guides")?;
        if guides.is_empty() {
            return Err(RigError::invalid_arg("guides", "at least one guide is required"));
        }
        Ok(guide_frames(&guides))
    }
}

fn constrain_joints(node: &mut FkChain, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let root = node.core.root()?;
    let pairs: Vec<(NodeId, NodeId)> = node
        .core
        .controls
        .iter()
        .copied()
        .zip(node.core.joints.iter().copied())
        .collect();
    for (i, (control, joint)) in pairs.into_iter().enumerate() {
        let name = node.core.compose_part(ctx, &segment_token(i), "cns")?;
        let target = Target {
            matrix: PortRef::new(control, ports::WORLD_MATRIX),
            weight: TargetWeight::Constant(1.0),
        };
        constrain(ctx, root, &name, &[target], joint, Channels::TRANSLATE_ROTATE, true)?;
    }
    Ok(())
}

fn publish_outputs(node: &mut FkChain, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let (Some(first), Some(last)) = (
        node.core.joints.first().copied(),
        node.core.joints.last().copied(),
    ) else {
        return Ok(());
    };
    transform::expose_output(
        ctx,
        &mut node.core,
        "start",
        &PortRef::new(first, ports::WORLD_MATRIX),
    )?;
    transform::expose_output(
        ctx,
        &mut node.core,
        "end",
        &PortRef::new(last, ports::WORLD_MATRIX),
    )?;
    Ok(())
}

impl RigNode for FkChain {
    const TYPE_TAG: &'static str = "fk_chain";

    fn from_core(core: RigNodeCore) -> Self {
        Self { core }
    }

    fn core(&self) -> &RigNodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RigNodeCore {
        &mut self.core
    }

    fn arg_specs(section: Section) -> Vec<ArgSpec> {
        match section {
            Section::Build => vec![
                ArgSpec::optional("guides", ArgKind::Vec3List).side_sensitive(),
                ArgSpec::with_default("shape", ArgKind::Str, ArgValue::Str("circle".into())),
                ArgSpec::with_default("size", ArgKind::Float, ArgValue::Float(1.0)),
            ],
            Section::Connect => transform::input_arg_specs(),
        }
    }

    fn register_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        Self::register_input_steps(lifecycle)?;
        Self::register_output_steps(lifecycle)?;
        Self::register_joint_steps(lifecycle)?;
        Self::register_control_steps(lifecycle)?;
        lifecycle.add_build_step(
            "constrain_joints",
            constrain_joints,
            Section::Build,
            Some("create_controls".into()),
        )?;
        lifecycle.add_build_step(
            "publish_outputs",
            publish_outputs,
            Section::Build,
            Some("constrain_joints".into()),
        )
    }

    fn output_driver(&self) -> Option<NodeId> {
        self.core.controls.last().copied()
    }
}

impl HasInputPorts for FkChain {}
impl HasOutputPorts for FkChain {}

impl BuildsJoints for FkChain {
    fn joint_layout(&self, _ctx: &RigContext<'_>) -> RigResult<Vec<JointSpec>> {
        Ok(self
            .frames()?
            .into_iter()
            .enumerate()
            .map(|(i, world)| JointSpec {
                token: segment_token(i),
                world,
                parent: Placement::Previous,
            })
            .collect())
    }
}

impl BuildsControls for FkChain {
    fn control_layout(&self, _ctx: &RigContext<'_>) -> RigResult<Vec<ControlSpec>> {
        let shape = self.core.args.str("shape")?;
        let size = self.core.args.float("size")?;
        Ok(self
            .frames()?
            .into_iter()
            .enumerate()
            .map(|(i, world)| ControlSpec {
                token: segment_token(i),
                world,
                parent: Placement::Previous,
                shape: shape.to_string(),
                size,
            })
            .collect())
    }
}
