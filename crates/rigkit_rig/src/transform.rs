// SPDX-License-Identifier: MIT OR Apache-2.0
//! Matrix composition protocol.
//!
//! Every rig node owns three groups: a root carrying metadata and matrix
//! ports, an input group whose placement is `offsetMatrix · inputMatrix`, and
//! an output group following `hierarchyMatrix`. Products are written
//! child-first (row-vector reading), so `A · B` applies `A` in the frame of
//! `B`; in glam's column convention that is `B * A`.
//!
//! | root port                | value                                    |
//! |--------------------------|------------------------------------------|
//! | `inputMatrix`            | incoming parent placement                |
//! | `offsetMatrix`           | frozen offset captured on attach         |
//! | `outputMatrix`           | `driver.world · inputInverseMatrix`      |
//! | `hierarchyMatrix`        | `outputMatrix · inputMatrix`             |
//! | `*InverseMatrix`         | inverses of the above                    |
//!
//! Attaching an input always freezes the offset before the connection is
//! made, so the rig keeps its world placement.

use crate::args::{ArgKind, ArgSpec};
use crate::error::{RigError, RigResult};
use crate::lifecycle::{RigContext, RigNode, RigNodeCore};
use glam::Mat4;
use rigkit_graph::{
    indexed, NodeId, NodeKind, Port, PortRef, PortType, PortValue, SceneGraph, TransformRole,
};

/// Port names used by the protocol
pub mod ports {
    /// Type tag of the rig node
    pub const RIG_TYPE: &str = "rigType";
    /// Side token
    pub const SIDE: &str = "side";
    /// Description token
    pub const DESCRIPTION: &str = "description";
    /// Index token
    pub const INDEX: &str = "index";
    /// Limb index, -1 when absent
    pub const LIMB_INDEX: &str = "limbIndex";
    /// Extra name tokens
    pub const EXTRA_TOKENS: &str = "extraTokens";
    /// Stored lifecycle stage
    pub const BUILD_STAGE: &str = "buildStage";
    /// Whether the build was mirrored
    pub const FLIPPED: &str = "flipped";
    /// Handle of the input group
    pub const INPUT_GROUP: &str = "inputGroup";
    /// Handle of the output group
    pub const OUTPUT_GROUP: &str = "outputGroup";
    /// Handle of the parent rig root
    pub const PARENT_RIG: &str = "parentRig";
    /// Joint handles
    pub const JOINTS: &str = "joints";
    /// Control handles
    pub const CONTROLS: &str = "controls";
    /// Owned utility node handles
    pub const HELPERS: &str = "helpers";
    /// Published output names
    pub const OUTPUT_NAMES: &str = "outputNames";

    /// Incoming parent placement
    pub const INPUT_MATRIX: &str = "inputMatrix";
    /// Inverse of the incoming placement
    pub const INPUT_INVERSE_MATRIX: &str = "inputInverseMatrix";
    /// Frozen attach offset
    pub const OFFSET_MATRIX: &str = "offsetMatrix";
    /// Output relative to the input
    pub const OUTPUT_MATRIX: &str = "outputMatrix";
    /// Inverse of the output
    pub const OUTPUT_INVERSE_MATRIX: &str = "outputInverseMatrix";
    /// Output in world space
    pub const HIERARCHY_MATRIX: &str = "hierarchyMatrix";
    /// Inverse of the world-space output
    pub const HIERARCHY_INVERSE_MATRIX: &str = "hierarchyInverseMatrix";

    /// Transform world matrix
    pub const WORLD_MATRIX: &str = "worldMatrix";
    /// Transform world inverse matrix
    pub const WORLD_INVERSE_MATRIX: &str = "worldInverseMatrix";
    /// Transform parent inverse matrix
    pub const PARENT_INVERSE_MATRIX: &str = "parentInverseMatrix";
    /// Transform offset parent matrix
    pub const OFFSET_PARENT_MATRIX: &str = "offsetParentMatrix";

    /// Root port carrying a named output
    pub fn output_port(name: &str) -> String {
        format!("out_{name}")
    }
}

/// Connect-section argument naming the node to attach under
pub const PARENT: &str = "parent";
/// Connect-section argument naming the source port on `parent`
pub const PARENT_PORT: &str = "parent_port";

/// Arguments every node with inputs accepts in its connect section
pub fn input_arg_specs() -> Vec<ArgSpec> {
    vec![
        ArgSpec::optional(PARENT, ArgKind::Node).side_sensitive(),
        ArgSpec::optional(PARENT_PORT, ArgKind::Str),
    ]
}

/// One factor of a matrix product
#[derive(Debug, Clone)]
pub enum MatrixTerm {
    /// Live value of a port
    Driven(PortRef),
    /// Constant baked at construction
    Constant(Mat4),
}

/// Create an owned MultMatrix over `terms`, child-first
pub fn mult_matrix(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    name: &str,
    terms: &[MatrixTerm],
) -> RigResult<PortRef> {
    let node = ctx.helper(owner, NodeKind::MultMatrix, name)?;
    for (i, term) in terms.iter().enumerate() {
        let port = indexed("matrixIn", i);
        ctx.graph.add_port(node, Port::input(&port, PortType::Mat4))?;
        match term {
            MatrixTerm::Driven(src) => {
                ctx.connect(src, &PortRef::new(node, &port))?;
            }
            MatrixTerm::Constant(m) => {
                ctx.set(node, &port, PortValue::Mat4(*m))?;
            }
        }
    }
    Ok(PortRef::new(node, "matrixSum"))
}

/// Create an owned InverseMatrix fed by `src`
pub fn inverse_matrix(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    name: &str,
    src: &PortRef,
) -> RigResult<PortRef> {
    let node = ctx.helper(owner, NodeKind::InverseMatrix, name)?;
    ctx.connect(src, &PortRef::new(node, "inputMatrix"))?;
    Ok(PortRef::new(node, "outputMatrix"))
}

fn locked(port: Port) -> Port {
    Port {
        locked: true,
        ..port
    }
}

/// Build step: create the root, input and output groups and the metadata
/// ports.
pub fn create_hierarchy<N: RigNode>(node: &mut N, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let core = node.core();
    let root_name = core.compose(ctx, "rig")?;
    let input_name = core.compose(ctx, "input")?;
    let output_name = core.compose(ctx, "output")?;

    let group = NodeKind::Transform(TransformRole::Group);
    let root = ctx.graph.create_node(group, &root_name, None)?;
    let input = ctx.graph.create_node(group, &input_name, Some(root))?;
    let output = ctx.graph.create_node(group, &output_name, Some(root))?;

    let name = &core.name;
    let limb = name.limb_index.map_or(-1, |i| i as i32);
    let meta = [
        (ports::RIG_TYPE, PortValue::String(N::TYPE_TAG.to_string())),
        (ports::SIDE, PortValue::String(name.side.clone())),
        (ports::DESCRIPTION, PortValue::String(name.description.clone())),
        (ports::INDEX, PortValue::Int(name.index as i32)),
        (ports::LIMB_INDEX, PortValue::Int(limb)),
        (ports::EXTRA_TOKENS, PortValue::StringList(name.extra.clone())),
        (ports::FLIPPED, PortValue::Bool(core.flipped)),
        (ports::INPUT_GROUP, PortValue::Handle(Some(input))),
        (ports::OUTPUT_GROUP, PortValue::Handle(Some(output))),
    ];
    for (port, value) in meta {
        let port_type = value.port_type();
        ctx.graph
            .add_port(root, locked(Port::input(port, port_type).with_default(value)))?;
    }
    ctx.graph.add_port(root, Port::input(ports::BUILD_STAGE, PortType::Int))?;
    ctx.graph
        .add_port(root, Port::input(ports::PARENT_RIG, PortType::Handle))?;
    for list in [ports::JOINTS, ports::CONTROLS, ports::HELPERS] {
        ctx.graph.add_port(root, Port::input(list, PortType::HandleList))?;
    }
    ctx.graph
        .add_port(root, Port::input(ports::OUTPUT_NAMES, PortType::StringList))?;

    let core = node.core_mut();
    core.root = Some(root);
    core.input = Some(input);
    core.output = Some(output);
    tracing::debug!("Created hierarchy for {} '{}'", N::TYPE_TAG, core.name);
    Ok(())
}

/// Build step: input matrix ports and the input group's placement.
pub fn register_inputs<N: RigNode>(node: &mut N, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let core = node.core();
    let root = core.root()?;
    let input = core.input()?;
    for port in [
        ports::INPUT_MATRIX,
        ports::OFFSET_MATRIX,
        ports::INPUT_INVERSE_MATRIX,
    ] {
        ctx.graph.add_port(root, Port::input(port, PortType::Mat4))?;
    }

    let placement_name = core.compose_part(ctx, "placement", "mm")?;
    let inverse_name = core.compose_part(ctx, "input", "inv")?;
    let placement = mult_matrix(
        ctx,
        root,
        &placement_name,
        &[
            MatrixTerm::Driven(PortRef::new(root, ports::OFFSET_MATRIX)),
            MatrixTerm::Driven(PortRef::new(root, ports::INPUT_MATRIX)),
        ],
    )?;
    ctx.connect(&placement, &PortRef::new(input, ports::OFFSET_PARENT_MATRIX))?;

    let inverse = inverse_matrix(
        ctx,
        root,
        &inverse_name,
        &PortRef::new(root, ports::INPUT_MATRIX),
    )?;
    ctx.connect(&inverse, &PortRef::new(root, ports::INPUT_INVERSE_MATRIX))?;
    Ok(())
}

/// Build step: output and hierarchy matrix ports and the output group's
/// placement.
pub fn register_outputs<N: RigNode>(node: &mut N, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let core = node.core();
    let root = core.root()?;
    let output = core.output()?;
    for port in [
        ports::OUTPUT_MATRIX,
        ports::OUTPUT_INVERSE_MATRIX,
        ports::HIERARCHY_MATRIX,
        ports::HIERARCHY_INVERSE_MATRIX,
    ] {
        ctx.graph.add_port(root, Port::input(port, PortType::Mat4))?;
    }

    let hierarchy_name = core.compose_part(ctx, "hierarchy", "mm")?;
    let output_inverse_name = core.compose_part(ctx, "output", "inv")?;
    let hierarchy_inverse_name = core.compose_part(ctx, "hierarchy", "inv")?;
    let hierarchy = mult_matrix(
        ctx,
        root,
        &hierarchy_name,
        &[
            MatrixTerm::Driven(PortRef::new(root, ports::OUTPUT_MATRIX)),
            MatrixTerm::Driven(PortRef::new(root, ports::INPUT_MATRIX)),
        ],
    )?;
    ctx.connect(&hierarchy, &PortRef::new(root, ports::HIERARCHY_MATRIX))?;

    let output_inverse = inverse_matrix(
        ctx,
        root,
        &output_inverse_name,
        &PortRef::new(root, ports::OUTPUT_MATRIX),
    )?;
    ctx.connect(&output_inverse, &PortRef::new(root, ports::OUTPUT_INVERSE_MATRIX))?;

    let hierarchy_inverse = inverse_matrix(
        ctx,
        root,
        &hierarchy_inverse_name,
        &PortRef::new(root, ports::HIERARCHY_MATRIX),
    )?;
    ctx.connect(
        &hierarchy_inverse,
        &PortRef::new(root, ports::HIERARCHY_INVERSE_MATRIX),
    )?;

    ctx.connect(
        &PortRef::new(root, ports::HIERARCHY_MATRIX),
        &PortRef::new(output, ports::OFFSET_PARENT_MATRIX),
    )?;
    Ok(())
}

/// Drive `outputMatrix` from `driver`'s world matrix, relative to the input.
/// Does nothing when the output is already driven.
pub fn drive_output(ctx: &mut RigContext<'_>, core: &RigNodeCore, driver: NodeId) -> RigResult<()> {
    let root = core.root()?;
    let dst = PortRef::new(root, ports::OUTPUT_MATRIX);
    if ctx.graph.source(&dst)?.is_some() {
        return Ok(());
    }
    let name = core.compose_part(ctx, "output", "mm")?;
    let local = mult_matrix(
        ctx,
        root,
        &name,
        &[
            MatrixTerm::Driven(PortRef::new(driver, ports::WORLD_MATRIX)),
            MatrixTerm::Driven(PortRef::new(root, ports::INPUT_INVERSE_MATRIX)),
        ],
    )?;
    ctx.connect(&local, &dst)?;
    Ok(())
}

/// Publish a named output on the root, driven by `source`
pub fn expose_output(
    ctx: &mut RigContext<'_>,
    core: &mut RigNodeCore,
    name: &str,
    source: &PortRef,
) -> RigResult<PortRef> {
    let root = core.root()?;
    let port = ports::output_port(name);
    ctx.graph.add_port(root, Port::input(&port, PortType::Mat4))?;
    let published = PortRef::new(root, &port);
    ctx.connect(source, &published)?;

    let mut names = match ctx.graph.get(root, ports::OUTPUT_NAMES)? {
        PortValue::StringList(names) => names,
        _ => Vec::new(),
    };
    names.push(name.to_string());
    ctx.graph
        .set(root, ports::OUTPUT_NAMES, PortValue::StringList(names), true)?;
    core.outputs.push(name.to_string());
    Ok(published)
}

/// Offset that keeps `placement` once `incoming` drives the input:
/// `offset · incoming == placement`.
pub fn freeze_offset(placement: Mat4, incoming: Mat4) -> Mat4 {
    incoming.inverse() * placement
}

/// Current placement of a rig's input group, `offsetMatrix · inputMatrix`
pub fn current_placement(graph: &dyn SceneGraph, root: NodeId) -> RigResult<Mat4> {
    let input = graph.get_matrix(root, ports::INPUT_MATRIX)?;
    let offset = graph.get_matrix(root, ports::OFFSET_MATRIX)?;
    Ok(input * offset)
}

/// Rig root owning `node`: the node itself or its nearest rig ancestor
pub fn owning_rig(graph: &dyn SceneGraph, node: NodeId) -> RigResult<Option<NodeId>> {
    let mut current = Some(node);
    while let Some(id) = current {
        if graph.has_port(id, ports::RIG_TYPE) {
            return Ok(Some(id));
        }
        current = graph.parent(id)?;
    }
    Ok(None)
}

/// Attach a rig's input to `source`, freezing the offset first so nothing
/// moves. An input already driven by another source is left alone with a
/// warning unless `force` is set. Returns the new parent rig.
pub fn attach_input(
    ctx: &mut RigContext<'_>,
    root: NodeId,
    source: &PortRef,
    force: bool,
) -> RigResult<Option<NodeId>> {
    let dst = PortRef::new(root, ports::INPUT_MATRIX);
    let parent_rig = owning_rig(&*ctx.graph, source.node)?;
    if parent_rig == Some(root) {
        return Err(RigError::invalid_arg(
            PARENT,
            "a rig cannot be attached to itself",
        ));
    }

    if let Some(existing) = ctx.graph.source(&dst)? {
        if existing == *source {
            return Ok(parent_rig);
        }
        if !force {
            tracing::warn!(
                "Input of '{}' is already driven; use reconnect to replace it",
                ctx.graph.node_name(root)?
            );
            return Ok(ctx.graph.get(root, ports::PARENT_RIG)?.as_handle().flatten());
        }
    }

    let placement = current_placement(&*ctx.graph, root)?;
    let incoming = ctx.graph.get_matrix(source.node, &source.port)?;
    let offset = freeze_offset(placement, incoming);
    ctx.graph
        .set(root, ports::OFFSET_MATRIX, PortValue::Mat4(offset), true)?;
    ctx.graph.connect(source, &dst, true)?;
    ctx.graph
        .set(root, ports::PARENT_RIG, PortValue::Handle(parent_rig), true)?;
    tracing::debug!(
        "Attached '{}' under {}",
        ctx.graph.node_name(root)?,
        source
    );
    Ok(parent_rig)
}

/// Break a rig's input connection, keeping its current value so nothing
/// moves.
pub fn detach_input(ctx: &mut RigContext<'_>, root: NodeId) -> RigResult<()> {
    let dst = PortRef::new(root, ports::INPUT_MATRIX);
    let current = ctx.graph.get_matrix(root, ports::INPUT_MATRIX)?;
    if ctx.graph.disconnect(&dst)?.is_some() {
        ctx.graph
            .set(root, ports::INPUT_MATRIX, PortValue::Mat4(current), true)?;
    }
    ctx.graph
        .set(root, ports::PARENT_RIG, PortValue::Handle(None), true)?;
    Ok(())
}

fn default_source_port(graph: &dyn SceneGraph, node: NodeId) -> &'static str {
    if graph.has_port(node, ports::HIERARCHY_MATRIX) {
        ports::HIERARCHY_MATRIX
    } else {
        ports::WORLD_MATRIX
    }
}

/// Connect step: attach the input to the `parent` argument, if any.
pub fn connect_inputs<N: RigNode>(node: &mut N, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let args = &node.core().args;
    let Some(parent) = args.opt_node(PARENT)? else {
        return Ok(());
    };
    let port = match args.opt_str(PARENT_PORT)? {
        Some(port) => port.to_string(),
        None => default_source_port(&*ctx.graph, parent).to_string(),
    };
    let root = node.core().root()?;
    let parent_rig = attach_input(ctx, root, &PortRef::new(parent, port), false)?;
    node.core_mut().parent = parent_rig;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use rigkit_graph::math::matrices_close;

    #[test]
    fn test_freeze_offset_preserves_placement() {
        let placement = Mat4::from_rotation_translation(
            Quat::from_rotation_z(0.4),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let incoming = Mat4::from_rotation_translation(
            Quat::from_rotation_y(-1.1),
            Vec3::new(-4.0, 0.5, 2.0),
        );
        let offset = freeze_offset(placement, incoming);
        // offset · incoming, child-first
        assert!(matrices_close(incoming * offset, placement, 1e-5));
    }

    #[test]
    fn test_output_port_name() {
        assert_eq!(ports::output_port("end"), "out_end");
    }
}
