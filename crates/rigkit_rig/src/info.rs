// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rehydration: reading a rig node's state back from its root.
//!
//! Everything here reads the fixed metadata ports written by
//! `create_hierarchy` and the matrix ports of the composition protocol.
//! Nothing outside the graph is consulted.

use crate::error::{RigError, RigResult};
use crate::lifecycle::{RigNodeCore, Stage};
use crate::naming::NameTuple;
use crate::transform::ports;
use glam::Mat4;
use rigkit_graph::{NodeId, PortValue, SceneGraph};
use serde::Serialize;

/// Identity and progress of a rig node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigInfo {
    /// Type tag
    pub type_tag: String,
    /// Structured name
    pub name: NameTuple,
    /// Root group
    pub root: NodeId,
    /// Scene name of the root
    pub root_name: String,
    /// Lifecycle progress
    pub stage: Stage,
    /// Whether the build was mirrored
    pub flipped: bool,
    /// Number of owned utility nodes
    pub helper_count: usize,
}

/// Input side of a rig node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigInputInfo {
    /// Input group
    pub input_group: Option<NodeId>,
    /// Rig this one hangs under
    pub parent: Option<NodeId>,
    /// Current incoming placement
    pub input_matrix: Option<Mat4>,
    /// Frozen attach offset
    pub offset_matrix: Option<Mat4>,
}

/// Output side of a rig node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigOutputInfo {
    /// Output group
    pub output_group: Option<NodeId>,
    /// Joints, in creation order
    pub joints: Vec<NodeId>,
    /// Controls, in creation order
    pub controls: Vec<NodeId>,
    /// Published output names, in creation order
    pub outputs: Vec<String>,
    /// Current world-space output
    pub hierarchy_matrix: Option<Mat4>,
}

/// Whether `node` is the root of a rig node
pub fn is_rig_root(graph: &dyn SceneGraph, node: NodeId) -> bool {
    graph.has_port(node, ports::RIG_TYPE)
}

/// Every rig root in the graph, in creation order
pub fn rig_roots(graph: &dyn SceneGraph) -> Vec<NodeId> {
    graph
        .nodes()
        .into_iter()
        .filter(|node| is_rig_root(graph, *node))
        .collect()
}

fn optional_matrix(graph: &dyn SceneGraph, node: NodeId, port: &str) -> RigResult<Option<Mat4>> {
    if !graph.has_port(node, port) {
        return Ok(None);
    }
    Ok(Some(graph.get_matrix(node, port)?))
}

fn handle(graph: &dyn SceneGraph, node: NodeId, port: &str) -> RigResult<Option<NodeId>> {
    Ok(graph.get(node, port)?.as_handle().flatten())
}

fn string_list(graph: &dyn SceneGraph, node: NodeId, port: &str) -> RigResult<Vec<String>> {
    Ok(match graph.get(node, port)? {
        PortValue::StringList(list) => list,
        _ => Vec::new(),
    })
}

fn stored_index(port: &'static str, value: i32) -> RigResult<u32> {
    u32::try_from(value).map_err(|_| RigError::StoredValue {
        port,
        value: i64::from(value),
    })
}

/// Read identity and progress from a rig root
pub fn get_info(graph: &dyn SceneGraph, root: NodeId) -> RigResult<RigInfo> {
    let limb = match graph.get_int(root, ports::LIMB_INDEX)? {
        -1 => None,
        value => Some(stored_index(ports::LIMB_INDEX, value)?),
    };
    let name = NameTuple {
        side: graph.get_string(root, ports::SIDE)?,
        description: graph.get_string(root, ports::DESCRIPTION)?,
        index: stored_index(ports::INDEX, graph.get_int(root, ports::INDEX)?)?,
        limb_index: limb,
        extra: string_list(graph, root, ports::EXTRA_TOKENS)?,
    };
    let flipped = graph
        .get(root, ports::FLIPPED)?
        .as_bool()
        .unwrap_or_default();
    Ok(RigInfo {
        type_tag: graph.get_string(root, ports::RIG_TYPE)?,
        name,
        root,
        root_name: graph.node_name(root)?,
        stage: Stage::from_int(graph.get_int(root, ports::BUILD_STAGE)?),
        flipped,
        helper_count: graph.get_handles(root, ports::HELPERS)?.len(),
    })
}

/// Read the input side of a rig root
pub fn get_input_info(graph: &dyn SceneGraph, root: NodeId) -> RigResult<RigInputInfo> {
    Ok(RigInputInfo {
        input_group: handle(graph, root, ports::INPUT_GROUP)?,
        parent: handle(graph, root, ports::PARENT_RIG)?,
        input_matrix: optional_matrix(graph, root, ports::INPUT_MATRIX)?,
        offset_matrix: optional_matrix(graph, root, ports::OFFSET_MATRIX)?,
    })
}

/// Read the output side of a rig root
pub fn get_output_info(graph: &dyn SceneGraph, root: NodeId) -> RigResult<RigOutputInfo> {
    Ok(RigOutputInfo {
        output_group: handle(graph, root, ports::OUTPUT_GROUP)?,
        joints: graph.get_handles(root, ports::JOINTS)?,
        controls: graph.get_handles(root, ports::CONTROLS)?,
        outputs: string_list(graph, root, ports::OUTPUT_NAMES)?,
        hierarchy_matrix: optional_matrix(graph, root, ports::HIERARCHY_MATRIX)?,
    })
}

impl RigNodeCore {
    /// Rebuild a core from a rig root.
    ///
    /// Arguments are not persisted; the rehydrated core starts with none.
    pub fn from_graph(graph: &dyn SceneGraph, root: NodeId) -> RigResult<Self> {
        let info = get_info(graph, root)?;
        let input = get_input_info(graph, root)?;
        let output = get_output_info(graph, root)?;
        let mut core = Self::new(info.name);
        core.root = Some(root);
        core.input = input.input_group;
        core.output = output.output_group;
        core.parent = input.parent;
        core.joints = output.joints;
        core.controls = output.controls;
        core.outputs = output.outputs;
        core.stage = info.stage;
        core.flipped = info.flipped;
        Ok(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::BuildArgs;
    use crate::config::RigConfig;
    use crate::lifecycle::{RigContext, RigNode};
    use crate::nodes::Master;
    use rigkit_graph::Graph;

    fn built_master(graph: &mut Graph, name: NameTuple) -> NodeId {
        let config = RigConfig::default();
        let mut ctx = RigContext::new(graph, &config);
        let mut master = Master::from_core(RigNodeCore::new(name));
        master.build(&mut ctx, BuildArgs::new()).unwrap();
        master.core().root().unwrap()
    }

    #[test]
    fn test_info_reads_name_back() {
        let mut graph = Graph::new("info");
        let name = NameTuple::new("C", "master", 2).with_limb_index(1);
        let root = built_master(&mut graph, name.clone());
        let info = get_info(&graph, root).unwrap();
        assert_eq!(info.name, name);
        assert_eq!(info.stage, Stage::Built);
        assert!(rig_roots(&graph).contains(&root));
    }

    #[test]
    fn test_corrupt_index_is_reported() {
        let mut graph = Graph::new("info");
        let root = built_master(&mut graph, NameTuple::new("C", "master", 0));
        graph.set(root, ports::INDEX, PortValue::Int(-3), true).unwrap();
        let err = get_info(&graph, root).unwrap_err();
        assert!(matches!(err, RigError::StoredValue { value: -3, .. }));

        graph.set(root, ports::INDEX, PortValue::Int(0), true).unwrap();
        graph.set(root, ports::LIMB_INDEX, PortValue::Int(-7), true).unwrap();
        assert!(get_info(&graph, root).is_err());
    }
}
