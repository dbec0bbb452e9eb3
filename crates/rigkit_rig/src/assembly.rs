// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig assembly from a RON description, and explicit teardown.
//!
//! A description lists rig nodes in construction order. Each entry is
//! built and then connected before the next one starts, so an entry may
//! name any earlier rig as its `parent`.

use crate::args::BuildArgs;
use crate::config::RigConfig;
use crate::error::{RigError, RigResult};
use crate::info::rig_roots;
use crate::lifecycle::RigContext;
use crate::naming::NameTuple;
use crate::registry::{DynRigNode, RigRegistry};
use crate::transform::{detach_input, ports};
use rigkit_graph::{NodeId, SceneGraph};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One rig node to construct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigNodeDescription {
    /// Registered type tag
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Structured name
    pub name: NameTuple,
    /// Build section arguments
    #[serde(default)]
    pub build: BuildArgs,
    /// Connect section arguments
    #[serde(default)]
    pub connect: BuildArgs,
}

/// A whole rig: optional configuration and ordered rig nodes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigDescription {
    /// Configuration; defaults apply when absent
    pub config: Option<RigConfig>,
    /// Rig nodes, in construction order
    pub nodes: Vec<RigNodeDescription>,
}

impl RigDescription {
    /// Parse a RON description. An embedded config is validated.
    pub fn from_ron(source: &str) -> RigResult<Self> {
        let description: Self =
            ron::from_str(source).map_err(|e| RigError::Description(e.to_string()))?;
        if let Some(config) = &description.config {
            config.validate()?;
        }
        Ok(description)
    }

    /// Load a RON description file
    pub fn load(path: impl AsRef<Path>) -> RigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron(&source)
    }

    /// Embedded config, or the default one
    pub fn config(&self) -> RigConfig {
        self.config.clone().unwrap_or_default()
    }
}

/// Build and connect every entry of `description`, in order.
///
/// Stops at the first failing entry; rig nodes constructed before it stay
/// in the graph.
pub fn assemble(
    ctx: &mut RigContext<'_>,
    registry: &RigRegistry,
    description: &RigDescription,
) -> RigResult<Vec<Box<dyn DynRigNode>>> {
    let mut built = Vec::with_capacity(description.nodes.len());
    for entry in &description.nodes {
        let mut node = registry.create(&entry.type_tag, entry.name.clone())?;
        node.build_dyn(ctx, entry.build.clone())?;
        node.connect_dyn(ctx, entry.connect.clone())?;
        built.push(node);
    }
    tracing::info!("Assembled {} rig nodes", built.len());
    Ok(built)
}

/// Rig roots attached under `root`
pub fn child_rigs(graph: &dyn SceneGraph, root: NodeId) -> RigResult<Vec<NodeId>> {
    let mut children = Vec::new();
    for candidate in rig_roots(graph) {
        if graph.get(candidate, ports::PARENT_RIG)?.as_handle().flatten() == Some(root) {
            children.push(candidate);
        }
    }
    Ok(children)
}

/// Remove a rig node and everything it owns.
///
/// Child rigs are detached first and keep their current placement. Then
/// the owned helper nodes are deleted, then the root with its hierarchy.
pub fn remove_rig(ctx: &mut RigContext<'_>, root: NodeId) -> RigResult<()> {
    let name = ctx.graph.node_name(root)?;
    for child in child_rigs(&*ctx.graph, root)? {
        tracing::debug!(
            "Detaching '{}' from '{}'",
            ctx.graph.node_name(child)?,
            name
        );
        detach_input(ctx, child)?;
    }

    let existing = ctx.graph.nodes();
    let helpers = ctx.graph.get_handles(root, ports::HELPERS)?;
    for helper in helpers.into_iter().filter(|h| existing.contains(h)) {
        ctx.graph.delete_node(helper)?;
    }
    ctx.graph.delete_node(root)?;
    tracing::info!("Removed rig '{}'", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Stage;
    use glam::Vec3;
    use rigkit_graph::{Graph, PortValue};

    const RIG: &str = r#"(
        nodes: [
            (
                type: "master",
                name: (side: "C", description: "master"),
                build: { "size": Float(4.0) },
            ),
            (
                type: "fk_chain",
                name: (side: "L", description: "arm", index: 0),
                build: { "guides": Vec3List([(1.0, 0.0, 0.0), (3.0, 0.0, 0.0)]) },
                connect: { "parent": Str("C_master_00_rig") },
            ),
        ],
    )"#;

    fn assembled(graph: &mut Graph) -> Vec<NodeId> {
        let description = RigDescription::from_ron(RIG).unwrap();
        let config = description.config();
        let registry = RigRegistry::with_builtin();
        let mut ctx = RigContext::new(graph, &config);
        assemble(&mut ctx, &registry, &description)
            .unwrap()
            .iter()
            .map(|node| node.rig_core().root().unwrap())
            .collect()
    }

    fn joint_position(graph: &Graph, name: &str) -> Vec3 {
        let joint = graph.find_node(name).unwrap();
        graph
            .get_matrix(joint, ports::WORLD_MATRIX)
            .unwrap()
            .w_axis
            .truncate()
    }

    #[test]
    fn test_description_parses() {
        let description = RigDescription::from_ron(RIG).unwrap();
        assert_eq!(description.nodes.len(), 2);
        assert_eq!(description.nodes[1].type_tag, "fk_chain");
        assert!(description.config.is_none());
        assert!(description.nodes[0].connect.iter().next().is_none());
    }

    #[test]
    fn test_bad_description_is_reported() {
        let err = RigDescription::from_ron("(nodes: [(type: 3)])").unwrap_err();
        assert!(matches!(err, RigError::Description(_)));
    }

    #[test]
    fn test_child_follows_parent() {
        let mut graph = Graph::new("assembly");
        let roots = assembled(&mut graph);
        assert_eq!(child_rigs(&graph, roots[0]).unwrap(), vec![roots[1]]);

        let before = joint_position(&graph, "L_arm_00_seg01_jnt");
        assert!((before - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-4);

        let global = graph.find_node("C_master_00_global_ctl").unwrap();
        graph
            .set(global, "translateY", PortValue::Float(3.0), false)
            .unwrap();
        let after = joint_position(&graph, "L_arm_00_seg01_jnt");
        assert!((after - Vec3::new(3.0, 3.0, 0.0)).length() < 1e-4, "{after:?}");
    }

    #[test]
    fn test_late_attach_keeps_placement() {
        let full = RigDescription::from_ron(RIG).unwrap();
        let config = full.config();
        let registry = RigRegistry::with_builtin();
        let part = |range: std::ops::Range<usize>| RigDescription {
            config: None,
            nodes: full.nodes[range].to_vec(),
        };

        let mut graph = Graph::new("assembly");
        {
            let mut ctx = RigContext::new(&mut graph, &config);
            assemble(&mut ctx, &registry, &part(0..1)).unwrap();
        }
        let global = graph.find_node("C_master_00_global_ctl").unwrap();
        graph.set(global, "translateX", PortValue::Float(-2.0), false).unwrap();
        graph.set(global, "translateZ", PortValue::Float(5.0), false).unwrap();
        graph.set(global, "rotateY", PortValue::Float(30.0), false).unwrap();
        {
            let mut ctx = RigContext::new(&mut graph, &config);
            assemble(&mut ctx, &registry, &part(1..2)).unwrap();
        }

        let attached = joint_position(&graph, "L_arm_00_seg01_jnt");
        assert!((attached - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-4, "{attached:?}");

        graph.set(global, "translateY", PortValue::Float(1.0), false).unwrap();
        let moved = joint_position(&graph, "L_arm_00_seg01_jnt");
        assert!((moved - attached - Vec3::Y).length() < 1e-4, "{moved:?}");
    }

    #[test]
    fn test_remove_rig_detaches_children() {
        let mut graph = Graph::new("assembly");
        let roots = assembled(&mut graph);
        let global = graph.find_node("C_master_00_global_ctl").unwrap();
        graph
            .set(global, "translateY", PortValue::Float(3.0), false)
            .unwrap();
        let helpers = graph.get_handles(roots[0], ports::HELPERS).unwrap();
        assert!(!helpers.is_empty());

        let config = RigConfig::default();
        let mut ctx = RigContext::new(&mut graph, &config);
        remove_rig(&mut ctx, roots[0]).unwrap();

        assert!(graph.find_node("C_master_00_rig").is_none());
        assert!(graph.find_node("C_master_00_global_ctl").is_none());
        let nodes = graph.nodes();
        assert!(helpers.iter().all(|h| !nodes.contains(h)));

        let child = graph.get(roots[1], ports::PARENT_RIG).unwrap();
        assert_eq!(child.as_handle().flatten(), None);
        let kept = joint_position(&graph, "L_arm_00_seg01_jnt");
        assert!((kept - Vec3::new(3.0, 3.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_demo_rig_assembles() {
        let description = RigDescription::from_ron(include_str!("../../../demos/arm.ron")).unwrap();
        let config = description.config();
        let registry = RigRegistry::with_builtin();
        let mut graph = Graph::new("demo");
        let mut ctx = RigContext::new(&mut graph, &config);
        let nodes = assemble(&mut ctx, &registry, &description).unwrap();

        assert_eq!(nodes.len(), description.nodes.len());
        assert!(nodes
            .iter()
            .all(|n| n.rig_core().stage == Stage::Connected));
        assert!(graph.find_node("R_leg_00_rig").is_some());
        assert_eq!(rig_roots(&graph).len(), nodes.len());
    }
}
