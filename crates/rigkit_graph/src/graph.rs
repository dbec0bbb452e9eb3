// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory reference host: an arena of nodes and connections.
//!
//! Values are pulled lazily and cached per port until something upstream
//! changes. A write invalidates the written node and everything reachable
//! downstream of it, both through connections and through the transform
//! hierarchy.

use crate::connection::{Connection, ConnectionId, PortRef};
use crate::evaluation;
use crate::node::{Node, NodeId, NodeKind, NodeRegistry};
use crate::port::{Port, PortDirection, PortType, PortValue};
use crate::primitives::create_primitive_registry;
use crate::scene::{GraphError, GraphResult, SceneGraph, WriteOutcome};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

type PortKey = (NodeId, String);

/// A scene graph document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Document name
    pub name: String,
    /// Nodes in creation order
    nodes: IndexMap<NodeId, Node>,
    /// Connections between ports
    connections: IndexMap<ConnectionId, Connection>,
    /// Primitive templates
    #[serde(skip, default = "create_primitive_registry")]
    registry: NodeRegistry,
    /// Pulled values, valid until invalidated
    #[serde(skip)]
    cache: RefCell<HashMap<PortKey, PortValue>>,
    /// Ports currently being computed, for cycle detection
    #[serde(skip)]
    in_flight: RefCell<HashSet<PortKey>>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            registry: create_primitive_registry(),
            cache: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(HashSet::new()),
        }
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of cached port values (for diagnostics)
    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Serialize the document to RON
    pub fn to_ron(&self) -> GraphResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GraphError::Serialization(e.to_string()))
    }

    /// Load a document from RON
    pub fn from_ron(source: &str) -> GraphResult<Self> {
        ron::from_str(source).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    fn require(&self, node_id: NodeId) -> GraphResult<&Node> {
        self.nodes
            .get(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))
    }

    fn require_port(&self, node_id: NodeId, port: &str) -> GraphResult<&Port> {
        let node = self.require(node_id)?;
        node.port(port).ok_or_else(|| GraphError::PortNotFound {
            node: node.name.clone(),
            port: port.to_string(),
        })
    }

    fn port_mut(&mut self, node_id: NodeId, port: &str) -> GraphResult<&mut Port> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let node_name = node.name.clone();
        node.port_mut(port).ok_or(GraphError::PortNotFound {
            node: node_name,
            port: port.to_string(),
        })
    }

    fn display(&self, port: &PortRef) -> String {
        match self.nodes.get(&port.node) {
            Some(node) => format!("{}.{}", node.name, port.port),
            None => port.to_string(),
        }
    }

    fn driver(&self, node_id: NodeId, port: &str) -> Option<(ConnectionId, PortRef)> {
        self.connections
            .values()
            .find(|c| c.drives(node_id, port))
            .map(|c| (c.id, c.from.clone()))
    }

    fn unique_name(&self, name: &str) -> String {
        if self.find_node(name).is_none() {
            return name.to_string();
        }
        (1..)
            .map(|i| format!("{name}{i}"))
            .find(|candidate| self.find_node(candidate).is_none())
            .unwrap_or_else(|| name.to_string())
    }

    fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![root];
        let mut i = 0;
        while i < out.len() {
            let current = out[i];
            out.extend(
                self.nodes
                    .values()
                    .filter(|n| n.parent == Some(current))
                    .map(|n| n.id),
            );
            i += 1;
        }
        out
    }

    /// Drop cached values for `node` and everything downstream of it
    fn invalidate(&self, node_id: NodeId) {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([node_id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            queue.extend(
                self.connections
                    .values()
                    .filter(|c| c.from.node == current)
                    .map(|c| c.to.node),
            );
            queue.extend(
                self.nodes
                    .values()
                    .filter(|n| n.parent == Some(current))
                    .map(|n| n.id),
            );
        }
        self.cache
            .borrow_mut()
            .retain(|(node, _), _| !seen.contains(node));
    }

    /// Pull a port value, evaluating upstream as needed
    pub(crate) fn pull(&self, node_id: NodeId, port_name: &str) -> GraphResult<PortValue> {
        let node = self.require(node_id)?;
        let port = self.require_port(node_id, port_name)?;
        let key = (node_id, port_name.to_string());

        if let Some(value) = self.cache.borrow().get(&key) {
            return Ok(value.clone());
        }

        let driver = self.driver(node_id, port_name);
        if driver.is_none() && port.direction == PortDirection::Input {
            return Ok(port.current());
        }

        if !self.in_flight.borrow_mut().insert(key.clone()) {
            return Err(GraphError::Cycle {
                node: node.name.clone(),
                port: port_name.to_string(),
            });
        }

        let result = match driver {
            Some((_, source)) => self.pull(source.node, &source.port).and_then(|value| {
                value
                    .coerce(port.port_type)
                    .ok_or_else(|| GraphError::TypeMismatch {
                        port: format!("{}.{}", node.name, port_name),
                        expected: port.port_type,
                    })
            }),
            None => evaluation::compute(self, node, port_name),
        };
        self.in_flight.borrow_mut().remove(&key);

        let value = result?;
        self.cache.borrow_mut().insert(key, value.clone());
        Ok(value)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl SceneGraph for Graph {
    fn create_node(
        &mut self,
        kind: NodeKind,
        name: &str,
        parent: Option<NodeId>,
    ) -> GraphResult<NodeId> {
        if let Some(parent_id) = parent {
            let parent_node = self.require(parent_id)?;
            if !parent_node.kind.is_transform() {
                return Err(GraphError::NotATransform(parent_node.name.clone()));
            }
            if !kind.is_transform() {
                return Err(GraphError::NotATransform(name.to_string()));
            }
        }

        let unique = self.unique_name(name);
        let mut node = self
            .registry
            .create_node(kind, &unique)
            .ok_or_else(|| GraphError::Evaluation {
                node: unique.clone(),
                message: format!("no template for {}", kind.type_id()),
            })?;
        node.parent = parent;
        let id = node.id;
        tracing::trace!("Created {} '{}'", kind.type_id(), unique);
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn delete_node(&mut self, node_id: NodeId) -> GraphResult<()> {
        self.require(node_id)?;
        let doomed = self.subtree(node_id);
        for id in &doomed {
            self.invalidate(*id);
        }
        self.connections
            .retain(|_, c| !doomed.iter().any(|id| c.involves_node(*id)));
        for id in &doomed {
            self.nodes.shift_remove(id);
        }
        Ok(())
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    fn node_kind(&self, node_id: NodeId) -> GraphResult<NodeKind> {
        Ok(self.require(node_id)?.kind)
    }

    fn node_name(&self, node_id: NodeId) -> GraphResult<String> {
        Ok(self.require(node_id)?.name.clone())
    }

    fn rename_node(&mut self, node_id: NodeId, name: &str) -> GraphResult<()> {
        self.require(node_id)?;
        let unique = match self.find_node(name) {
            Some(existing) if existing == node_id => return Ok(()),
            Some(_) => self.unique_name(name),
            None => name.to_string(),
        };
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.name = unique;
        }
        Ok(())
    }

    fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.name == name).map(|n| n.id)
    }

    fn parent(&self, node_id: NodeId) -> GraphResult<Option<NodeId>> {
        Ok(self.require(node_id)?.parent)
    }

    fn children(&self, node_id: NodeId) -> GraphResult<Vec<NodeId>> {
        self.require(node_id)?;
        Ok(self
            .nodes
            .values()
            .filter(|n| n.parent == Some(node_id))
            .map(|n| n.id)
            .collect())
    }

    fn set_parent(&mut self, node_id: NodeId, parent: Option<NodeId>) -> GraphResult<()> {
        let node = self.require(node_id)?;
        if !node.kind.is_transform() {
            return Err(GraphError::NotATransform(node.name.clone()));
        }
        if let Some(parent_id) = parent {
            let parent_node = self.require(parent_id)?;
            if !parent_node.kind.is_transform() {
                return Err(GraphError::NotATransform(parent_node.name.clone()));
            }
            if self.subtree(node_id).contains(&parent_id) {
                return Err(GraphError::ParentCycle {
                    child: node.name.clone(),
                    parent: parent_node.name.clone(),
                });
            }
        }
        self.invalidate(node_id);
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.parent = parent;
        }
        Ok(())
    }

    fn add_port(&mut self, node_id: NodeId, port: Port) -> GraphResult<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        if node.port(&port.name).is_some() {
            return Err(GraphError::DuplicatePort {
                node: node.name.clone(),
                port: port.name,
            });
        }
        node.add_port(port);
        Ok(())
    }

    fn has_port(&self, node_id: NodeId, port: &str) -> bool {
        self.nodes
            .get(&node_id)
            .is_some_and(|n| n.port(port).is_some())
    }

    fn port_names(&self, node_id: NodeId) -> GraphResult<Vec<String>> {
        Ok(self
            .require(node_id)?
            .ports()
            .map(|p| p.name.clone())
            .collect())
    }

    fn get(&self, node_id: NodeId, port: &str) -> GraphResult<PortValue> {
        self.pull(node_id, port)
    }

    fn set(
        &mut self,
        node_id: NodeId,
        port_name: &str,
        value: PortValue,
        force: bool,
    ) -> GraphResult<WriteOutcome> {
        let target = PortRef::new(node_id, port_name);
        let port = self.require_port(node_id, port_name)?;
        if port.direction == PortDirection::Output {
            return Err(GraphError::ReadOnlyPort {
                node: self.require(node_id)?.name.clone(),
                port: port_name.to_string(),
            });
        }

        let coerced = value
            .coerce(port.port_type)
            .ok_or_else(|| GraphError::TypeMismatch {
                port: self.display(&target),
                expected: port.port_type,
            })?;
        if port.port_type == PortType::Enum {
            let raw = coerced.as_int().unwrap_or_default();
            if !port.accepts_enum_value(raw) {
                return Err(GraphError::InvalidEnumValue {
                    port: self.display(&target),
                    value: raw,
                });
            }
        }
        let coerced = match (coerced, port.range) {
            (PortValue::Float(f), Some((min, max))) => PortValue::Float(f.max(min).min(max)),
            (other, _) => other,
        };

        if port.locked && !force {
            tracing::warn!("Skipping write to locked port {}", self.display(&target));
            return Ok(WriteOutcome::Skipped);
        }
        if let Some((connection, source)) = self.driver(node_id, port_name) {
            if !force {
                tracing::warn!(
                    "Skipping write to {}: driven by {}",
                    self.display(&target),
                    self.display(&source)
                );
                return Ok(WriteOutcome::Skipped);
            }
            self.connections.shift_remove(&connection);
        }

        self.port_mut(node_id, port_name)?.value = Some(coerced);
        self.invalidate(node_id);
        Ok(WriteOutcome::Written)
    }

    fn connect(&mut self, src: &PortRef, dst: &PortRef, force: bool) -> GraphResult<WriteOutcome> {
        let source_type = self.require_port(src.node, &src.port)?.port_type;
        let target = self.require_port(dst.node, &dst.port)?;
        if target.direction == PortDirection::Output {
            return Err(GraphError::ReadOnlyPort {
                node: self.require(dst.node)?.name.clone(),
                port: dst.port.clone(),
            });
        }
        if !source_type.can_connect_to(&target.port_type) {
            return Err(GraphError::IncompatiblePorts {
                from: self.display(src),
                to: self.display(dst),
            });
        }

        if target.locked && !force {
            tracing::warn!("Skipping connection into locked port {}", self.display(dst));
            return Ok(WriteOutcome::Skipped);
        }
        if let Some((connection, existing)) = self.driver(dst.node, &dst.port) {
            if existing == *src {
                return Ok(WriteOutcome::Written);
            }
            if !force {
                tracing::warn!(
                    "Skipping connection {} -> {}: already driven by {}",
                    self.display(src),
                    self.display(dst),
                    self.display(&existing)
                );
                return Ok(WriteOutcome::Skipped);
            }
            self.connections.shift_remove(&connection);
        }

        let connection = Connection::new(src.clone(), dst.clone());
        self.connections.insert(connection.id, connection);
        self.invalidate(dst.node);
        Ok(WriteOutcome::Written)
    }

    fn disconnect(&mut self, dst: &PortRef) -> GraphResult<Option<PortRef>> {
        self.require_port(dst.node, &dst.port)?;
        let Some((connection, source)) = self.driver(dst.node, &dst.port) else {
            return Ok(None);
        };
        self.connections.shift_remove(&connection);
        self.invalidate(dst.node);
        Ok(Some(source))
    }

    fn source(&self, dst: &PortRef) -> GraphResult<Option<PortRef>> {
        self.require_port(dst.node, &dst.port)?;
        Ok(self.driver(dst.node, &dst.port).map(|(_, source)| source))
    }

    fn destinations(&self, src: &PortRef) -> GraphResult<Vec<PortRef>> {
        self.require_port(src.node, &src.port)?;
        Ok(self
            .connections
            .values()
            .filter(|c| c.from == *src)
            .map(|c| c.to.clone())
            .collect())
    }

    fn set_locked(&mut self, node_id: NodeId, port: &str, locked: bool) -> GraphResult<()> {
        self.port_mut(node_id, port)?.locked = locked;
        Ok(())
    }

    fn is_locked(&self, node_id: NodeId, port: &str) -> GraphResult<bool> {
        Ok(self.require_port(node_id, port)?.locked)
    }

    fn append_handle(&mut self, node_id: NodeId, port: &str, handle: NodeId) -> GraphResult<usize> {
        let target = self.port_mut(node_id, port)?;
        if target.port_type != PortType::HandleList {
            return Err(GraphError::TypeMismatch {
                port: port.to_string(),
                expected: PortType::HandleList,
            });
        }
        let mut list = match target.current() {
            PortValue::HandleList(list) => list,
            _ => Vec::new(),
        };
        list.push(handle);
        let index = list.len() - 1;
        target.value = Some(PortValue::HandleList(list));
        self.invalidate(node_id);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{indexed, TransformRole};
    use glam::{Mat4, Vec3};

    fn group(graph: &mut Graph, name: &str, parent: Option<NodeId>) -> NodeId {
        graph
            .create_node(NodeKind::Transform(TransformRole::Group), name, parent)
            .unwrap()
    }

    fn translation(graph: &Graph, node: NodeId) -> Vec3 {
        graph
            .get_matrix(node, "worldMatrix")
            .unwrap()
            .w_axis
            .truncate()
    }

    #[test]
    fn test_world_matrix_follows_parent() {
        let mut graph = Graph::new("test");
        let parent = group(&mut graph, "parent", None);
        let child = group(&mut graph, "child", Some(parent));
        graph.set(child, "translateX", PortValue::Float(2.0), false).unwrap();
        assert_eq!(translation(&graph, child), Vec3::new(2.0, 0.0, 0.0));

        // Cached value must not survive an upstream edit
        graph.set(parent, "translateY", PortValue::Float(3.0), false).unwrap();
        assert_eq!(translation(&graph, child), Vec3::new(2.0, 3.0, 0.0));
    }

    #[test]
    fn test_edit_invalidates_downstream_cache_only() {
        let mut graph = Graph::new("test");
        let parent = group(&mut graph, "parent", None);
        let child = group(&mut graph, "child", Some(parent));
        let other = group(&mut graph, "other", None);
        translation(&graph, child);
        translation(&graph, other);
        let warm = graph.cached_count();
        assert!(warm > 0);

        graph.set(child, "translateX", PortValue::Float(1.0), false).unwrap();
        let after = graph.cached_count();
        assert!(after < warm);
        assert!(after > 0);
    }

    #[test]
    fn test_unique_names() {
        let mut graph = Graph::new("test");
        let a = group(&mut graph, "grp", None);
        let b = group(&mut graph, "grp", None);
        assert_ne!(graph.node_name(a).unwrap(), graph.node_name(b).unwrap());
        assert_eq!(graph.find_node("grp"), Some(a));
    }

    #[test]
    fn test_connect_driven_port_is_skipped_unless_forced() {
        let mut graph = Graph::new("test");
        let a = group(&mut graph, "a", None);
        let b = group(&mut graph, "b", None);
        let c = group(&mut graph, "c", None);
        let dst = PortRef::new(c, "translateX");

        let first = graph.connect(&PortRef::new(a, "translateX"), &dst, false).unwrap();
        assert_eq!(first, WriteOutcome::Written);
        let second = graph.connect(&PortRef::new(b, "translateX"), &dst, false).unwrap();
        assert_eq!(second, WriteOutcome::Skipped);
        assert_eq!(graph.source(&dst).unwrap(), Some(PortRef::new(a, "translateX")));

        let forced = graph.connect(&PortRef::new(b, "translateX"), &dst, true).unwrap();
        assert_eq!(forced, WriteOutcome::Written);
        assert_eq!(graph.source(&dst).unwrap(), Some(PortRef::new(b, "translateX")));
    }

    #[test]
    fn test_set_driven_or_locked_port_is_skipped() {
        let mut graph = Graph::new("test");
        let a = group(&mut graph, "a", None);
        let b = group(&mut graph, "b", None);
        graph
            .connect(&PortRef::new(a, "translateX"), &PortRef::new(b, "translateX"), false)
            .unwrap();
        graph.set(a, "translateX", PortValue::Float(4.0), false).unwrap();

        let outcome = graph.set(b, "translateX", PortValue::Float(9.0), false).unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped);
        assert_eq!(graph.get_float(b, "translateX").unwrap(), 4.0);

        graph.set_locked(a, "translateY", true).unwrap();
        let outcome = graph.set(a, "translateY", PortValue::Float(1.0), false).unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped);
        let outcome = graph.set(a, "translateY", PortValue::Float(1.0), true).unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
    }

    #[test]
    fn test_missing_port_is_lookup_error() {
        let mut graph = Graph::new("test");
        let a = group(&mut graph, "a", None);
        let err = graph.get(a, "hierarchyMatrix").unwrap_err();
        assert!(matches!(err, GraphError::PortNotFound { .. }));
    }

    #[test]
    fn test_output_ports_are_read_only() {
        let mut graph = Graph::new("test");
        let a = group(&mut graph, "a", None);
        let err = graph
            .set(a, "worldMatrix", PortValue::Mat4(Mat4::IDENTITY), true)
            .unwrap_err();
        assert!(matches!(err, GraphError::ReadOnlyPort { .. }));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = Graph::new("test");
        let a = graph.create_node(NodeKind::Reverse, "a", None).unwrap();
        let b = graph.create_node(NodeKind::Reverse, "b", None).unwrap();
        graph
            .connect(&PortRef::new(a, "output"), &PortRef::new(b, "input"), false)
            .unwrap();
        graph
            .connect(&PortRef::new(b, "output"), &PortRef::new(a, "input"), false)
            .unwrap();
        assert!(matches!(graph.get(a, "output"), Err(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_choice_and_constraint_blend() {
        let mut graph = Graph::new("test");
        let s0 = group(&mut graph, "s0", None);
        let s1 = group(&mut graph, "s1", None);
        graph.set(s1, "translateX", PortValue::Float(10.0), false).unwrap();

        let constraint = graph
            .create_node(NodeKind::WeightedConstraint, "blend", None)
            .unwrap();
        for (i, source) in [s0, s1].into_iter().enumerate() {
            graph
                .add_port(constraint, Port::input(indexed("targetMatrix", i), PortType::Mat4))
                .unwrap();
            graph
                .add_port(
                    constraint,
                    Port::input(indexed("targetWeight", i), PortType::Float)
                        .with_default(PortValue::Float(1.0)),
                )
                .unwrap();
            graph
                .connect(
                    &PortRef::new(source, "worldMatrix"),
                    &PortRef::new(constraint, indexed("targetMatrix", i)),
                    false,
                )
                .unwrap();
        }
        graph
            .set(constraint, "targetWeight[0]", PortValue::Float(0.5), false)
            .unwrap();
        graph
            .set(constraint, "targetWeight[1]", PortValue::Float(0.5), false)
            .unwrap();
        assert_eq!(graph.get_float(constraint, "constraintTranslateX").unwrap(), 5.0);

        let choice = graph.create_node(NodeKind::Choice, "pick", None).unwrap();
        graph
            .add_port(choice, Port::input(indexed("input", 7), PortType::Any))
            .unwrap();
        graph
            .connect(
                &PortRef::new(s1, "worldMatrix"),
                &PortRef::new(choice, indexed("input", 7)),
                false,
            )
            .unwrap();
        assert!(matches!(
            graph.get(choice, "output"),
            Err(GraphError::MissingInput { .. })
        ));
        graph.set(choice, "selector", PortValue::Int(7), false).unwrap();
        let picked = graph.get_matrix(choice, "output").unwrap();
        assert_eq!(picked.w_axis.truncate(), Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_delete_removes_subtree_and_connections() {
        let mut graph = Graph::new("test");
        let root = group(&mut graph, "root", None);
        let child = group(&mut graph, "child", Some(root));
        let other = group(&mut graph, "other", None);
        graph
            .connect(&PortRef::new(child, "translateX"), &PortRef::new(other, "translateX"), false)
            .unwrap();
        graph.delete_node(root).unwrap();
        assert!(graph.node(child).is_none());
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_document_round_trip() {
        let mut graph = Graph::new("doc");
        let a = group(&mut graph, "a", None);
        graph.set(a, "translateZ", PortValue::Float(1.5), false).unwrap();
        let text = graph.to_ron().unwrap();
        let loaded = Graph::from_ron(&text).unwrap();
        let id = loaded.find_node("a").unwrap();
        assert_eq!(id, a);
        assert_eq!(loaded.get_float(id, "translateZ").unwrap(), 1.5);
    }
}
