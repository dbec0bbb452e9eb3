// SPDX-License-Identifier: MIT OR Apache-2.0
//! The narrow contract rig construction uses to talk to a host scene graph.
//!
//! Everything the rig layer does goes through [`SceneGraph`]: node creation,
//! port get/set/connect, parenting and lookups. The trait is object safe so
//! construction code holds a `&mut dyn SceneGraph` and never depends on a
//! particular host.

use crate::connection::PortRef;
use crate::node::{NodeId, NodeKind};
use crate::port::{Port, PortType, PortValue};
use glam::Mat4;

/// Result type for graph operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// What happened to a guarded write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value or connection was applied
    Written,
    /// The target was driven or locked; nothing changed
    Skipped,
}

impl WriteOutcome {
    /// Whether the write was applied
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Errors raised by the scene graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// No node carries this name
    #[error("No node named '{0}'")]
    NodeNameNotFound(String),

    /// Port not found
    #[error("Port not found: {node}.{port}")]
    PortNotFound {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// Port already exists
    #[error("Port already exists: {node}.{port}")]
    DuplicatePort {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// Incompatible port types
    #[error("Incompatible port types: {from} -> {to}")]
    IncompatiblePorts {
        /// Source port
        from: String,
        /// Destination port
        to: String,
    },

    /// Value does not fit the port type
    #[error("Type mismatch on {port}: expected {expected:?}")]
    TypeMismatch {
        /// Port name
        port: String,
        /// Declared type
        expected: PortType,
    },

    /// Enum port received a value with no field
    #[error("Invalid enum value {value} for {port}")]
    InvalidEnumValue {
        /// Port name
        port: String,
        /// Rejected value
        value: i32,
    },

    /// Computed ports cannot be written
    #[error("Port is computed and read-only: {node}.{port}")]
    ReadOnlyPort {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// Parenting requires transform nodes
    #[error("Node is not a transform: {0}")]
    NotATransform(String),

    /// Re-parenting would create a hierarchy loop
    #[error("Parenting {child} under {parent} would create a loop")]
    ParentCycle {
        /// Child node name
        child: String,
        /// Parent node name
        parent: String,
    },

    /// Pull evaluation revisited a port still being computed
    #[error("Dependency cycle through {node}.{port}")]
    Cycle {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// An indexed input needed for evaluation is missing
    #[error("Missing input {node}.{port}")]
    MissingInput {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// Numeric evaluation failure
    #[error("Evaluation failed on {node}: {message}")]
    Evaluation {
        /// Node name
        node: String,
        /// What went wrong
        message: String,
    },

    /// Document serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Host scene-graph service
pub trait SceneGraph {
    /// Create a primitive node, optionally parented under a transform
    fn create_node(
        &mut self,
        kind: NodeKind,
        name: &str,
        parent: Option<NodeId>,
    ) -> GraphResult<NodeId>;

    /// Delete a node, its connections, and every transform beneath it
    fn delete_node(&mut self, node: NodeId) -> GraphResult<()>;

    /// All nodes in creation order
    fn nodes(&self) -> Vec<NodeId>;

    /// Kind of a node
    fn node_kind(&self, node: NodeId) -> GraphResult<NodeKind>;

    /// Scene name of a node
    fn node_name(&self, node: NodeId) -> GraphResult<String>;

    /// Rename a node
    fn rename_node(&mut self, node: NodeId, name: &str) -> GraphResult<()>;

    /// Look a node up by scene name
    fn find_node(&self, name: &str) -> Option<NodeId>;

    /// Parent transform of a node
    fn parent(&self, node: NodeId) -> GraphResult<Option<NodeId>>;

    /// Direct children, in creation order
    fn children(&self, node: NodeId) -> GraphResult<Vec<NodeId>>;

    /// Re-parent a transform (local channels are kept, not compensated)
    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> GraphResult<()>;

    /// Add a dynamic port
    fn add_port(&mut self, node: NodeId, port: Port) -> GraphResult<()>;

    /// Whether a port exists
    fn has_port(&self, node: NodeId, port: &str) -> bool;

    /// Names of all ports on a node
    fn port_names(&self, node: NodeId) -> GraphResult<Vec<String>>;

    /// Read a port, pulling upstream values as needed
    fn get(&self, node: NodeId, port: &str) -> GraphResult<PortValue>;

    /// Write a port. Driven or locked ports are skipped with a warning
    /// unless `force` is set.
    fn set(
        &mut self,
        node: NodeId,
        port: &str,
        value: PortValue,
        force: bool,
    ) -> GraphResult<WriteOutcome>;

    /// Connect `src` into `dst`. An already-driven or locked destination is
    /// skipped with a warning unless `force` is set.
    fn connect(&mut self, src: &PortRef, dst: &PortRef, force: bool) -> GraphResult<WriteOutcome>;

    /// Break the connection driving `dst`, returning its former source
    fn disconnect(&mut self, dst: &PortRef) -> GraphResult<Option<PortRef>>;

    /// Source currently driving a port
    fn source(&self, dst: &PortRef) -> GraphResult<Option<PortRef>>;

    /// Ports driven by `src`
    fn destinations(&self, src: &PortRef) -> GraphResult<Vec<PortRef>>;

    /// Lock or unlock a port
    fn set_locked(&mut self, node: NodeId, port: &str, locked: bool) -> GraphResult<()>;

    /// Whether a port is locked
    fn is_locked(&self, node: NodeId, port: &str) -> GraphResult<bool>;

    /// Append to a handle-list port, returning the new element's index
    fn append_handle(&mut self, node: NodeId, port: &str, handle: NodeId) -> GraphResult<usize>;

    /// Read a matrix port
    fn get_matrix(&self, node: NodeId, port: &str) -> GraphResult<Mat4> {
        self.get(node, port)?
            .as_mat4()
            .ok_or_else(|| GraphError::TypeMismatch {
                port: port.to_string(),
                expected: PortType::Mat4,
            })
    }

    /// Read a numeric port as float
    fn get_float(&self, node: NodeId, port: &str) -> GraphResult<f32> {
        self.get(node, port)?
            .as_float()
            .ok_or_else(|| GraphError::TypeMismatch {
                port: port.to_string(),
                expected: PortType::Float,
            })
    }

    /// Read a numeric port as int
    fn get_int(&self, node: NodeId, port: &str) -> GraphResult<i32> {
        self.get(node, port)?
            .as_int()
            .ok_or_else(|| GraphError::TypeMismatch {
                port: port.to_string(),
                expected: PortType::Int,
            })
    }

    /// Read a string port
    fn get_string(&self, node: NodeId, port: &str) -> GraphResult<String> {
        match self.get(node, port)? {
            PortValue::String(s) => Ok(s),
            _ => Err(GraphError::TypeMismatch {
                port: port.to_string(),
                expected: PortType::String,
            }),
        }
    }

    /// Read a handle-list port
    fn get_handles(&self, node: NodeId, port: &str) -> GraphResult<Vec<NodeId>> {
        match self.get(node, port)? {
            PortValue::HandleList(list) => Ok(list),
            _ => Err(GraphError::TypeMismatch {
                port: port.to_string(),
                expected: PortType::HandleList,
            }),
        }
    }

    /// Look a node up by name, failing when absent
    fn require_node(&self, name: &str) -> GraphResult<NodeId> {
        self.find_node(name)
            .ok_or_else(|| GraphError::NodeNameNotFound(name.to_string()))
    }
}
