// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::port::{Port, PortDirection};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a transform node stands for in the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformRole {
    /// Plain grouping transform
    Group,
    /// Skinning joint
    Joint,
    /// Animator-facing control
    Control,
    /// Locator / pivot helper
    Locator,
}

/// Primitive node kinds the host knows how to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// DAG transform with local channels and world matrices
    Transform(TransformRole),
    /// Product of `matrixIn[i]`, child-first
    MultMatrix,
    /// Matrix inverse
    InverseMatrix,
    /// Translate/rotate/scale channels to matrix
    ComposeMatrix,
    /// Matrix to translate/rotate/scale/quaternion channels
    DecomposeMatrix,
    /// Quaternion components to euler angles
    QuatToEuler,
    /// Weighted blend of target matrices into local channels
    WeightedConstraint,
    /// Select one of `input[i]` by `selector`
    Choice,
    /// `1 - input`
    Reverse,
    /// Compare two terms and pick one of two values
    Condition,
    /// Distance between the translations of two matrices
    Distance,
    /// Scalar multiply / divide / power
    MultiplyDivide,
    /// Sum / subtract / average of `input1D[i]`
    PlusMinusAverage,
    /// Clamp a scalar into a range
    Clamp,
    /// Linear blend of two scalars
    BlendScalar,
}

impl NodeKind {
    /// Registry identifier for this kind
    pub fn type_id(&self) -> &'static str {
        match self {
            Self::Transform(TransformRole::Group) => "transform",
            Self::Transform(TransformRole::Joint) => "joint",
            Self::Transform(TransformRole::Control) => "control",
            Self::Transform(TransformRole::Locator) => "locator",
            Self::MultMatrix => "mult_matrix",
            Self::InverseMatrix => "inverse_matrix",
            Self::ComposeMatrix => "compose_matrix",
            Self::DecomposeMatrix => "decompose_matrix",
            Self::QuatToEuler => "quat_to_euler",
            Self::WeightedConstraint => "weighted_constraint",
            Self::Choice => "choice",
            Self::Reverse => "reverse",
            Self::Condition => "condition",
            Self::Distance => "distance",
            Self::MultiplyDivide => "multiply_divide",
            Self::PlusMinusAverage => "plus_minus_average",
            Self::Clamp => "clamp",
            Self::BlendScalar => "blend_scalar",
        }
    }

    /// Whether nodes of this kind live in the transform hierarchy
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform(_))
    }
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Kind this template instantiates
    pub kind: NodeKind,
    /// Description
    pub description: String,
    /// Default input ports
    pub inputs: Vec<Port>,
    /// Default output ports
    pub outputs: Vec<Port>,
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Primitive kind
    pub kind: NodeKind,
    /// Scene name
    pub name: String,
    /// Parent transform, if any
    pub parent: Option<NodeId>,
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
}

impl Node {
    /// Create a new node from a type definition
    pub fn new(node_type: &NodeType, name: impl Into<String>) -> Self {
        // Templates are shared, so every instance gets fresh port ids
        let fresh = |ports: &[Port]| -> Vec<Port> {
            ports
                .iter()
                .cloned()
                .map(|mut p| {
                    p.id = crate::port::PortId::new();
                    p
                })
                .collect()
        };
        Self {
            id: NodeId::new(),
            kind: node_type.kind,
            name: name.into(),
            parent: None,
            inputs: fresh(&node_type.inputs),
            outputs: fresh(&node_type.outputs),
        }
    }

    /// Get a port by name
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.inputs
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.outputs.iter().find(|p| p.name == name))
    }

    /// Get a mutable port by name
    pub fn port_mut(&mut self, name: &str) -> Option<&mut Port> {
        if let Some(i) = self.inputs.iter().position(|p| p.name == name) {
            return self.inputs.get_mut(i);
        }
        self.outputs.iter_mut().find(|p| p.name == name)
    }

    /// Add a port, keeping inputs and outputs apart
    pub fn add_port(&mut self, port: Port) {
        match port.direction {
            PortDirection::Input => self.inputs.push(port),
            PortDirection::Output => self.outputs.push(port),
        }
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Indexed input ports `prefix[i]`, sorted by index
    pub fn indexed_inputs(&self, prefix: &str) -> Vec<(usize, &Port)> {
        let mut found: Vec<(usize, &Port)> = self
            .inputs
            .iter()
            .filter_map(|p| parse_index(&p.name, prefix).map(|i| (i, p)))
            .collect();
        found.sort_by_key(|(i, _)| *i);
        found
    }
}

/// Name of the `index`-th element of an indexed port
pub fn indexed(prefix: &str, index: usize) -> String {
    format!("{prefix}[{index}]")
}

/// Parse `prefix[i]` into `i`
pub fn parse_index(name: &str, prefix: &str) -> Option<usize> {
    name.strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Registry of available node types
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    /// Registered node types by ID
    types: indexmap::IndexMap<&'static str, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: indexmap::IndexMap::new(),
        }
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.kind.type_id(), node_type);
    }

    /// Get a node type by kind
    pub fn get(&self, kind: NodeKind) -> Option<&NodeType> {
        self.types.get(kind.type_id())
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Create a node from a kind
    pub fn create_node(&self, kind: NodeKind, name: &str) -> Option<Node> {
        self.get(kind).map(|t| Node::new(t, name))
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
