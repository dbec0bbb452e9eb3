// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::node::NodeId;
use glam::Mat4;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Stored port: settable and connectable
    Input,
    /// Computed port: read-only, recomputed on pull
    Output,
}

/// Data type that can flow through ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Enumeration stored as an integer, named by the port's enum fields
    Enum,
    /// Floating point value
    Float,
    /// Matrix 4x4
    Mat4,
    /// String value
    String,
    /// Ordered list of strings
    StringList,
    /// Reference to another node
    Handle,
    /// Ordered, append-only list of node references
    HandleList,
    /// Any type (pass-through nodes)
    Any,
}

impl PortType {
    /// Whether values of this type are plain numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Enum | Self::Float)
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        // Any type can connect to anything
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        // Same types can always connect
        if self == other {
            return true;
        }

        // Implicit numeric conversions (bool, int, enum, float)
        self.is_numeric() && other.is_numeric()
    }
}

/// A port on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Default value (for inputs)
    pub default_value: Option<PortValue>,
    /// Stored value, when set explicitly
    pub value: Option<PortValue>,
    /// Locked ports reject writes and connections unless forced
    pub locked: bool,
    /// Enumeration fields (name, value) for `PortType::Enum`
    pub enum_fields: Vec<(String, i32)>,
    /// Optional numeric range applied on write
    pub range: Option<(f32, f32)>,
}

impl Port {
    /// Create a new port
    pub fn new(name: impl Into<String>, port_type: PortType, direction: PortDirection) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction,
            port_type,
            default_value: None,
            value: None,
            locked: false,
            enum_fields: Vec::new(),
            range: None,
        }
    }

    /// Create a new input port
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(name, port_type, PortDirection::Input)
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(name, port_type, PortDirection::Output)
    }

    /// Create an enumeration input port
    pub fn enumeration(name: impl Into<String>, fields: Vec<(String, i32)>) -> Self {
        let mut port = Self::input(name, PortType::Enum);
        port.default_value = fields.first().map(|(_, v)| PortValue::Int(*v));
        port.enum_fields = fields;
        port
    }

    /// Set the default value
    pub fn with_default(mut self, value: PortValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Clamp written values to a range
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Current value: stored, else default, else the type's zero value
    pub fn current(&self) -> PortValue {
        self.value
            .clone()
            .or_else(|| self.default_value.clone())
            .unwrap_or_else(|| PortValue::zero(self.port_type))
    }

    /// Check whether `value` names a field of this enum port
    pub fn accepts_enum_value(&self, value: i32) -> bool {
        self.enum_fields.iter().any(|(_, v)| *v == value)
    }

    /// Name of the enum field holding `value`
    pub fn enum_name(&self, value: i32) -> Option<&str> {
        self.enum_fields
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }
}

/// Value that can be stored in a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer (also used for enum ports)
    Int(i32),
    /// Float
    Float(f32),
    /// 4x4 matrix, column-vector convention
    Mat4(Mat4),
    /// String
    String(String),
    /// String list
    StringList(Vec<String>),
    /// Node reference
    Handle(Option<NodeId>),
    /// Node reference list
    HandleList(Vec<NodeId>),
}

impl PortValue {
    /// Zero value for a port type
    pub fn zero(port_type: PortType) -> Self {
        match port_type {
            PortType::Bool => Self::Bool(false),
            PortType::Int | PortType::Enum => Self::Int(0),
            PortType::Float | PortType::Any => Self::Float(0.0),
            PortType::Mat4 => Self::Mat4(Mat4::IDENTITY),
            PortType::String => Self::String(String::new()),
            PortType::StringList => Self::StringList(Vec::new()),
            PortType::Handle => Self::Handle(None),
            PortType::HandleList => Self::HandleList(Vec::new()),
        }
    }

    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Mat4(_) => PortType::Mat4,
            Self::String(_) => PortType::String,
            Self::StringList(_) => PortType::StringList,
            Self::Handle(_) => PortType::Handle,
            Self::HandleList(_) => PortType::HandleList,
        }
    }

    /// Numeric view of the value
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f32),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view of the value (floats round to nearest)
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Bool(b) => Some(i32::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(f.round() as i32),
            _ => None,
        }
    }

    /// Boolean view of the value (non-zero is true)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            _ => None,
        }
    }

    /// Get as matrix if possible
    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            Self::Mat4(m) => Some(*m),
            _ => None,
        }
    }

    /// Get as string if possible
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as string list if possible
    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            Self::StringList(list) => Some(list),
            _ => None,
        }
    }

    /// Get as node reference if possible
    pub fn as_handle(&self) -> Option<Option<NodeId>> {
        match self {
            Self::Handle(h) => Some(*h),
            _ => None,
        }
    }

    /// Get as node reference list if possible
    pub fn as_handle_list(&self) -> Option<&[NodeId]> {
        match self {
            Self::HandleList(list) => Some(list),
            _ => None,
        }
    }

    /// Convert to a value acceptable by a port of `target` type
    pub fn coerce(self, target: PortType) -> Option<PortValue> {
        if target == PortType::Any || self.port_type() == target {
            return Some(self);
        }
        match target {
            PortType::Bool => self.as_bool().map(Self::Bool),
            PortType::Int | PortType::Enum => self.as_int().map(Self::Int),
            PortType::Float => self.as_float().map(Self::Float),
            _ => None,
        }
    }
}
