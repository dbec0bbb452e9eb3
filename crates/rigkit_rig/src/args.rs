// SPDX-License-Identifier: MIT OR Apache-2.0
//! Construction arguments: typed values, per-type specs, validation and
//! mirroring.
//!
//! Every rig node type declares an [`ArgSpec`] list per lifecycle section.
//! Raw arguments are validated against it before any step runs: unknown keys
//! are logged and ignored, missing keys take their default, and node
//! arguments given by name are resolved to handles through the host graph.

use crate::error::{RigError, RigResult};
use crate::naming::Naming;
use indexmap::IndexMap;
use rigkit_graph::{NodeId, SceneGraph};
use serde::{Deserialize, Serialize};

/// Reserved key requesting a mirrored build
pub const FLIP: &str = "flip";

/// A construction argument value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f32),
    /// String
    Str(String),
    /// String list
    StrList(Vec<String>),
    /// Position or direction
    Vec3([f32; 3]),
    /// Positions
    Vec3List(Vec<[f32; 3]>),
    /// `(position, value)` curve keys
    Curve(Vec<[f32; 2]>),
    /// Resolved node handle
    Node(NodeId),
    /// Resolved node handles
    NodeList(Vec<NodeId>),
}

/// Expected kind of an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// [`ArgValue::Bool`]
    Bool,
    /// [`ArgValue::Int`]
    Int,
    /// [`ArgValue::Float`]
    Float,
    /// [`ArgValue::Str`]
    Str,
    /// [`ArgValue::StrList`]
    StrList,
    /// [`ArgValue::Vec3`]
    Vec3,
    /// [`ArgValue::Vec3List`]
    Vec3List,
    /// [`ArgValue::Curve`]
    Curve,
    /// [`ArgValue::Node`]; accepts a node name
    Node,
    /// [`ArgValue::NodeList`]; accepts a list of node names
    NodeList,
}

/// Declaration of one recognized argument
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    /// Argument key
    pub key: &'static str,
    /// Expected kind
    pub kind: ArgKind,
    /// Value used when the key is absent; `None` leaves it absent
    pub default: Option<ArgValue>,
    /// Whether the value changes under mirroring
    pub side_sensitive: bool,
}

impl ArgSpec {
    /// Optional argument without a default
    pub fn optional(key: &'static str, kind: ArgKind) -> Self {
        Self {
            key,
            kind,
            default: None,
            side_sensitive: false,
        }
    }

    /// Argument with a default value
    pub fn with_default(key: &'static str, kind: ArgKind, default: ArgValue) -> Self {
        Self {
            key,
            kind,
            default: Some(default),
            side_sensitive: false,
        }
    }

    /// Mark the argument as mirrored by flipped builds
    pub fn side_sensitive(mut self) -> Self {
        self.side_sensitive = true;
        self
    }
}

/// Validated (or raw) argument map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildArgs {
    values: IndexMap<String, ArgValue>,
}

impl BuildArgs {
    /// Empty argument map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: ArgValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: &str, value: ArgValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Raw value
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` over this map
    pub fn extend(&mut self, other: BuildArgs) {
        self.values.extend(other.values);
    }

    /// Whether a mirrored build was requested
    pub fn flip(&self) -> bool {
        matches!(self.get(FLIP), Some(ArgValue::Bool(true)))
    }

    fn require(&self, key: &str) -> RigResult<&ArgValue> {
        self.get(key)
            .ok_or_else(|| RigError::invalid_arg(key, "required argument missing"))
    }

    fn wrong(key: &str, expected: &str) -> RigError {
        RigError::invalid_arg(key, format!("expected {expected}"))
    }

    /// Boolean argument
    pub fn bool(&self, key: &str) -> RigResult<bool> {
        match self.require(key)? {
            ArgValue::Bool(b) => Ok(*b),
            _ => Err(Self::wrong(key, "a bool")),
        }
    }

    /// Integer argument
    pub fn int(&self, key: &str) -> RigResult<i64> {
        match self.require(key)? {
            ArgValue::Int(i) => Ok(*i),
            _ => Err(Self::wrong(key, "an int")),
        }
    }

    /// Float argument
    pub fn float(&self, key: &str) -> RigResult<f32> {
        match self.require(key)? {
            ArgValue::Float(f) => Ok(*f),
            _ => Err(Self::wrong(key, "a float")),
        }
    }

    /// String argument
    pub fn str(&self, key: &str) -> RigResult<&str> {
        match self.require(key)? {
            ArgValue::Str(s) => Ok(s),
            _ => Err(Self::wrong(key, "a string")),
        }
    }

    /// Optional string argument
    pub fn opt_str(&self, key: &str) -> RigResult<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(ArgValue::Str(s)) => Ok(Some(s)),
            Some(_) => Err(Self::wrong(key, "a string")),
        }
    }

    /// String list argument
    pub fn str_list(&self, key: &str) -> RigResult<&[String]> {
        match self.require(key)? {
            ArgValue::StrList(list) => Ok(list),
            _ => Err(Self::wrong(key, "a string list")),
        }
    }

    /// Vector argument
    pub fn vec3(&self, key: &str) -> RigResult<glam::Vec3> {
        match self.require(key)? {
            ArgValue::Vec3(v) => Ok(glam::Vec3::from_array(*v)),
            _ => Err(Self::wrong(key, "a vector")),
        }
    }

    /// Vector list argument
    pub fn vec3_list(&self, key: &str) -> RigResult<Vec<glam::Vec3>> {
        match self.require(key)? {
            ArgValue::Vec3List(list) => Ok(list.iter().copied().map(glam::Vec3::from_array).collect()),
            _ => Err(Self::wrong(key, "a vector list")),
        }
    }

    /// Curve argument
    pub fn curve(&self, key: &str) -> RigResult<&[[f32; 2]]> {
        match self.require(key)? {
            ArgValue::Curve(keys) => Ok(keys),
            _ => Err(Self::wrong(key, "a curve")),
        }
    }

    /// Node argument
    pub fn node(&self, key: &str) -> RigResult<NodeId> {
        match self.require(key)? {
            ArgValue::Node(id) => Ok(*id),
            _ => Err(Self::wrong(key, "a node")),
        }
    }

    /// Optional node argument
    pub fn opt_node(&self, key: &str) -> RigResult<Option<NodeId>> {
        match self.get(key) {
            None => Ok(None),
            Some(ArgValue::Node(id)) => Ok(Some(*id)),
            Some(_) => Err(Self::wrong(key, "a node")),
        }
    }

    /// Node list argument
    pub fn node_list(&self, key: &str) -> RigResult<&[NodeId]> {
        match self.require(key)? {
            ArgValue::NodeList(list) => Ok(list),
            _ => Err(Self::wrong(key, "a node list")),
        }
    }
}

fn resolve_node(graph: &dyn SceneGraph, name: &str) -> RigResult<NodeId> {
    Ok(graph.require_node(name)?)
}

/// Coerce one raw value to the kind its spec expects
fn coerce(spec: &ArgSpec, value: ArgValue, graph: &dyn SceneGraph) -> RigResult<ArgValue> {
    let mismatch = |value: &ArgValue| {
        RigError::invalid_arg(spec.key, format!("expected {:?}, got {value:?}", spec.kind))
    };
    Ok(match (spec.kind, value) {
        (ArgKind::Float, ArgValue::Int(i)) => ArgValue::Float(i as f32),
        (ArgKind::Node, ArgValue::Str(name)) => ArgValue::Node(resolve_node(graph, &name)?),
        (ArgKind::NodeList, ArgValue::StrList(names)) => ArgValue::NodeList(
            names
                .iter()
                .map(|n| resolve_node(graph, n))
                .collect::<RigResult<_>>()?,
        ),
        (ArgKind::Vec3List, ArgValue::Vec3(v)) => ArgValue::Vec3List(vec![v]),
        (kind, value) => {
            let ok = matches!(
                (kind, &value),
                (ArgKind::Bool, ArgValue::Bool(_))
                    | (ArgKind::Int, ArgValue::Int(_))
                    | (ArgKind::Float, ArgValue::Float(_))
                    | (ArgKind::Str, ArgValue::Str(_))
                    | (ArgKind::StrList, ArgValue::StrList(_))
                    | (ArgKind::Vec3, ArgValue::Vec3(_))
                    | (ArgKind::Vec3List, ArgValue::Vec3List(_))
                    | (ArgKind::Curve, ArgValue::Curve(_))
                    | (ArgKind::Node, ArgValue::Node(_))
                    | (ArgKind::NodeList, ArgValue::NodeList(_))
            );
            if !ok {
                return Err(mismatch(&value));
            }
            value
        }
    })
}

/// Validate raw arguments against `specs`.
///
/// Unknown keys are logged at debug level and dropped. The reserved
/// [`FLIP`] key is always accepted.
pub fn validate(specs: &[ArgSpec], raw: BuildArgs, graph: &dyn SceneGraph) -> RigResult<BuildArgs> {
    let mut raw = raw.values;
    let mut out = BuildArgs::new();

    match raw.shift_remove(FLIP) {
        Some(ArgValue::Bool(flip)) => out.insert(FLIP, ArgValue::Bool(flip)),
        Some(other) => return Err(RigError::invalid_arg(FLIP, format!("expected bool, got {other:?}"))),
        None => {}
    }

    for spec in specs {
        match raw.shift_remove(spec.key) {
            Some(value) => out.insert(spec.key, coerce(spec, value, graph)?),
            None => {
                if let Some(default) = &spec.default {
                    out.insert(spec.key, default.clone());
                }
            }
        }
    }

    for key in raw.keys() {
        tracing::debug!("Ignoring unrecognized argument '{}'", key);
    }
    Ok(out)
}

fn mirror_vec3(v: [f32; 3]) -> [f32; 3] {
    [-v[0], v[1], v[2]]
}

fn mirror_node(graph: &dyn SceneGraph, naming: &Naming, node: NodeId) -> RigResult<NodeId> {
    let name = graph.node_name(node)?;
    let flipped = naming.flip_name(&name)?;
    resolve_node(graph, &flipped)
}

/// Mirror the side-sensitive arguments of a validated map
pub fn flip_args(
    specs: &[ArgSpec],
    args: BuildArgs,
    naming: &Naming,
    graph: &dyn SceneGraph,
) -> RigResult<BuildArgs> {
    let mut out = BuildArgs::new();
    for (key, value) in args.values {
        let sensitive = specs.iter().any(|s| s.key == key && s.side_sensitive);
        let value = if !sensitive {
            value
        } else {
            match value {
                ArgValue::Str(s) => ArgValue::Str(naming.flip_name(&s)?),
                ArgValue::StrList(list) => ArgValue::StrList(
                    list.iter()
                        .map(|s| naming.flip_name(s))
                        .collect::<Result<_, _>>()?,
                ),
                ArgValue::Vec3(v) => ArgValue::Vec3(mirror_vec3(v)),
                ArgValue::Vec3List(list) => {
                    ArgValue::Vec3List(list.into_iter().map(mirror_vec3).collect())
                }
                ArgValue::Node(id) => ArgValue::Node(mirror_node(graph, naming, id)?),
                ArgValue::NodeList(list) => ArgValue::NodeList(
                    list.into_iter()
                        .map(|id| mirror_node(graph, naming, id))
                        .collect::<RigResult<_>>()?,
                ),
                other => other,
            }
        };
        out.values.insert(key, value);
    }
    Ok(out)
}
