// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry mapping type tags to rig node constructors.
//!
//! The registry is filled once at startup. Rehydration reads the tag stored
//! on a rig root and dispatches through it; nothing is resolved dynamically
//! beyond that lookup.

use crate::args::BuildArgs;
use crate::error::{RigError, RigResult};
use crate::info::get_info;
use crate::lifecycle::{RigContext, RigNode, RigNodeCore};
use crate::naming::NameTuple;
use crate::nodes::{FkChain, Master, SpaceSwitch, StretchChain, TwistSegment};
use indexmap::IndexMap;
use rigkit_graph::{NodeId, SceneGraph};
use std::any::Any;

/// Object-safe view of a rig node
pub trait DynRigNode {
    /// Type tag
    fn tag(&self) -> &'static str;

    /// Shared state
    fn rig_core(&self) -> &RigNodeCore;

    /// Run the build section
    fn build_dyn(&mut self, ctx: &mut RigContext<'_>, args: BuildArgs) -> RigResult<()>;

    /// Run the connect section
    fn connect_dyn(&mut self, ctx: &mut RigContext<'_>, args: BuildArgs) -> RigResult<()>;

    /// Downcasting support
    fn as_any(&self) -> &dyn Any;
}

impl<N: RigNode> DynRigNode for N {
    fn tag(&self) -> &'static str {
        N::TYPE_TAG
    }

    fn rig_core(&self) -> &RigNodeCore {
        self.core()
    }

    fn build_dyn(&mut self, ctx: &mut RigContext<'_>, args: BuildArgs) -> RigResult<()> {
        self.build(ctx, args)
    }

    fn connect_dyn(&mut self, ctx: &mut RigContext<'_>, args: BuildArgs) -> RigResult<()> {
        self.connect(ctx, args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Rehydrate a rig root as a known type, checking its stored tag
pub fn rehydrate_as<N: RigNode>(graph: &dyn SceneGraph, root: NodeId) -> RigResult<N> {
    let info = get_info(graph, root)?;
    if info.type_tag != N::TYPE_TAG {
        return Err(RigError::TypeTagMismatch {
            expected: N::TYPE_TAG.to_string(),
            found: info.type_tag,
        });
    }
    let mut node = N::from_core(RigNodeCore::from_graph(graph, root)?);
    node.read_info(graph)?;
    Ok(node)
}

struct Entry {
    create: fn(RigNodeCore) -> Box<dyn DynRigNode>,
    rehydrate: fn(&dyn SceneGraph, NodeId) -> RigResult<Box<dyn DynRigNode>>,
}

fn create<N: RigNode>(core: RigNodeCore) -> Box<dyn DynRigNode> {
    Box::new(N::from_core(core))
}

fn rehydrate<N: RigNode>(graph: &dyn SceneGraph, root: NodeId) -> RigResult<Box<dyn DynRigNode>> {
    Ok(Box::new(rehydrate_as::<N>(graph, root)?))
}

/// Type tag to constructor table
#[derive(Default)]
pub struct RigRegistry {
    entries: IndexMap<&'static str, Entry>,
}

impl RigRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rig node type
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register::<Master>();
        registry.register::<FkChain>();
        registry.register::<StretchChain>();
        registry.register::<TwistSegment>();
        registry.register::<SpaceSwitch>();
        registry
    }

    /// Register a type under its tag, replacing any previous entry
    pub fn register<N: RigNode>(&mut self) {
        let previous = self.entries.insert(
            N::TYPE_TAG,
            Entry {
                create: create::<N>,
                rehydrate: rehydrate::<N>,
            },
        );
        if previous.is_some() {
            tracing::warn!("Replacing registered rig type '{}'", N::TYPE_TAG);
        }
    }

    /// Registered tags, in registration order
    pub fn tags(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Whether a tag is registered
    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    fn entry(&self, tag: &str) -> RigResult<&Entry> {
        self.entries
            .get(tag)
            .ok_or_else(|| RigError::UnknownRigType(tag.to_string()))
    }

    /// Fresh, unbuilt wrapper of type `tag`
    pub fn create(&self, tag: &str, name: NameTuple) -> RigResult<Box<dyn DynRigNode>> {
        Ok((self.entry(tag)?.create)(RigNodeCore::new(name)))
    }

    /// Wrapper for an existing rig root, typed by its stored tag
    pub fn rehydrate(&self, graph: &dyn SceneGraph, root: NodeId) -> RigResult<Box<dyn DynRigNode>> {
        let tag = get_info(graph, root)?.type_tag;
        (self.entry(&tag)?.rehydrate)(graph, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ArgValue;
    use crate::config::RigConfig;
    use rigkit_graph::Graph;

    #[test]
    fn test_builtin_tags() {
        let registry = RigRegistry::with_builtin();
        assert_eq!(
            registry.tags(),
            vec!["master", "fk_chain", "stretch_chain", "twist_segment", "space_switch"]
        );
    }

    #[test]
    fn test_unknown_tag() {
        let registry = RigRegistry::with_builtin();
        let err = registry
            .create("spline_ik", NameTuple::new("C", "spine", 0))
            .err()
            .unwrap();
        assert!(matches!(err, RigError::UnknownRigType(tag) if tag == "spline_ik"));
    }

    #[test]
    fn test_connect_before_build_fails_for_every_type() {
        let mut graph = Graph::new("registry");
        let config = RigConfig::default();
        let registry = RigRegistry::with_builtin();
        let mut ctx = RigContext::new(&mut graph, &config);
        for tag in registry.tags() {
            let mut node = registry.create(tag, NameTuple::new("C", "early", 0)).unwrap();
            let err = node.connect_dyn(&mut ctx, BuildArgs::new()).unwrap_err();
            assert!(matches!(err, RigError::MissingHandle(_)), "{tag}: {err}");
        }
        drop(ctx);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_rehydrate_dispatches_on_stored_tag() {
        let mut graph = Graph::new("registry");
        let config = RigConfig::default();
        let registry = RigRegistry::with_builtin();
        let root = {
            let mut ctx = RigContext::new(&mut graph, &config);
            let mut node = registry
                .create("master", NameTuple::new("C", "master", 0))
                .unwrap();
            node.build_dyn(&mut ctx, BuildArgs::new().with("size", ArgValue::Float(2.0)))
                .unwrap();
            node.connect_dyn(&mut ctx, BuildArgs::new()).unwrap();
            node.rig_core().root().unwrap()
        };

        let node = registry.rehydrate(&graph, root).unwrap();
        assert_eq!(node.tag(), "master");
        assert!(node.as_any().downcast_ref::<Master>().is_some());
        assert_eq!(node.rig_core().name, NameTuple::new("C", "master", 0));

        let err = rehydrate_as::<FkChain>(&graph, root).err().unwrap();
        assert!(matches!(err, RigError::TypeTagMismatch { .. }));
    }
}
