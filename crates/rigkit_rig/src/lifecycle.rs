// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node lifecycle: build and connect phases, step registration and hooks.
//!
//! Every rig node type implements [`RigNode`]. Its steps live in a
//! [`Lifecycle`], assembled from the capabilities the type opts into plus
//! its own steps. `build()` runs the build section; `connect()` runs the
//! connect section with hook points around it:
//!
//! 1. argument validation (and mirroring for flipped builds)
//! 2. `apply_settings`
//! 3. `pre_input_registration`
//! 4. connect steps
//! 5. `post_build`
//! 6. `pre_output_registration`
//! 7. output registration
//! 8. `post_output_registration`

use crate::args::{self, ArgSpec, BuildArgs};
use crate::config::RigConfig;
use crate::error::{RigError, RigResult};
use crate::naming::{NameTuple, Naming};
use crate::steps::{Anchor, Section, StepList};
use crate::transform::{self, ports};
use rigkit_graph::{NodeId, NodeKind, PortRef, PortValue, SceneGraph, WriteOutcome};

/// Shared state handed to every step
pub struct RigContext<'a> {
    /// Host scene graph
    pub graph: &'a mut dyn SceneGraph,
    /// Active configuration
    pub config: &'a RigConfig,
    /// Naming service for `config.naming`
    pub naming: Naming,
}

impl<'a> RigContext<'a> {
    /// Create a context over a graph
    pub fn new(graph: &'a mut dyn SceneGraph, config: &'a RigConfig) -> Self {
        Self {
            graph,
            config,
            naming: Naming::new(config.naming.clone()),
        }
    }

    /// Create a utility node owned by the rig rooted at `owner`.
    ///
    /// Owned helpers are deleted together with the rig.
    pub fn helper(&mut self, owner: NodeId, kind: NodeKind, name: &str) -> RigResult<NodeId> {
        let id = self.graph.create_node(kind, name, None)?;
        self.graph.append_handle(owner, ports::HELPERS, id)?;
        Ok(id)
    }

    /// Join a base name and a token with the naming separator
    pub fn join(&self, base: &str, token: &str) -> String {
        format!("{base}{}{token}", self.naming.config().separator)
    }

    /// Connect without forcing
    pub fn connect(&mut self, src: &PortRef, dst: &PortRef) -> RigResult<WriteOutcome> {
        Ok(self.graph.connect(src, dst, false)?)
    }

    /// Write without forcing
    pub fn set(&mut self, node: NodeId, port: &str, value: PortValue) -> RigResult<WriteOutcome> {
        Ok(self.graph.set(node, port, value, false)?)
    }
}

/// How far a rig node has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    /// Wrapper exists, nothing built
    #[default]
    Created,
    /// Build section has run
    Built,
    /// Connect section has run
    Connected,
}

impl Stage {
    /// Integer stored on the root node
    pub fn as_int(self) -> i32 {
        match self {
            Self::Created => 0,
            Self::Built => 1,
            Self::Connected => 2,
        }
    }

    /// Decode the stored integer
    pub fn from_int(value: i32) -> Self {
        match value {
            1 => Self::Built,
            2 => Self::Connected,
            _ => Self::Created,
        }
    }
}

/// State every rig node wrapper carries
#[derive(Debug, Clone)]
pub struct RigNodeCore {
    /// Structured name (mirrored for flipped builds)
    pub name: NameTuple,
    /// Root group holding the metadata ports
    pub root: Option<NodeId>,
    /// Group carrying the incoming placement
    pub input: Option<NodeId>,
    /// Group following the published hierarchy matrix
    pub output: Option<NodeId>,
    /// Rig this one hangs under
    pub parent: Option<NodeId>,
    /// Joints, in creation order
    pub joints: Vec<NodeId>,
    /// Controls, in creation order
    pub controls: Vec<NodeId>,
    /// Published output names
    pub outputs: Vec<String>,
    /// Validated arguments of both sections
    pub args: BuildArgs,
    /// Lifecycle progress
    pub stage: Stage,
    /// Whether the build was mirrored
    pub flipped: bool,
}

impl RigNodeCore {
    /// Fresh, unbuilt core
    pub fn new(name: NameTuple) -> Self {
        Self {
            name,
            root: None,
            input: None,
            output: None,
            parent: None,
            joints: Vec::new(),
            controls: Vec::new(),
            outputs: Vec::new(),
            args: BuildArgs::new(),
            stage: Stage::Created,
            flipped: false,
        }
    }

    /// Root group
    pub fn root(&self) -> RigResult<NodeId> {
        self.root.ok_or(RigError::MissingHandle("root group"))
    }

    /// Input group
    pub fn input(&self) -> RigResult<NodeId> {
        self.input.ok_or(RigError::MissingHandle("input group"))
    }

    /// Output group
    pub fn output(&self) -> RigResult<NodeId> {
        self.output.ok_or(RigError::MissingHandle("output group"))
    }

    /// Compose a scene name for a part of this rig node
    pub fn compose(&self, ctx: &RigContext<'_>, suffix: &str) -> RigResult<String> {
        Ok(ctx.naming.compose(&self.name, suffix)?)
    }

    /// Compose a scene name with one extra token
    pub fn compose_part(&self, ctx: &RigContext<'_>, token: &str, suffix: &str) -> RigResult<String> {
        let name = self.name.clone().with_extra(token);
        Ok(ctx.naming.compose(&name, suffix)?)
    }
}

/// Step function signature
pub type StepFn<N> = fn(&mut N, &mut RigContext<'_>) -> RigResult<()>;

/// Build and connect step lists of one node type
pub struct Lifecycle<N> {
    build: StepList<StepFn<N>>,
    connect: StepList<StepFn<N>>,
}

impl<N: RigNode> Lifecycle<N> {
    /// Empty lifecycle
    pub fn empty() -> Self {
        Self {
            build: StepList::new(),
            connect: StepList::new(),
        }
    }

    /// Lifecycle with every step `N` registers
    pub fn new() -> RigResult<Self> {
        let mut lifecycle = Self::empty();
        N::register_steps(&mut lifecycle)?;
        Ok(lifecycle)
    }

    /// Register a step in a section, optionally after an anchor
    pub fn add_build_step(
        &mut self,
        name: &str,
        step: StepFn<N>,
        section: Section,
        after: Option<Anchor>,
    ) -> RigResult<()> {
        self.steps_mut(section).insert(name, step, after)
    }

    /// Steps of a section
    pub fn steps(&self, section: Section) -> &StepList<StepFn<N>> {
        match section {
            Section::Build => &self.build,
            Section::Connect => &self.connect,
        }
    }

    fn steps_mut(&mut self, section: Section) -> &mut StepList<StepFn<N>> {
        match section {
            Section::Build => &mut self.build,
            Section::Connect => &mut self.connect,
        }
    }

    /// Step names of a section, in run order
    pub fn step_names(&self, section: Section) -> Vec<String> {
        self.steps(section)
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn run(&self, node: &mut N, section: Section, ctx: &mut RigContext<'_>) -> RigResult<()> {
        for (name, step) in self.steps(section).iter() {
            tracing::trace!("{} '{}': step {}", N::TYPE_TAG, node.core().name, name);
            step(node, ctx)?;
        }
        Ok(())
    }

    /// Run the build section
    pub fn build(&self, node: &mut N, ctx: &mut RigContext<'_>, raw: BuildArgs) -> RigResult<()> {
        require_stage(node, "build", Stage::Created)?;
        ctx.naming.validate(&node.core().name)?;
        prepare_args(node, Section::Build, ctx, raw)?;
        node.apply_settings(Section::Build, ctx)?;
        self.run(node, Section::Build, ctx)?;
        set_stage(node, ctx, Stage::Built)?;
        tracing::info!("Built {} '{}'", N::TYPE_TAG, node.core().name);
        Ok(())
    }

    /// Run the connect section and its hooks
    pub fn connect(&self, node: &mut N, ctx: &mut RigContext<'_>, raw: BuildArgs) -> RigResult<()> {
        node.core().root()?;
        require_stage(node, "connect", Stage::Built)?;
        prepare_args(node, Section::Connect, ctx, raw)?;
        node.apply_settings(Section::Connect, ctx)?;
        node.pre_input_registration(ctx)?;
        self.run(node, Section::Connect, ctx)?;
        node.post_build(ctx)?;
        node.pre_output_registration(ctx)?;
        if let Some(driver) = node.output_driver() {
            transform::drive_output(ctx, node.core(), driver)?;
        }
        set_stage(node, ctx, Stage::Connected)?;
        node.post_output_registration(ctx)?;
        tracing::info!("Connected {} '{}'", N::TYPE_TAG, node.core().name);
        Ok(())
    }
}

fn prepare_args<N: RigNode>(
    node: &mut N,
    section: Section,
    ctx: &mut RigContext<'_>,
    raw: BuildArgs,
) -> RigResult<()> {
    let specs = N::arg_specs(section);
    let mut args = args::validate(&specs, raw, &*ctx.graph)?;
    if args.flip() {
        args = args::flip_args(&specs, args, &ctx.naming, &*ctx.graph)?;
        if section == Section::Build && !node.core().flipped {
            let flipped = ctx.naming.flip(&node.core().name)?;
            let core = node.core_mut();
            core.name = flipped;
            core.flipped = true;
        }
    }
    node.core_mut().args.extend(args);
    Ok(())
}

fn require_stage<N: RigNode>(node: &N, operation: &'static str, expected: Stage) -> RigResult<()> {
    let core = node.core();
    if core.stage != expected {
        return Err(RigError::WrongStage {
            operation,
            rig: core.name.to_string(),
            stage: core.stage,
        });
    }
    Ok(())
}

fn set_stage<N: RigNode>(node: &mut N, ctx: &mut RigContext<'_>, stage: Stage) -> RigResult<()> {
    let root = node.core().root()?;
    ctx.graph
        .set(root, ports::BUILD_STAGE, PortValue::Int(stage.as_int()), true)?;
    node.core_mut().stage = stage;
    Ok(())
}

/// A rig node type
pub trait RigNode: Sized + 'static {
    /// Type tag stored on the root and used by the registry
    const TYPE_TAG: &'static str;

    /// Wrap an existing core
    fn from_core(core: RigNodeCore) -> Self;

    /// Shared state
    fn core(&self) -> &RigNodeCore;

    /// Shared state, mutably
    fn core_mut(&mut self) -> &mut RigNodeCore;

    /// Recognized arguments of a section
    fn arg_specs(section: Section) -> Vec<ArgSpec>;

    /// Register this type's steps
    fn register_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()>;

    /// Node whose world matrix becomes the published output matrix
    fn output_driver(&self) -> Option<NodeId> {
        None
    }

    /// Runs after argument validation, before the section's steps
    fn apply_settings(&mut self, _section: Section, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        Ok(())
    }

    /// Runs before the connect steps
    fn pre_input_registration(&mut self, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        Ok(())
    }

    /// Runs after the connect steps
    fn post_build(&mut self, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        Ok(())
    }

    /// Runs before output registration
    fn pre_output_registration(&mut self, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        Ok(())
    }

    /// Runs after output registration
    fn post_output_registration(&mut self, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        Ok(())
    }

    /// Restore type-specific state after rehydration
    fn read_info(&mut self, _graph: &dyn SceneGraph) -> RigResult<()> {
        Ok(())
    }

    /// Run the build section
    fn build(&mut self, ctx: &mut RigContext<'_>, args: BuildArgs) -> RigResult<()> {
        Lifecycle::<Self>::new()?.build(self, ctx, args)
    }

    /// Run the connect section
    fn connect(&mut self, ctx: &mut RigContext<'_>, args: BuildArgs) -> RigResult<()> {
        Lifecycle::<Self>::new()?.connect(self, ctx, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ArgKind, ArgValue};
    use rigkit_graph::Graph;

    struct Recorder {
        core: RigNodeCore,
        log: Vec<String>,
    }

    fn step_a(node: &mut Recorder, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        node.log.push("a".into());
        Ok(())
    }

    fn step_x(node: &mut Recorder, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        node.log.push("x".into());
        Ok(())
    }

    fn step_y(node: &mut Recorder, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        node.log.push("y".into());
        Ok(())
    }

    fn step_link(node: &mut Recorder, _ctx: &mut RigContext<'_>) -> RigResult<()> {
        node.log.push("link".into());
        Ok(())
    }

    impl RigNode for Recorder {
        const TYPE_TAG: &'static str = "recorder";

        fn from_core(core: RigNodeCore) -> Self {
            Self {
                core,
                log: Vec::new(),
            }
        }

        fn core(&self) -> &RigNodeCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut RigNodeCore {
            &mut self.core
        }

        fn arg_specs(section: Section) -> Vec<ArgSpec> {
            match section {
                Section::Build => vec![ArgSpec::with_default(
                    "size",
                    ArgKind::Float,
                    ArgValue::Float(1.0),
                )],
                Section::Connect => Vec::new(),
            }
        }

        fn register_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
            lifecycle.add_build_step(
                "create_hierarchy",
                transform::create_hierarchy,
                Section::Build,
                None,
            )?;
            lifecycle.add_build_step("a", step_a, Section::Build, None)?;
            lifecycle.add_build_step("x", step_x, Section::Build, None)?;
            lifecycle.add_build_step("link", step_link, Section::Connect, None)?;
            lifecycle.add_build_step("y", step_y, Section::Build, Some("a".into()))
        }

        fn apply_settings(&mut self, section: Section, _ctx: &mut RigContext<'_>) -> RigResult<()> {
            self.log.push(format!("settings:{section:?}"));
            Ok(())
        }

        fn pre_input_registration(&mut self, _ctx: &mut RigContext<'_>) -> RigResult<()> {
            self.log.push("pre_input".into());
            Ok(())
        }

        fn post_build(&mut self, _ctx: &mut RigContext<'_>) -> RigResult<()> {
            self.log.push("post_build".into());
            Ok(())
        }

        fn pre_output_registration(&mut self, _ctx: &mut RigContext<'_>) -> RigResult<()> {
            self.log.push("pre_output".into());
            Ok(())
        }

        fn post_output_registration(&mut self, _ctx: &mut RigContext<'_>) -> RigResult<()> {
            self.log.push("post_output".into());
            Ok(())
        }
    }

    #[test]
    fn test_steps_run_in_registered_order() {
        let lifecycle = Lifecycle::<Recorder>::new().unwrap();
        assert_eq!(
            lifecycle.step_names(Section::Build),
            vec!["create_hierarchy", "a", "y", "x"]
        );
        assert_eq!(lifecycle.step_names(Section::Connect), vec!["link"]);
    }

    #[test]
    fn test_hook_order() {
        let mut graph = Graph::new("lifecycle");
        let config = RigConfig::default();
        let mut ctx = RigContext::new(&mut graph, &config);
        let mut node = Recorder::from_core(RigNodeCore::new(NameTuple::new("C", "test", 0)));

        node.build(&mut ctx, BuildArgs::new()).unwrap();
        assert_eq!(node.core.stage, Stage::Built);
        node.connect(&mut ctx, BuildArgs::new()).unwrap();
        assert_eq!(node.core.stage, Stage::Connected);

        assert_eq!(
            node.log,
            vec![
                "settings:Build",
                "a",
                "y",
                "x",
                "settings:Connect",
                "pre_input",
                "link",
                "post_build",
                "pre_output",
                "post_output",
            ]
        );
        assert_eq!(node.core.args.float("size").unwrap(), 1.0);
    }

    #[test]
    fn test_flipped_build_mirrors_name() {
        let mut graph = Graph::new("lifecycle");
        let config = RigConfig::default();
        let mut ctx = RigContext::new(&mut graph, &config);
        let mut node = Recorder::from_core(RigNodeCore::new(NameTuple::new("L", "arm", 0)));
        node.build(&mut ctx, BuildArgs::new().with("flip", ArgValue::Bool(true)))
            .unwrap();
        assert_eq!(node.core.name.side, "R");
        assert!(node.core.flipped);
    }

    #[test]
    fn test_connect_requires_build() {
        let mut graph = Graph::new("lifecycle");
        let config = RigConfig::default();
        let mut ctx = RigContext::new(&mut graph, &config);
        let mut node = Recorder::from_core(RigNodeCore::new(NameTuple::new("C", "test", 0)));
        let err = node.connect(&mut ctx, BuildArgs::new()).unwrap_err();
        assert!(matches!(err, RigError::MissingHandle(_)));
        assert_eq!(node.core.stage, Stage::Created);
        assert!(node.log.is_empty());
    }

    #[test]
    fn test_second_build_is_rejected() {
        let mut graph = Graph::new("lifecycle");
        let config = RigConfig::default();
        let mut node = Recorder::from_core(RigNodeCore::new(NameTuple::new("C", "test", 0)));
        {
            let mut ctx = RigContext::new(&mut graph, &config);
            node.build(&mut ctx, BuildArgs::new()).unwrap();
        }
        let count = graph.node_count();
        let mut ctx = RigContext::new(&mut graph, &config);
        let err = node.build(&mut ctx, BuildArgs::new()).unwrap_err();
        assert!(matches!(
            err,
            RigError::WrongStage { operation: "build", stage: Stage::Built, .. }
        ));
        drop(ctx);
        assert_eq!(graph.node_count(), count);
    }

    #[test]
    fn test_connect_twice_is_rejected() {
        let mut graph = Graph::new("lifecycle");
        let config = RigConfig::default();
        let mut ctx = RigContext::new(&mut graph, &config);
        let mut node = Recorder::from_core(RigNodeCore::new(NameTuple::new("C", "test", 0)));
        node.build(&mut ctx, BuildArgs::new()).unwrap();
        node.connect(&mut ctx, BuildArgs::new()).unwrap();
        let err = node.connect(&mut ctx, BuildArgs::new()).unwrap_err();
        assert!(matches!(err, RigError::WrongStage { operation: "connect", .. }));
    }

    #[test]
    fn test_stage_round_trip() {
        for stage in [Stage::Created, Stage::Built, Stage::Connected] {
            assert_eq!(Stage::from_int(stage.as_int()), stage);
        }
    }

    #[test]
    fn test_missing_root_is_lookup_error() {
        let core = RigNodeCore::new(NameTuple::new("C", "test", 0));
        assert!(matches!(core.root(), Err(RigError::MissingHandle(_))));
    }
}
