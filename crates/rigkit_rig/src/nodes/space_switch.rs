// SPDX-License-Identifier: MIT OR Apache-2.0
//! Space switch: blends a control's zero group between named spaces.
//!
//! The build section puts the selector ports on the target control and
//! derives per-space visibility from them. Drivers for each space are only
//! known once the rest of the rig exists, so the blend itself is wired at
//! connect time from the space names stored on the control.

use crate::args::{ArgKind, ArgSpec, ArgValue};
use crate::capability::{HasInputPorts, HasOutputPorts};
use crate::constraint::Channels;
use crate::error::{RigError, RigResult};
use crate::lifecycle::{Lifecycle, RigContext, RigNode, RigNodeCore};
use crate::space::{
    add_blend_attr, add_visibility_switch, blend_slot, sort_spaces, visible_port, BlendAttrs,
};
use crate::steps::Section;
use crate::transform::{self, ports};
use rigkit_graph::{NodeId, Port, PortRef, PortType, PortValue, SceneGraph};

/// Root port holding the switched control
pub const SPACE_TARGET: &str = "spaceTarget";
/// Prefix of the blend ports on the target
pub const SPACE_PREFIX: &str = "space";

/// Two-slot space blend on one control
#[derive(Debug, Clone)]
pub struct SpaceSwitch {
    core: RigNodeCore,
    target: Option<NodeId>,
}

impl SpaceSwitch {
    /// Control carrying the selector ports
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    fn require_target(&self) -> RigResult<NodeId> {
        self.target.ok_or(RigError::MissingHandle("space target"))
    }
}

/// Split a `space=node` or `space=node.port` entry
fn parse_entry<'a>(key: &str, entry: &'a str) -> RigResult<(&'a str, &'a str, Option<&'a str>)> {
    let (space, source) = entry
        .split_once('=')
        .ok_or_else(|| RigError::invalid_arg(key, format!("expected 'space=node', got '{entry}'")))?;
    let (node, port) = match source.split_once('.') {
        Some((node, port)) => (node.trim(), Some(port.trim())),
        None => (source.trim(), None),
    };
    let space = space.trim();
    if space.is_empty() || node.is_empty() || port.is_some_and(str::is_empty) {
        return Err(RigError::invalid_arg(key, format!("malformed entry '{entry}'")));
    }
    Ok((space, node, port))
}

fn create_space_attrs(node: &mut SpaceSwitch, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let root = node.core.root()?;
    let args = &node.core.args;
    let target = args.node("target")?;
    let set = sort_spaces(
        args.str_list("spaces")?,
        args.opt_str("default_a")?,
        args.opt_str("default_b")?,
        &ctx.config.spaces,
    )?;
    let show_all = args.bool("show_all")?;

    let attrs = add_blend_attr(ctx, root, target, &set, SPACE_PREFIX)?;
    ctx.set(target, &attrs.show_all.port, PortValue::Bool(show_all))?;
    add_visibility_switch(ctx, root, &attrs, &set)?;

    ctx.graph.add_port(
        root,
        Port::input(SPACE_TARGET, PortType::Handle).with_default(PortValue::Handle(Some(target))),
    )?;
    ctx.graph.set_locked(root, SPACE_TARGET, true)?;
    node.target = Some(target);
    tracing::debug!(
        "Space switch '{}' over [{}]",
        node.core.name,
        set.names().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

fn connect_spaces(node: &mut SpaceSwitch, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let root = node.core.root()?;
    let target = node.require_target()?;
    let attrs = BlendAttrs::from_host(&*ctx.graph, target, SPACE_PREFIX)?;
    let names = attrs.space_names(&*ctx.graph)?;
    let set = sort_spaces(names.as_slice(), None, None, &ctx.config.spaces)?;
    let args = &node.core.args;

    let mut candidates = Vec::new();
    for entry in args.str_list("drivers")? {
        let (space, source, port) = parse_entry("drivers", entry)?;
        let source = ctx.graph.require_node(source)?;
        let port = port.unwrap_or(ports::WORLD_MATRIX);
        candidates.push((space.to_string(), PortRef::new(source, port)));
    }
    let mut displays = Vec::new();
    if args.contains("visibility") {
        for entry in args.str_list("visibility")? {
            let (space, display, port) = parse_entry("visibility", entry)?;
            set.require(space)?;
            let display = ctx.graph.require_node(display)?;
            displays.push((space.to_string(), PortRef::new(display, port.unwrap_or("visibility"))));
        }
    }
    let channels = Channels::from_name(args.str("channels")?)?;

    let zero = ctx.graph.parent(target)?.ok_or_else(|| {
        RigError::invalid_arg("target", "the switched control needs a parent group")
    })?;
    let name = node.core.compose_part(ctx, SPACE_PREFIX, "blend")?;
    blend_slot(ctx, root, &attrs, &set, &candidates, zero, channels, true, &name)?;

    for (space, display) in displays {
        ctx.connect(&PortRef::new(target, visible_port(&space)), &display)?;
    }
    Ok(())
}

impl RigNode for SpaceSwitch {
    const TYPE_TAG: &'static str = "space_switch";

    fn from_core(core: RigNodeCore) -> Self {
        Self { core, target: None }
    }

    fn core(&self) -> &RigNodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RigNodeCore {
        &mut self.core
    }

    fn arg_specs(section: Section) -> Vec<ArgSpec> {
        match section {
            Section::Build => vec![
                ArgSpec::optional("target", ArgKind::Node).side_sensitive(),
                ArgSpec::optional("spaces", ArgKind::StrList),
                ArgSpec::optional("default_a", ArgKind::Str),
                ArgSpec::optional("default_b", ArgKind::Str),
                ArgSpec::with_default("show_all", ArgKind::Bool, ArgValue::Bool(false)),
            ],
            Section::Connect => {
                let mut specs = transform::input_arg_specs();
                specs.extend([
                    ArgSpec::optional("drivers", ArgKind::StrList),
                    ArgSpec::optional("visibility", ArgKind::StrList),
                    ArgSpec::with_default("channels", ArgKind::Str, ArgValue::Str("all".into())),
                ]);
                specs
            }
        }
    }

    fn register_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        Self::register_input_steps(lifecycle)?;
        Self::register_output_steps(lifecycle)?;
        lifecycle.add_build_step(
            "create_space_attrs",
            create_space_attrs,
            Section::Build,
            Some("register_outputs".into()),
        )?;
        lifecycle.add_build_step(
            "connect_spaces",
            connect_spaces,
            Section::Connect,
            Some("connect_inputs".into()),
        )
    }

    fn read_info(&mut self, graph: &dyn SceneGraph) -> RigResult<()> {
        let root = self.core.root()?;
        self.target = graph.get(root, SPACE_TARGET)?.as_handle().flatten();
        Ok(())
    }
}

impl HasInputPorts for SpaceSwitch {}
impl HasOutputPorts for SpaceSwitch {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::BuildArgs;
    use crate::config::RigConfig;
    use crate::naming::NameTuple;
    use crate::registry::rehydrate_as;
    use rigkit_graph::{Graph, NodeKind, TransformRole};

    struct Scene {
        world: NodeId,
        prop: NodeId,
        zero: NodeId,
        control: NodeId,
    }

    fn scene(graph: &mut Graph) -> Scene {
        let group = NodeKind::Transform(TransformRole::Group);
        let world = graph.create_node(group, "C_world_00_grp", None).unwrap();
        let prop = graph.create_node(group, "C_prop_00_grp", None).unwrap();
        graph
            .set(prop, "translateX", PortValue::Float(10.0), false)
            .unwrap();
        let zero = graph.create_node(group, "L_hand_00_zero", None).unwrap();
        let control = graph
            .create_node(
                NodeKind::Transform(TransformRole::Control),
                "L_hand_00_ctl",
                Some(zero),
            )
            .unwrap();
        Scene {
            world,
            prop,
            zero,
            control,
        }
    }

    fn strings(items: &[&str]) -> ArgValue {
        ArgValue::StrList(items.iter().map(|s| s.to_string()).collect())
    }

    fn build(graph: &mut Graph, config: &RigConfig, scene: &Scene) -> SpaceSwitch {
        let mut ctx = RigContext::new(graph, config);
        let mut switch =
            SpaceSwitch::from_core(RigNodeCore::new(NameTuple::new("L", "handSpace", 0)));
        let build = BuildArgs::new()
            .with("target", ArgValue::Node(scene.control))
            .with("spaces", strings(&["prop", "world"]))
            .with("default_b", ArgValue::Str("prop".into()));
        let connect = BuildArgs::new()
            .with(
                "drivers",
                strings(&["world=C_world_00_grp", "prop=C_prop_00_grp.worldMatrix"]),
            )
            .with("visibility", strings(&["prop=C_prop_00_grp"]));
        switch.build(&mut ctx, build).unwrap();
        switch.connect(&mut ctx, connect).unwrap();
        switch
    }

    fn zero_x(graph: &Graph, scene: &Scene) -> f32 {
        graph
            .get_matrix(scene.zero, ports::WORLD_MATRIX)
            .unwrap()
            .w_axis
            .x
    }

    #[test]
    fn test_selectors_follow_priority_order() {
        let mut graph = Graph::new("space");
        let config = RigConfig::default();
        let scene = scene(&mut graph);
        build(&mut graph, &config, &scene);

        let attrs = BlendAttrs::from_host(&graph, scene.control, SPACE_PREFIX).unwrap();
        assert_eq!(attrs.space_names(&graph).unwrap(), vec!["world", "prop"]);
        assert_eq!(graph.get_int(scene.control, "spaceA").unwrap(), 0);
        assert_eq!(graph.get_int(scene.control, "spaceB").unwrap(), 100);
    }

    #[test]
    fn test_blend_moves_between_spaces() {
        let mut graph = Graph::new("space");
        let config = RigConfig::default();
        let scene = scene(&mut graph);
        build(&mut graph, &config, &scene);

        // Nothing moves when the switch is created
        assert!(zero_x(&graph, &scene).abs() < 1e-4);

        graph
            .set(scene.prop, "translateX", PortValue::Float(20.0), false)
            .unwrap();
        assert!(zero_x(&graph, &scene).abs() < 1e-4);

        graph
            .set(scene.control, "spaceBlend", PortValue::Float(0.5), false)
            .unwrap();
        assert!((zero_x(&graph, &scene) - 5.0).abs() < 1e-3);

        graph
            .set(scene.control, "spaceBlend", PortValue::Float(1.0), false)
            .unwrap();
        assert!((zero_x(&graph, &scene) - 10.0).abs() < 1e-3);

        graph
            .set(scene.world, "translateX", PortValue::Float(-3.0), false)
            .unwrap();
        assert!((zero_x(&graph, &scene) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_visibility_drives_display_node() {
        let mut graph = Graph::new("space");
        let config = RigConfig::default();
        let scene = scene(&mut graph);
        build(&mut graph, &config, &scene);

        let visible = |graph: &Graph| graph.get(scene.prop, "visibility").unwrap().as_bool();
        assert_eq!(visible(&graph), Some(false));
        graph
            .set(scene.control, "spaceBlend", PortValue::Float(1.0), false)
            .unwrap();
        assert_eq!(visible(&graph), Some(true));
    }

    #[test]
    fn test_unknown_driver_space_fails() {
        let mut graph = Graph::new("space");
        let config = RigConfig::default();
        let scene = scene(&mut graph);
        let mut ctx = RigContext::new(&mut graph, &config);
        let mut switch =
            SpaceSwitch::from_core(RigNodeCore::new(NameTuple::new("L", "handSpace", 0)));
        switch
            .build(
                &mut ctx,
                BuildArgs::new()
                    .with("target", ArgValue::Node(scene.control))
                    .with("spaces", strings(&["world", "prop"])),
            )
            .unwrap();
        let err = switch
            .connect(
                &mut ctx,
                BuildArgs::new().with(
                    "drivers",
                    strings(&["world=C_world_00_grp", "moon=C_prop_00_grp"]),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, RigError::UnknownSpace(space) if space == "moon"));
    }

    #[test]
    fn test_parse_entry() {
        assert_eq!(
            parse_entry("drivers", "world=C_world_00_grp").unwrap(),
            ("world", "C_world_00_grp", None)
        );
        assert_eq!(
            parse_entry("drivers", "prop=C_prop_00_grp.outputMatrix").unwrap(),
            ("prop", "C_prop_00_grp", Some("outputMatrix"))
        );
        assert!(parse_entry("drivers", "C_prop_00_grp").is_err());
        assert_eq!(
            parse_entry("drivers", " world = C_world_00_grp ").unwrap(),
            ("world", "C_world_00_grp", None)
        );
    }

    #[test]
    fn test_parse_entry_rejects_blank_parts() {
        for entry in [" =C_world_00_grp", "world=  ", "prop=C_prop_00_grp. "] {
            let err = parse_entry("drivers", entry).unwrap_err();
            assert!(matches!(err, RigError::InvalidArg { .. }), "{entry}");
        }
    }

    #[test]
    fn test_rehydrate_restores_target() {
        let mut graph = Graph::new("space");
        let config = RigConfig::default();
        let scene = scene(&mut graph);
        let switch = build(&mut graph, &config, &scene);

        let back: SpaceSwitch = rehydrate_as(&graph, switch.core.root().unwrap()).unwrap();
        assert_eq!(back.target(), Some(scene.control));
    }
}
