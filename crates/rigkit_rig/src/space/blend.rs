// SPDX-License-Identifier: MIT OR Apache-2.0
//! Two-slot blend between selected spaces.

use super::SpaceSet;
use crate::constraint::{constrain, Channels, Target, TargetWeight};
use crate::error::{RigError, RigResult};
use crate::lifecycle::RigContext;
use crate::transform::{mult_matrix, ports, MatrixTerm};
use rigkit_graph::{
    indexed, GraphError, NodeId, NodeKind, Port, PortRef, PortType, PortValue, SceneGraph,
};

/// Selector, weight and override ports on a blend host
#[derive(Debug, Clone)]
pub struct BlendAttrs {
    /// Node carrying the ports
    pub host: NodeId,
    /// Selector A
    pub a: PortRef,
    /// Selector B
    pub b: PortRef,
    /// Weight of B, in `[0, 1]`
    pub blend: PortRef,
    /// Weight of A, `1 - blend`, locked
    pub inverse: PortRef,
    /// Visibility override
    pub show_all: PortRef,
    /// Space names, in index order
    pub names: PortRef,
}

impl BlendAttrs {
    fn port_names(prefix: &str) -> [String; 6] {
        ["A", "B", "Blend", "BlendInverse", "ShowAll", "Names"].map(|s| format!("{prefix}{s}"))
    }

    fn from_names(host: NodeId, names: [String; 6]) -> Self {
        let [a, b, blend, inverse, show_all, space_names] = names;
        Self {
            host,
            a: PortRef::new(host, a),
            b: PortRef::new(host, b),
            blend: PortRef::new(host, blend),
            inverse: PortRef::new(host, inverse),
            show_all: PortRef::new(host, show_all),
            names: PortRef::new(host, space_names),
        }
    }

    /// Read back the ports [`add_blend_attr`] created on `host`
    pub fn from_host(graph: &dyn SceneGraph, host: NodeId, prefix: &str) -> RigResult<Self> {
        let names = Self::port_names(prefix);
        if let Some(missing) = names.iter().find(|n| !graph.has_port(host, n)) {
            return Err(GraphError::PortNotFound {
                node: graph.node_name(host)?,
                port: missing.clone(),
            }
            .into());
        }
        Ok(Self::from_names(host, names))
    }

    /// Space names stored on the host
    pub fn space_names(&self, graph: &dyn SceneGraph) -> RigResult<Vec<String>> {
        match graph.get(self.names.node, &self.names.port)? {
            PortValue::StringList(names) => Ok(names),
            _ => Err(GraphError::TypeMismatch {
                port: self.names.port.clone(),
                expected: PortType::StringList,
            }
            .into()),
        }
    }
}

/// Expose the blend ports of `set` on `host`, named `{prefix}A`,
/// `{prefix}B`, `{prefix}Blend`, `{prefix}BlendInverse`, `{prefix}ShowAll`
/// and `{prefix}Names`.
pub fn add_blend_attr(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    host: NodeId,
    set: &SpaceSet,
    prefix: &str,
) -> RigResult<BlendAttrs> {
    let attrs = BlendAttrs::from_names(host, BlendAttrs::port_names(prefix));

    let fields = set.enum_fields();
    ctx.graph.add_port(
        host,
        Port::enumeration(&attrs.a.port, fields.clone())
            .with_default(PortValue::Int(set.default_a())),
    )?;
    ctx.graph.add_port(
        host,
        Port::enumeration(&attrs.b.port, fields).with_default(PortValue::Int(set.default_b())),
    )?;
    ctx.graph.add_port(
        host,
        Port::input(&attrs.blend.port, PortType::Float)
            .with_default(PortValue::Float(0.0))
            .with_range(0.0, 1.0),
    )?;
    ctx.graph.add_port(
        host,
        Port::input(&attrs.inverse.port, PortType::Float).with_default(PortValue::Float(1.0)),
    )?;
    ctx.graph.add_port(
        host,
        Port::input(&attrs.show_all.port, PortType::Bool).with_default(PortValue::Bool(false)),
    )?;
    let names = set.names().map(str::to_string).collect();
    ctx.graph.add_port(
        host,
        Port::input(&attrs.names.port, PortType::StringList)
            .with_default(PortValue::StringList(names)),
    )?;
    ctx.graph.set_locked(host, &attrs.names.port, true)?;

    let reverse_name = ctx.join(&ctx.graph.node_name(host)?, &format!("{prefix}Rev"));
    let reverse = ctx.helper(owner, NodeKind::Reverse, &reverse_name)?;
    ctx.connect(&attrs.blend, &PortRef::new(reverse, "input"))?;
    ctx.connect(&PortRef::new(reverse, "output"), &attrs.inverse)?;
    ctx.graph.set_locked(host, &attrs.inverse.port, true)?;

    tracing::debug!("Added blend ports '{}' over {} spaces", prefix, set.len());
    Ok(attrs)
}

/// Wiring produced by [`blend_slot`]
#[derive(Debug, Clone)]
pub struct BlendSlot {
    /// Choice picking the candidate for selector A
    pub choice_a: NodeId,
    /// Choice picking the candidate for selector B
    pub choice_b: NodeId,
    /// Constraint blending the two picks
    pub constraint: NodeId,
}

fn choice(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    name: &str,
    selector: &PortRef,
    inputs: &[(i32, PortRef)],
) -> RigResult<NodeId> {
    let node = ctx.helper(owner, NodeKind::Choice, name)?;
    ctx.connect(selector, &PortRef::new(node, "selector"))?;
    for (index, source) in inputs {
        let slot = usize::try_from(*index)
            .map_err(|_| RigError::invalid_arg("spaces", format!("negative index {index}")))?;
        let port = indexed("input", slot);
        ctx.graph.add_port(node, Port::input(&port, PortType::Mat4))?;
        ctx.connect(source, &PortRef::new(node, &port))?;
    }
    Ok(node)
}

/// Blend `driven` between the candidates picked by selectors A and B.
///
/// `candidates` gives one world-matrix source per space. With
/// `maintain_offset` each candidate carries its own frozen offset, so the
/// driven node keeps its placement under any selection.
pub fn blend_slot(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    attrs: &BlendAttrs,
    set: &SpaceSet,
    candidates: &[(String, PortRef)],
    driven: NodeId,
    channels: Channels,
    maintain_offset: bool,
    name: &str,
) -> RigResult<BlendSlot> {
    for (space, _) in candidates {
        set.require(space)?;
    }

    let driven_world = ctx.graph.get_matrix(driven, ports::WORLD_MATRIX)?;
    let mut inputs = Vec::with_capacity(set.len());
    for (space, index) in set.iter() {
        let (_, source) = candidates
            .iter()
            .find(|(candidate, _)| candidate == space)
            .ok_or_else(|| RigError::MissingCandidate(space.to_string()))?;
        let source = if maintain_offset {
            let candidate_world = ctx.graph.get_matrix(source.node, &source.port)?;
            let offset = candidate_world.inverse() * driven_world;
            let offset_name = ctx.join(name, &format!("{space}Ofs"));
            mult_matrix(
                ctx,
                owner,
                &offset_name,
                &[MatrixTerm::Constant(offset), MatrixTerm::Driven(source.clone())],
            )?
        } else {
            source.clone()
        };
        inputs.push((index, source));
    }

    let [a_name, b_name, cns_name] = ["choiceA", "choiceB", "cns"].map(|t| ctx.join(name, t));
    let choice_a = choice(ctx, owner, &a_name, &attrs.a, &inputs)?;
    let choice_b = choice(ctx, owner, &b_name, &attrs.b, &inputs)?;
    let targets = [
        Target {
            matrix: PortRef::new(choice_a, "output"),
            weight: TargetWeight::Driven(attrs.inverse.clone()),
        },
        Target {
            matrix: PortRef::new(choice_b, "output"),
            weight: TargetWeight::Driven(attrs.blend.clone()),
        },
    ];
    let constraint = constrain(
        ctx,
        owner,
        &cns_name,
        &targets,
        driven,
        channels,
        false,
    )?;
    Ok(BlendSlot {
        choice_a,
        choice_b,
        constraint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RigConfig;
    use crate::space::sort_spaces;
    use glam::Vec3;
    use rigkit_graph::{Graph, TransformRole};

    struct Fixture {
        graph: Graph,
        config: RigConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                graph: Graph::new("blend"),
                config: RigConfig::default(),
            }
        }
    }

    fn transform(ctx: &mut RigContext<'_>, name: &str, x: f32) -> NodeId {
        let node = ctx
            .graph
            .create_node(NodeKind::Transform(TransformRole::Locator), name, None)
            .unwrap();
        ctx.set(node, "translateX", PortValue::Float(x)).unwrap();
        node
    }

    fn position(ctx: &RigContext<'_>, node: NodeId) -> Vec3 {
        ctx.graph
            .get_matrix(node, ports::WORLD_MATRIX)
            .unwrap()
            .w_axis
            .truncate()
    }

    fn setup(ctx: &mut RigContext<'_>, maintain_offset: bool) -> (BlendAttrs, NodeId) {
        let owner = ctx
            .graph
            .create_node(NodeKind::Transform(TransformRole::Group), "owner", None)
            .unwrap();
        ctx.graph
            .add_port(owner, Port::input(ports::HELPERS, PortType::HandleList))
            .unwrap();
        let s0 = transform(ctx, "s0", 0.0);
        let s1 = transform(ctx, "s1", 10.0);
        let driven = transform(ctx, "driven", 0.0);

        let set = sort_spaces(&["world", "master"], None, None, &ctx.config.spaces).unwrap();
        let attrs = add_blend_attr(ctx, owner, owner, &set, "space").unwrap();
        ctx.set(owner, "spaceA", PortValue::Int(0)).unwrap();
        ctx.set(owner, "spaceB", PortValue::Int(1)).unwrap();
        let candidates = vec![
            ("world".to_string(), PortRef::new(s0, ports::WORLD_MATRIX)),
            ("master".to_string(), PortRef::new(s1, ports::WORLD_MATRIX)),
        ];
        blend_slot(
            ctx,
            owner,
            &attrs,
            &set,
            &candidates,
            driven,
            Channels::TRANSLATE,
            maintain_offset,
            "slot",
        )
        .unwrap();
        (attrs, driven)
    }

    #[test]
    fn test_blend_weights() {
        let mut fixture = Fixture::new();
        let mut ctx = RigContext::new(&mut fixture.graph, &fixture.config);
        let (attrs, driven) = setup(&mut ctx, false);

        for (w, x) in [(0.0, 0.0), (1.0, 10.0), (0.5, 5.0)] {
            ctx.set(attrs.host, &attrs.blend.port, PortValue::Float(w)).unwrap();
            let p = position(&ctx, driven);
            assert!((p - Vec3::new(x, 0.0, 0.0)).length() < 1e-4, "w={w}: {p:?}");
        }
    }

    #[test]
    fn test_complement_is_locked() {
        let mut fixture = Fixture::new();
        let mut ctx = RigContext::new(&mut fixture.graph, &fixture.config);
        let (attrs, _) = setup(&mut ctx, false);
        ctx.set(attrs.host, &attrs.blend.port, PortValue::Float(0.25)).unwrap();
        assert_eq!(ctx.graph.get_float(attrs.host, &attrs.inverse.port).unwrap(), 0.75);
        assert!(ctx.graph.is_locked(attrs.host, &attrs.inverse.port).unwrap());
        let outcome = ctx
            .set(attrs.host, &attrs.inverse.port, PortValue::Float(0.0))
            .unwrap();
        assert!(!outcome.is_written());
    }

    #[test]
    fn test_identical_selection_ignores_weight() {
        let mut fixture = Fixture::new();
        let mut ctx = RigContext::new(&mut fixture.graph, &fixture.config);
        let (attrs, driven) = setup(&mut ctx, false);
        ctx.set(attrs.host, &attrs.a.port, PortValue::Int(1)).unwrap();
        for w in [0.0, 0.3, 1.0] {
            ctx.set(attrs.host, &attrs.blend.port, PortValue::Float(w)).unwrap();
            let p = position(&ctx, driven);
            assert!((p - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
        }
    }

    #[test]
    fn test_maintain_offset_keeps_placement_in_every_space() {
        let mut fixture = Fixture::new();
        let mut ctx = RigContext::new(&mut fixture.graph, &fixture.config);
        let (attrs, driven) = setup(&mut ctx, true);
        for w in [0.0, 0.5, 1.0] {
            ctx.set(attrs.host, &attrs.blend.port, PortValue::Float(w)).unwrap();
            assert!(position(&ctx, driven).length() < 1e-4);
        }
    }

    #[test]
    fn test_missing_candidate_fails() {
        let mut fixture = Fixture::new();
        let mut ctx = RigContext::new(&mut fixture.graph, &fixture.config);
        let owner = ctx
            .graph
            .create_node(NodeKind::Transform(TransformRole::Group), "owner", None)
            .unwrap();
        ctx.graph
            .add_port(owner, Port::input(ports::HELPERS, PortType::HandleList))
            .unwrap();
        let s0 = transform(&mut ctx, "s0", 0.0);
        let driven = transform(&mut ctx, "driven", 0.0);
        let set = sort_spaces(&["world", "prop"], None, None, &ctx.config.spaces).unwrap();
        let attrs = add_blend_attr(&mut ctx, owner, owner, &set, "space").unwrap();
        let candidates = vec![("world".to_string(), PortRef::new(s0, ports::WORLD_MATRIX))];
        let err = blend_slot(
            &mut ctx,
            owner,
            &attrs,
            &set,
            &candidates,
            driven,
            Channels::ALL,
            false,
            "slot",
        )
        .unwrap_err();
        assert!(matches!(err, RigError::MissingCandidate(space) if space == "prop"));
    }

    #[test]
    fn test_attrs_read_back_from_host() {
        let mut fixture = Fixture::new();
        let mut ctx = RigContext::new(&mut fixture.graph, &fixture.config);
        let (attrs, _) = setup(&mut ctx, false);
        let read = BlendAttrs::from_host(&*ctx.graph, attrs.host, "space").unwrap();
        assert_eq!(read.blend, attrs.blend);
        assert_eq!(
            read.space_names(&*ctx.graph).unwrap(),
            vec!["world".to_string(), "master".to_string()]
        );
        assert!(BlendAttrs::from_host(&*ctx.graph, attrs.host, "parent").is_err());
    }
}
