// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-space visibility derived from the blend selectors.

use super::{BlendAttrs, SpaceSet};
use crate::error::RigResult;
use crate::lifecycle::RigContext;
use crate::solvers::{multiply_divide, plus_minus, scalar_node, Scalar, MULTIPLY, SUM};
use rigkit_graph::{NodeId, NodeKind, Port, PortRef, PortType, PortValue};

// Condition operations
const EQUAL: i32 = 0;
const NOT_EQUAL: i32 = 1;
const GREATER: i32 = 2;
const GREATER_OR_EQUAL: i32 = 3;
const LESS_OR_EQUAL: i32 = 5;

/// Whether the space at `index` is visible.
///
/// A space is visible when it is the only selection that carries weight:
/// selected in A with the blend at 0, in B with the blend at 1, or in both.
/// With `show_all` it is visible whenever either selector picks it.
pub fn space_visible(a: i32, b: i32, blend: f32, show_all: bool, index: i32) -> bool {
    let (is_a, is_b) = (a == index, b == index);
    if show_all {
        return is_a || is_b;
    }
    (is_a && is_b) || (is_a && blend <= 0.0) || (is_b && blend >= 1.0)
}

/// Host port carrying a space's visibility
pub fn visible_port(space: &str) -> String {
    format!("{space}Visible")
}

fn condition(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    name: &str,
    operation: i32,
    terms: [Scalar; 4],
) -> RigResult<PortRef> {
    let [first, second, if_true, if_false] = terms;
    let out = scalar_node(
        ctx,
        owner,
        NodeKind::Condition,
        name,
        &[
            ("firstTerm", first),
            ("secondTerm", second),
            ("colorIfTrue", if_true),
            ("colorIfFalse", if_false),
        ],
    )?;
    ctx.set(out.node, "operation", PortValue::Int(operation))?;
    Ok(out)
}

/// Add a `{space}Visible` port to the blend host for every space in `set`
pub fn add_visibility_switch(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    attrs: &BlendAttrs,
    set: &SpaceSet,
) -> RigResult<Vec<(String, PortRef)>> {
    let host_name = ctx.graph.node_name(attrs.host)?;
    let mut signals = Vec::with_capacity(set.len());
    for (space, index) in set.iter() {
        let base = ctx.join(&host_name, space);
        let names = ["isA", "isB", "satA", "satB", "both", "sole", "any", "pick", "vis"]
            .map(|t| ctx.join(&base, t));
        let [
            a_name,
            b_name,
            sat_a_name,
            sat_b_name,
            both_name,
            sole_name,
            any_name,
            pick_name,
            vis_name,
        ] = names;
        let index = index as f32;
        let one = || Scalar::Constant(1.0);
        let zero = || Scalar::Constant(0.0);

        let is_a = condition(
            ctx,
            owner,
            &a_name,
            EQUAL,
            [(&attrs.a).into(), Scalar::Constant(index), one(), zero()],
        )?;
        let is_b = condition(
            ctx,
            owner,
            &b_name,
            EQUAL,
            [(&attrs.b).into(), Scalar::Constant(index), one(), zero()],
        )?;
        let sat_a = condition(
            ctx,
            owner,
            &sat_a_name,
            LESS_OR_EQUAL,
            [(&attrs.blend).into(), zero(), (&is_a).into(), zero()],
        )?;
        let sat_b = condition(
            ctx,
            owner,
            &sat_b_name,
            GREATER_OR_EQUAL,
            [(&attrs.blend).into(), one(), (&is_b).into(), zero()],
        )?;
        let both = multiply_divide(
            ctx,
            owner,
            &both_name,
            MULTIPLY,
            (&is_a).into(),
            (&is_b).into(),
        )?;
        let sole = plus_minus(
            ctx,
            owner,
            &sole_name,
            SUM,
            &[(&sat_a).into(), (&sat_b).into(), (&both).into()],
        )?;
        let any = plus_minus(ctx, owner, &any_name, SUM, &[(&is_a).into(), (&is_b).into()])?;
        let pick = condition(
            ctx,
            owner,
            &pick_name,
            NOT_EQUAL,
            [(&attrs.show_all).into(), zero(), (&any).into(), (&sole).into()],
        )?;
        let visible = condition(
            ctx,
            owner,
            &vis_name,
            GREATER,
            [(&pick).into(), zero(), one(), zero()],
        )?;

        let port = visible_port(space);
        ctx.graph.add_port(attrs.host, Port::input(&port, PortType::Bool))?;
        let signal = PortRef::new(attrs.host, &port);
        ctx.connect(&visible, &signal)?;
        ctx.graph.set_locked(attrs.host, &port, true)?;
        signals.push((space.to_string(), signal));
    }
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RigConfig;
    use crate::space::{add_blend_attr, sort_spaces};
    use crate::transform::ports;
    use rigkit_graph::{Graph, TransformRole};

    #[test]
    fn test_sole_selection_rules() {
        // A=0, B=1
        assert!(space_visible(0, 1, 0.0, false, 0));
        assert!(!space_visible(0, 1, 0.0, false, 1));
        assert!(!space_visible(0, 1, 0.5, false, 0));
        assert!(!space_visible(0, 1, 0.5, false, 1));
        assert!(space_visible(0, 1, 1.0, false, 1));
        assert!(!space_visible(0, 1, 1.0, false, 0));
        // Same space in both slots
        assert!(space_visible(1, 1, 0.5, false, 1));
        // Unselected spaces stay hidden
        assert!(!space_visible(0, 1, 0.0, false, 2));
    }

    #[test]
    fn test_show_all_ignores_weight() {
        assert!(space_visible(0, 1, 0.5, true, 0));
        assert!(space_visible(0, 1, 0.5, true, 1));
        assert!(!space_visible(0, 1, 0.5, true, 2));
    }

    #[test]
    fn test_graph_matches_rules() {
        let mut graph = Graph::new("visibility");
        let config = RigConfig::default();
        let mut ctx = RigContext::new(&mut graph, &config);
        let host = ctx
            .graph
            .create_node(NodeKind::Transform(TransformRole::Control), "host", None)
            .unwrap();
        ctx.graph
            .add_port(host, Port::input(ports::HELPERS, PortType::HandleList))
            .unwrap();
        let set = sort_spaces(&["world", "master", "prop"], None, None, &config.spaces).unwrap();
        let attrs = add_blend_attr(&mut ctx, host, host, &set, "space").unwrap();
        let signals = add_visibility_switch(&mut ctx, host, &attrs, &set).unwrap();
        assert_eq!(signals.len(), 3);

        for (a, b) in [(0, 1), (1, 1), (100, 0)] {
            for blend in [0.0, 0.5, 1.0] {
                for show_all in [false, true] {
                    ctx.set(host, "spaceA", PortValue::Int(a)).unwrap();
                    ctx.set(host, "spaceB", PortValue::Int(b)).unwrap();
                    ctx.set(host, "spaceBlend", PortValue::Float(blend)).unwrap();
                    ctx.set(host, "spaceShowAll", PortValue::Bool(show_all)).unwrap();
                    for (space, signal) in &signals {
                        let index = set.index_of(space).unwrap();
                        let expected = space_visible(a, b, blend, show_all, index);
                        let actual = ctx.graph.get(host, &signal.port).unwrap().as_bool();
                        assert_eq!(
                            actual,
                            Some(expected),
                            "{space}: a={a} b={b} w={blend} all={show_all}"
                        );
                    }
                }
            }
        }
    }
}
