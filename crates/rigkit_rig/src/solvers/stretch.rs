// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stretch solver.
//!
//! `ratio = 1 + (clamp(current / rest, min, max) - 1) * amount`, with
//! `min <= 1 <= max`, so the ratio is exactly 1 whenever the current
//! distance equals the frozen rest distance.

use super::{clamp, multiply_divide, scalar_node, Axis, Scalar, DIVIDE, MULTIPLY};
use crate::error::{RigError, RigResult};
use crate::lifecycle::RigContext;
use rigkit_graph::math::EPSILON;
use rigkit_graph::{NodeId, NodeKind, Port, PortRef, PortType, PortValue};
use serde::{Deserialize, Serialize};

/// Host port holding the stretch amount
pub const STRETCH: &str = "stretch";
/// Host port holding the lower ratio limit
pub const STRETCH_MIN: &str = "stretchMin";
/// Host port holding the upper ratio limit
pub const STRETCH_MAX: &str = "stretchMax";

/// Upper bound accepted for `max`
const MAX_STRETCH_LIMIT: f32 = 10.0;

/// Stretch amount and ratio limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretchSettings {
    /// 0 = rigid, 1 = fully stretchy
    pub amount: f32,
    /// Lower ratio limit, at most 1
    pub min: f32,
    /// Upper ratio limit, at least 1
    pub max: f32,
}

impl StretchSettings {
    /// Settings normalized so `0 <= amount <= 1` and `min <= 1 <= max`
    pub fn new(amount: f32, min: f32, max: f32) -> Self {
        Self {
            amount: amount.clamp(0.0, 1.0),
            min: min.clamp(0.0, 1.0),
            max: max.clamp(1.0, MAX_STRETCH_LIMIT),
        }
    }
}

impl Default for StretchSettings {
    fn default() -> Self {
        Self::new(1.0, 1.0, 2.0)
    }
}

/// Stretch ratio for a current and rest distance
pub fn stretch_ratio(current: f32, rest: f32, settings: &StretchSettings) -> f32 {
    if rest <= EPSILON {
        return 1.0;
    }
    let s = StretchSettings::new(settings.amount, settings.min, settings.max);
    let raw = (current / rest).clamp(s.min, s.max);
    1.0 + (raw - 1.0) * s.amount
}

/// Add the animator-facing stretch ports to `host`. Their ranges keep
/// `min <= 1 <= max` on every write.
pub fn add_stretch_attrs(
    ctx: &mut RigContext<'_>,
    host: NodeId,
    settings: &StretchSettings,
) -> RigResult<()> {
    let s = StretchSettings::new(settings.amount, settings.min, settings.max);
    let ports = [
        (STRETCH, s.amount, 0.0, 1.0),
        (STRETCH_MIN, s.min, 0.0, 1.0),
        (STRETCH_MAX, s.max, 1.0, MAX_STRETCH_LIMIT),
    ];
    for (name, value, lo, hi) in ports {
        ctx.graph.add_port(
            host,
            Port::input(name, PortType::Float)
                .with_default(PortValue::Float(value))
                .with_range(lo, hi),
        )?;
    }
    Ok(())
}

/// Wiring produced by [`build_stretch`]
#[derive(Debug, Clone)]
pub struct StretchRig {
    /// Frozen rest distance
    pub rest_length: f32,
    /// Live `current / rest`, before limits
    pub raw_ratio: PortRef,
    /// Final ratio
    pub ratio: PortRef,
}

/// Wire the stretch ratio between two world matrices.
///
/// `host` must carry the ports from [`add_stretch_attrs`]. When `shaped` is
/// given it replaces the raw ratio before limits are applied (soft easing
/// hooks in here).
pub fn build_stretch(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    base: &str,
    start: &PortRef,
    end: &PortRef,
    host: NodeId,
    shaped: Option<&dyn Fn(&mut RigContext<'_>, &PortRef) -> RigResult<PortRef>>,
) -> RigResult<StretchRig> {
    let a = ctx.graph.get_matrix(start.node, &start.port)?.w_axis.truncate();
    let b = ctx.graph.get_matrix(end.node, &end.port)?.w_axis.truncate();
    let rest_length = (a - b).length();
    if rest_length <= EPSILON {
        return Err(RigError::invalid_arg(
            "start",
            "stretch start and end coincide; rest length is zero",
        ));
    }

    let [dist_name, raw_name, limit_name, ratio_name] =
        ["dist", "raw", "limit", "ratio"].map(|token| ctx.join(base, token));

    let distance = scalar_node(ctx, owner, NodeKind::Distance, &dist_name, &[])?;
    ctx.connect(start, &PortRef::new(distance.node, "inMatrix1"))?;
    ctx.connect(end, &PortRef::new(distance.node, "inMatrix2"))?;

    let raw_ratio = multiply_divide(
        ctx,
        owner,
        &raw_name,
        DIVIDE,
        (&distance).into(),
        rest_length.into(),
    )?;
    let shaped_ratio = match shaped {
        Some(shape) => shape(ctx, &raw_ratio)?,
        None => raw_ratio.clone(),
    };
    let limited = clamp(
        ctx,
        owner,
        &limit_name,
        (&shaped_ratio).into(),
        (&PortRef::new(host, STRETCH_MIN)).into(),
        (&PortRef::new(host, STRETCH_MAX)).into(),
    )?;
    let ratio = scalar_node(
        ctx,
        owner,
        NodeKind::BlendScalar,
        &ratio_name,
        &[
            ("input0", Scalar::Constant(1.0)),
            ("input1", (&limited).into()),
            ("blender", (&PortRef::new(host, STRETCH)).into()),
        ],
    )?;
    tracing::debug!("Stretch '{}' frozen at rest length {}", base, rest_length);
    Ok(StretchRig {
        rest_length,
        raw_ratio,
        ratio,
    })
}

/// Drive each joint's translation along `axis` with `rest * ratio`
pub fn drive_segments(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    base: &str,
    ratio: &PortRef,
    segments: &[(NodeId, f32)],
    axis: Axis,
) -> RigResult<Vec<NodeId>> {
    let mut nodes = Vec::with_capacity(segments.len());
    for (i, (joint, rest)) in segments.iter().enumerate() {
        let name = ctx.join(base, &format!("seg{i:02}"));
        let scaled = multiply_divide(
            ctx,
            owner,
            &name,
            MULTIPLY,
            ratio.into(),
            (*rest).into(),
        )?;
        let channel = format!("translate{}", axis.suffix());
        ctx.connect(&scaled, &PortRef::new(*joint, &channel))?;
        nodes.push(scaled.node);
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_is_one_at_rest() {
        for (min, max) in [(0.0, 1.0), (0.5, 2.0), (1.0, 1.0), (0.9, 10.0)] {
            for amount in [0.0, 0.3, 1.0] {
                let settings = StretchSettings::new(amount, min, max);
                assert_eq!(stretch_ratio(7.25, 7.25, &settings), 1.0);
            }
        }
    }

    #[test]
    fn test_ratio_limits() {
        let settings = StretchSettings::new(1.0, 0.8, 1.5);
        assert_eq!(stretch_ratio(20.0, 10.0, &settings), 1.5);
        assert_eq!(stretch_ratio(5.0, 10.0, &settings), 0.8);
        assert!((stretch_ratio(12.0, 10.0, &settings) - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_amount_blends_toward_rigid() {
        let settings = StretchSettings::new(0.5, 1.0, 2.0);
        assert!((stretch_ratio(15.0, 10.0, &settings) - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_settings_are_normalized() {
        let s = StretchSettings::new(3.0, 1.5, 0.5);
        assert_eq!(s.amount, 1.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 1.0);
    }
}
