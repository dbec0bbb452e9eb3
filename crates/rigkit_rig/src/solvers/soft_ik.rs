// SPDX-License-Identifier: MIT OR Apache-2.0
//! Soft easing of a length ratio near full extension.
//!
//! Below the soft start `s` the ratio passes through. Above it the output
//! follows `r - d^2 / (4 (1 - s))` with `d = r - s`, reaching 1.0 with zero
//! slope at `d = 2 (1 - s)` and staying there. Value and slope are
//! continuous at `r = s`.

use super::{clamp, multiply_divide, plus_minus, Scalar, DIVIDE, MULTIPLY, SUBTRACT, SUM};
use crate::error::{RigError, RigResult};
use crate::lifecycle::RigContext;
use rigkit_graph::math::EPSILON;
use rigkit_graph::{NodeId, PortRef};

/// Upper clamp used where the graph needs `max(x, 0)`
const UNBOUNDED: f32 = 1.0e6;

/// Soft-eased ratio
pub fn soft_ratio(ratio: f32, soft_start: f32) -> f32 {
    if soft_start >= 1.0 {
        return ratio;
    }
    let width = 2.0 * (1.0 - soft_start);
    let d = ratio - soft_start;
    let past = d.max(0.0);
    let eased = d.clamp(0.0, width);
    ratio - past + eased - eased * eased / (2.0 * width)
}

/// Soft easing toward an arbitrary `limit` instead of 1.0
pub fn soft_limit(ratio: f32, soft_start: f32, limit: f32) -> f32 {
    if limit <= EPSILON {
        return ratio;
    }
    limit * soft_ratio(ratio / limit, soft_start)
}

fn check_soft_start(soft_start: f32) -> RigResult<()> {
    if soft_start <= 0.0 || soft_start.is_nan() {
        return Err(RigError::invalid_arg(
            "soft_start",
            format!("must be in (0, 1], got {soft_start}"),
        ));
    }
    Ok(())
}

/// Wire [`soft_ratio`] over a live ratio. A soft start of 1 or more
/// disables easing and returns `ratio` unchanged.
pub fn build_soft(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    base: &str,
    ratio: &PortRef,
    soft_start: f32,
) -> RigResult<PortRef> {
    check_soft_start(soft_start)?;
    if soft_start >= 1.0 {
        return Ok(ratio.clone());
    }
    let width = 2.0 * (1.0 - soft_start);
    let [d_name, past_name, eased_name, sq_name, quad_name, head_name, out_name] =
        ["delta", "past", "eased", "sq", "quad", "head", "soft"].map(|t| ctx.join(base, t));

    let d = plus_minus(
        ctx,
        owner,
        &d_name,
        SUBTRACT,
        &[ratio.into(), Scalar::Constant(soft_start)],
    )?;
    let past = clamp(
        ctx,
        owner,
        &past_name,
        (&d).into(),
        Scalar::Constant(0.0),
        Scalar::Constant(UNBOUNDED),
    )?;
    let eased = clamp(
        ctx,
        owner,
        &eased_name,
        (&d).into(),
        Scalar::Constant(0.0),
        Scalar::Constant(width),
    )?;
    let sq = multiply_divide(ctx, owner, &sq_name, MULTIPLY, (&eased).into(), (&eased).into())?;
    let quad = multiply_divide(
        ctx,
        owner,
        &quad_name,
        DIVIDE,
        (&sq).into(),
        Scalar::Constant(2.0 * width),
    )?;
    let head = plus_minus(ctx, owner, &head_name, SUM, &[ratio.into(), (&eased).into()])?;
    plus_minus(
        ctx,
        owner,
        &out_name,
        SUBTRACT,
        &[(&head).into(), (&past).into(), (&quad).into()],
    )
}

/// Wire [`soft_limit`] with a live limit port
pub fn build_soft_limit(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    base: &str,
    ratio: &PortRef,
    soft_start: f32,
    limit: &PortRef,
) -> RigResult<PortRef> {
    check_soft_start(soft_start)?;
    if soft_start >= 1.0 {
        return Ok(ratio.clone());
    }
    let norm_name = ctx.join(base, "norm");
    let scaled_name = ctx.join(base, "scaled");
    let normalized = multiply_divide(ctx, owner, &norm_name, DIVIDE, ratio.into(), limit.into())?;
    let soft = build_soft(ctx, owner, base, &normalized, soft_start)?;
    multiply_divide(ctx, owner, &scaled_name, MULTIPLY, (&soft).into(), limit.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_below_soft_start() {
        assert_eq!(soft_ratio(0.5, 0.8), 0.5);
        assert_eq!(soft_ratio(0.8, 0.8), 0.8);
    }

    #[test]
    fn test_saturates_at_one() {
        let s = 0.8;
        assert!((soft_ratio(2.0 - s, s) - 1.0).abs() < 1e-6);
        assert!((soft_ratio(3.0, s) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_slope_is_continuous_at_soft_start() {
        let s = 0.7;
        let h = 1e-3;
        let below = (soft_ratio(s, s) - soft_ratio(s - h, s)) / h;
        let above = (soft_ratio(s + h, s) - soft_ratio(s, s)) / h;
        assert!((below - 1.0).abs() < 1e-2);
        assert!((above - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_monotonic() {
        let s = 0.6;
        let mut last = f32::MIN;
        for i in 0..200 {
            let r = i as f32 * 0.01;
            let v = soft_ratio(r, s);
            assert!(v >= last - 1e-6);
            last = v;
        }
    }

    #[test]
    fn test_soft_limit_passes_rest_through() {
        // Rest ratio 1 lies below s * limit, so it is untouched
        assert_eq!(soft_limit(1.0, 0.8, 1.5), 1.0);
        assert!((soft_limit(10.0, 0.8, 1.5) - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_disabled_when_soft_start_is_one() {
        assert_eq!(soft_ratio(1.7, 1.0), 1.7);
    }
}
