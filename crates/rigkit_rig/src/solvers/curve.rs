// SPDX-License-Identifier: MIT OR Apache-2.0
//! Weight curves for distributing twist along a segment.
//!
//! A curve maps a normalized position `t` in `[0, 1]` to a weight. It is
//! evaluated once per joint at build time and the results are baked into
//! the graph as constants.

use serde::{Deserialize, Serialize};

/// Interpolation mode between curve keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Constant (step)
    Constant,
    /// Linear interpolation
    #[default]
    Linear,
    /// Cubic bezier using the keys' slopes
    Bezier,
    /// Auto-smooth (Catmull-Rom slopes)
    Auto,
}

impl InterpolationMode {
    /// Parse a mode name as used in rig descriptions
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "constant" | "step" => Some(Self::Constant),
            "linear" => Some(Self::Linear),
            "bezier" => Some(Self::Bezier),
            "auto" | "smooth" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// A key on a weight curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Normalized position along the segment
    pub position: f32,
    /// Weight at this key
    pub value: f32,
    /// Interpolation mode to the next key
    pub interpolation: InterpolationMode,
    /// Incoming slope for bezier segments
    pub in_slope: Option<f32>,
    /// Outgoing slope for bezier segments
    pub out_slope: Option<f32>,
}

impl CurveKey {
    /// Create a new key
    pub fn new(position: f32, value: f32) -> Self {
        Self {
            position,
            value,
            interpolation: InterpolationMode::Linear,
            in_slope: None,
            out_slope: None,
        }
    }

    /// Set interpolation mode
    pub fn with_interpolation(mut self, mode: InterpolationMode) -> Self {
        self.interpolation = mode;
        self
    }

    /// Set slopes for bezier interpolation
    pub fn with_slopes(mut self, in_slope: f32, out_slope: f32) -> Self {
        self.in_slope = Some(in_slope);
        self.out_slope = Some(out_slope);
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Cubic bezier interpolation
    pub fn bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        p0 * mt3 + 3.0 * p1 * mt2 * t + 3.0 * p2 * mt * t2 + p3 * t3
    }

    /// Hermite spline interpolation (for auto-smooth)
    pub fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }
}

/// Piecewise weight curve over `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightCurve {
    keys: Vec<CurveKey>,
}

impl WeightCurve {
    /// Curve through `keys`, sorted by position
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { keys }
    }

    /// Straight ramp from 0 at the base to 1 at the tip
    pub fn linear_ramp() -> Self {
        Self::new(vec![CurveKey::new(0.0, 0.0), CurveKey::new(1.0, 1.0)])
    }

    /// Curve from `(position, value)` pairs, all using `mode`
    pub fn from_pairs(pairs: &[[f32; 2]], mode: InterpolationMode) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|[position, value]| CurveKey::new(*position, *value).with_interpolation(mode))
                .collect(),
        )
    }

    /// Keys in position order
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Slope used by auto-smooth at key `i`
    fn auto_slope(&self, i: usize) -> f32 {
        let prev = i.checked_sub(1).and_then(|p| self.keys.get(p));
        let next = self.keys.get(i + 1);
        match (prev, next) {
            (Some(a), Some(b)) if (b.position - a.position).abs() > f32::EPSILON => {
                (b.value - a.value) / (b.position - a.position)
            }
            _ => 0.0,
        }
    }

    /// Weight at position `t`; clamps outside the keyed range
    pub fn evaluate(&self, t: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if t <= first.position {
            return first.value;
        }
        if t >= last.position {
            return last.value;
        }

        let i = self
            .keys
            .windows(2)
            .position(|w| t >= w[0].position && t < w[1].position)
            .unwrap_or(0);
        let (k0, k1) = (&self.keys[i], &self.keys[i + 1]);
        let span = k1.position - k0.position;
        if span <= f32::EPSILON {
            return k1.value;
        }
        let local = (t - k0.position) / span;

        match k0.interpolation {
            InterpolationMode::Constant => k0.value,
            InterpolationMode::Linear => Interpolation::lerp(k0.value, k1.value, local),
            InterpolationMode::Bezier => {
                let out_slope = k0.out_slope.unwrap_or(0.0);
                let in_slope = k1.in_slope.unwrap_or(0.0);
                let p1 = k0.value + out_slope * span / 3.0;
                let p2 = k1.value - in_slope * span / 3.0;
                Interpolation::bezier(k0.value, p1, p2, k1.value, local)
            }
            InterpolationMode::Auto => Interpolation::hermite(
                k0.value,
                self.auto_slope(i) * span,
                k1.value,
                self.auto_slope(i + 1) * span,
                local,
            ),
        }
    }

    /// Weights for `count` joints spread strictly inside the segment, at
    /// `t_i = (i + 1) / (count + 1)`
    pub fn sample(&self, count: usize) -> Vec<f32> {
        (0..count)
            .map(|i| self.evaluate((i + 1) as f32 / (count + 1) as f32))
            .collect()
    }
}

impl Default for WeightCurve {
    fn default() -> Self {
        Self::linear_ramp()
    }
}
