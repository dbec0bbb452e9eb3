// SPDX-License-Identifier: MIT OR Apache-2.0
//! Numeric solvers layered on the matrix protocol.
//!
//! Each solver comes in two forms: a pure function used for reasoning and
//! tests, and a graph builder that wires the same arithmetic out of host
//! primitives. Rest values are frozen into the graph as constants when the
//! solver is built, never sampled at evaluation time.

pub mod curve;
pub mod soft_ik;
pub mod stretch;
pub mod twist;

use crate::error::{RigError, RigResult};
use crate::lifecycle::RigContext;
use rigkit_graph::{indexed, NodeId, NodeKind, Port, PortRef, PortType, PortValue};

pub use curve::{CurveKey, InterpolationMode, WeightCurve};
pub use soft_ik::{build_soft, build_soft_limit, soft_limit, soft_ratio};
pub use stretch::{add_stretch_attrs, build_stretch, drive_segments, stretch_ratio, StretchSettings};
pub use twist::{build_twist, distribute, twist_angle, TwistRig};

/// Rotation or translation axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Axis {
    /// X axis
    #[default]
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl Axis {
    /// Port suffix ("X", "Y", "Z")
    pub fn suffix(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }

    /// Parse "x" / "y" / "z"
    pub fn from_name(name: &str) -> RigResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "z" => Ok(Self::Z),
            _ => Err(RigError::invalid_arg("axis", format!("unknown axis '{name}'"))),
        }
    }

    /// Component of a vector along this axis
    pub fn component(self, v: glam::Vec3) -> f32 {
        match self {
            Self::X => v.x,
            Self::Y => v.y,
            Self::Z => v.z,
        }
    }
}

/// Scalar input of an arithmetic helper
#[derive(Debug, Clone)]
pub(crate) enum Scalar {
    Driven(PortRef),
    Constant(f32),
}

impl From<&PortRef> for Scalar {
    fn from(port: &PortRef) -> Self {
        Self::Driven(port.clone())
    }
}

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Self::Constant(value)
    }
}

fn feed(ctx: &mut RigContext<'_>, node: NodeId, port: &str, value: &Scalar) -> RigResult<()> {
    match value {
        Scalar::Driven(src) => {
            ctx.connect(src, &PortRef::new(node, port))?;
        }
        Scalar::Constant(v) => {
            ctx.set(node, port, PortValue::Float(*v))?;
        }
    }
    Ok(())
}

/// Create an owned arithmetic node with the given scalar inputs, returning
/// its output port
pub(crate) fn scalar_node(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    kind: NodeKind,
    name: &str,
    inputs: &[(&str, Scalar)],
) -> RigResult<PortRef> {
    let node = ctx.helper(owner, kind, name)?;
    for (port, value) in inputs {
        feed(ctx, node, port, value)?;
    }
    let output = match kind {
        NodeKind::Distance => "distance",
        NodeKind::Condition => "outColor",
        NodeKind::PlusMinusAverage => "output1D",
        _ => "output",
    };
    Ok(PortRef::new(node, output))
}

/// MultiplyDivide operations
pub(crate) const MULTIPLY: i32 = 1;
pub(crate) const DIVIDE: i32 = 2;

/// PlusMinusAverage operations
pub(crate) const SUM: i32 = 1;
pub(crate) const SUBTRACT: i32 = 2;

/// Create an owned MultiplyDivide node
pub(crate) fn multiply_divide(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    name: &str,
    operation: i32,
    a: Scalar,
    b: Scalar,
) -> RigResult<PortRef> {
    let out = scalar_node(
        ctx,
        owner,
        NodeKind::MultiplyDivide,
        name,
        &[("input1", a), ("input2", b)],
    )?;
    ctx.set(out.node, "operation", PortValue::Int(operation))?;
    Ok(out)
}

/// Create an owned PlusMinusAverage node over `terms`
pub(crate) fn plus_minus(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    name: &str,
    operation: i32,
    terms: &[Scalar],
) -> RigResult<PortRef> {
    let node = ctx.helper(owner, NodeKind::PlusMinusAverage, name)?;
    ctx.set(node, "operation", PortValue::Int(operation))?;
    for (i, term) in terms.iter().enumerate() {
        let port = indexed("input1D", i);
        ctx.graph.add_port(node, Port::input(&port, PortType::Float))?;
        feed(ctx, node, &port, term)?;
    }
    Ok(PortRef::new(node, "output1D"))
}

/// Create an owned Clamp node
pub(crate) fn clamp(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    name: &str,
    input: Scalar,
    min: Scalar,
    max: Scalar,
) -> RigResult<PortRef> {
    scalar_node(
        ctx,
        owner,
        NodeKind::Clamp,
        name,
        &[("input", input), ("min", min), ("max", max)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_names() {
        assert_eq!(Axis::from_name("Y").unwrap(), Axis::Y);
        assert!(Axis::from_name("w").is_err());
        assert_eq!(Axis::Z.suffix(), "Z");
        assert_eq!(Axis::Y.component(glam::Vec3::new(1.0, 2.0, 3.0)), 2.0);
    }
}
