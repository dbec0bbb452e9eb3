// SPDX-License-Identifier: MIT OR Apache-2.0
//! Twist extraction and distribution.
//!
//! The tip's rotation relative to the base is measured against the rest
//! relation frozen at build time, converted to a quaternion, and reduced to
//! its swing-free component about one axis. Each interior joint receives a
//! baked fraction of that angle.

use super::{multiply_divide, Axis, Scalar, MULTIPLY};
use crate::error::{RigError, RigResult};
use crate::lifecycle::RigContext;
use crate::transform::{mult_matrix, ports, MatrixTerm};
use glam::{Mat4, Quat, Vec3};
use rigkit_graph::math::{self, EPSILON};
use rigkit_graph::{NodeId, NodeKind, PortRef};

/// Twist-only part of a rotation about `axis`
fn twist_quat(rotation: Quat, axis: Axis) -> Quat {
    let v = Vec3::new(rotation.x, rotation.y, rotation.z);
    let component = axis.component(v);
    let isolated = match axis {
        Axis::X => Quat::from_xyzw(component, 0.0, 0.0, rotation.w),
        Axis::Y => Quat::from_xyzw(0.0, component, 0.0, rotation.w),
        Axis::Z => Quat::from_xyzw(0.0, 0.0, component, rotation.w),
    };
    if isolated.length_squared() < EPSILON {
        Quat::IDENTITY
    } else {
        isolated.normalize()
    }
}

/// Twist angle in degrees about `axis` carried by a relative matrix
pub fn twist_angle(relative: Mat4, axis: Axis) -> f32 {
    let (_, rotation, _) = relative.to_scale_rotation_translation();
    let euler = math::euler_deg_from_quat(twist_quat(rotation, axis));
    axis.component(euler)
}

/// Per-joint share of `angle`
pub fn distribute(angle: f32, weights: &[f32]) -> Vec<f32> {
    weights.iter().map(|w| angle * w).collect()
}

/// Wiring produced by [`build_twist`]
#[derive(Debug, Clone)]
pub struct TwistRig {
    /// Tip rotation relative to its frozen rest relation with the base
    pub relative: PortRef,
    /// Extracted twist angle in degrees
    pub angle: PortRef,
    /// Weight nodes, one per joint
    pub drivers: Vec<NodeId>,
}

/// Wire twist from `tip` (measured against `base_node`) into the rotation
/// channel of each joint, scaled by its weight.
pub fn build_twist(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    base: &str,
    base_node: NodeId,
    tip: NodeId,
    joints: &[NodeId],
    axis: Axis,
    weights: &[f32],
) -> RigResult<TwistRig> {
    if joints.len() != weights.len() {
        return Err(RigError::invalid_arg(
            "weights",
            format!("{} weights for {} joints", weights.len(), joints.len()),
        ));
    }

    let base_world = ctx.graph.get_matrix(base_node, ports::WORLD_MATRIX)?;
    let tip_world = ctx.graph.get_matrix(tip, ports::WORLD_MATRIX)?;
    let rest = (base_world.inverse() * tip_world).inverse();

    let rel_name = ctx.join(base, "rel");
    let decompose_name = ctx.join(base, "dcm");
    let euler_name = ctx.join(base, "twist");
    let relative = mult_matrix(
        ctx,
        owner,
        &rel_name,
        &[
            MatrixTerm::Constant(rest),
            MatrixTerm::Driven(PortRef::new(tip, ports::WORLD_MATRIX)),
            MatrixTerm::Driven(PortRef::new(base_node, ports::WORLD_INVERSE_MATRIX)),
        ],
    )?;

    let decompose = ctx.helper(owner, NodeKind::DecomposeMatrix, &decompose_name)?;
    ctx.connect(&relative, &PortRef::new(decompose, "inputMatrix"))?;

    let euler = ctx.helper(owner, NodeKind::QuatToEuler, &euler_name)?;
    let component = format!("Quat{}", axis.suffix());
    ctx.connect(
        &PortRef::new(decompose, format!("output{component}")),
        &PortRef::new(euler, format!("input{component}")),
    )?;
    ctx.connect(
        &PortRef::new(decompose, "outputQuatW"),
        &PortRef::new(euler, "inputQuatW"),
    )?;
    let angle = PortRef::new(euler, format!("outputRotate{}", axis.suffix()));

    let channel = format!("rotate{}", axis.suffix());
    let mut drivers = Vec::with_capacity(joints.len());
    for (i, (joint, weight)) in joints.iter().zip(weights).enumerate() {
        let name = ctx.join(base, &format!("w{i:02}"));
        let scaled = multiply_divide(
            ctx,
            owner,
            &name,
            MULTIPLY,
            (&angle).into(),
            Scalar::Constant(*weight),
        )?;
        ctx.connect(&scaled, &PortRef::new(*joint, &channel))?;
        drivers.push(scaled.node);
    }
    tracing::debug!("Twist '{}' drives {} joints", base, joints.len());

    Ok(TwistRig {
        relative,
        angle,
        drivers,
    })
}
