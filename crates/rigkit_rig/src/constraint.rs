// SPDX-License-Identifier: MIT OR Apache-2.0
//! Weighted constraints driving transform channels.

use crate::error::{RigError, RigResult};
use crate::lifecycle::RigContext;
use crate::transform::ports;
use glam::Mat4;
use rigkit_graph::{indexed, NodeId, NodeKind, Port, PortRef, PortType, PortValue};

/// Which channel groups a constraint drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Channels {
    /// translateX/Y/Z
    pub translate: bool,
    /// rotateX/Y/Z
    pub rotate: bool,
    /// scaleX/Y/Z
    pub scale: bool,
}

impl Channels {
    /// Every channel
    pub const ALL: Self = Self {
        translate: true,
        rotate: true,
        scale: true,
    };

    /// Translation only
    pub const TRANSLATE: Self = Self {
        translate: true,
        rotate: false,
        scale: false,
    };

    /// Translation and rotation
    pub const TRANSLATE_ROTATE: Self = Self {
        translate: true,
        rotate: true,
        scale: false,
    };

    /// Parse "all", "translate", "rotate", "scale" or "translate_rotate"
    pub fn from_name(name: &str) -> RigResult<Self> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "all" => Self::ALL,
            "translate" => Self::TRANSLATE,
            "translate_rotate" => Self::TRANSLATE_ROTATE,
            "rotate" => Self {
                translate: false,
                rotate: true,
                scale: false,
            },
            "scale" => Self {
                translate: false,
                rotate: false,
                scale: true,
            },
            _ => {
                return Err(RigError::invalid_arg(
                    "channels",
                    format!("unknown channel set '{name}'"),
                ))
            }
        })
    }

    fn pairs(&self) -> Vec<(&'static str, &'static str)> {
        let mut out = Vec::new();
        if self.translate {
            out.push(("constraintTranslate", "translate"));
        }
        if self.rotate {
            out.push(("constraintRotate", "rotate"));
        }
        if self.scale {
            out.push(("constraintScale", "scale"));
        }
        out
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::ALL
    }
}

/// One weighted target of a constraint
#[derive(Debug, Clone)]
pub struct Target {
    /// World matrix source
    pub matrix: PortRef,
    /// Weight source, or a constant
    pub weight: TargetWeight,
}

/// Weight of a constraint target
#[derive(Debug, Clone)]
pub enum TargetWeight {
    /// Live value of a port
    Driven(PortRef),
    /// Constant weight
    Constant(f32),
}

/// Create a constraint driving `driven`'s enabled channels from `targets`.
///
/// With `maintain_offset`, each target keeps its current relation to the
/// driven node so nothing moves when the constraint is created.
pub fn constrain(
    ctx: &mut RigContext<'_>,
    owner: NodeId,
    name: &str,
    targets: &[Target],
    driven: NodeId,
    channels: Channels,
    maintain_offset: bool,
) -> RigResult<NodeId> {
    let constraint = ctx.helper(owner, NodeKind::WeightedConstraint, name)?;
    let driven_world = ctx.graph.get_matrix(driven, ports::WORLD_MATRIX)?;

    for (i, target) in targets.iter().enumerate() {
        let matrix_port = indexed("targetMatrix", i);
        let weight_port = indexed("targetWeight", i);
        let offset_port = indexed("targetOffset", i);
        ctx.graph
            .add_port(constraint, Port::input(&matrix_port, PortType::Mat4))?;
        ctx.graph.add_port(
            constraint,
            Port::input(&weight_port, PortType::Float).with_default(PortValue::Float(1.0)),
        )?;
        ctx.graph
            .add_port(constraint, Port::input(&offset_port, PortType::Mat4))?;

        if maintain_offset {
            let target_world = ctx.graph.get_matrix(target.matrix.node, &target.matrix.port)?;
            let offset: Mat4 = target_world.inverse() * driven_world;
            ctx.set(constraint, &offset_port, PortValue::Mat4(offset))?;
        }
        ctx.connect(&target.matrix, &PortRef::new(constraint, &matrix_port))?;
        match &target.weight {
            TargetWeight::Driven(src) => {
                ctx.connect(src, &PortRef::new(constraint, &weight_port))?;
            }
            TargetWeight::Constant(w) => {
                ctx.set(constraint, &weight_port, PortValue::Float(*w))?;
            }
        }
    }

    ctx.connect(
        &PortRef::new(driven, ports::PARENT_INVERSE_MATRIX),
        &PortRef::new(constraint, ports::PARENT_INVERSE_MATRIX),
    )?;
    for (out, channel) in channels.pairs() {
        for axis in ["X", "Y", "Z"] {
            ctx.connect(
                &PortRef::new(constraint, format!("{out}{axis}")),
                &PortRef::new(driven, format!("{channel}{axis}")),
            )?;
        }
    }
    Ok(constraint)
}
