// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation for computed (output) ports.
//!
//! Evaluation is pull-based: [`crate::Graph`] asks for one output port, and
//! only the inputs that port depends on are pulled. This keeps a transform's
//! `parentInverseMatrix` independent of its own channels, so a constraint can
//! read it and drive those channels without forming a loop.

use crate::graph::Graph;
use crate::math::{self, EPSILON};
use crate::node::{indexed, Node, NodeKind};
use crate::port::PortValue;
use crate::scene::{GraphError, GraphResult};
use glam::{Mat4, Quat, Vec3, Vec4};

/// Typed access to one node's inputs during evaluation
struct Inputs<'a> {
    graph: &'a Graph,
    node: &'a Node,
}

impl<'a> Inputs<'a> {
    fn value(&self, port: &str) -> GraphResult<PortValue> {
        self.graph.pull(self.node.id, port)
    }

    fn float(&self, port: &str) -> GraphResult<f32> {
        self.value(port)?
            .as_float()
            .ok_or_else(|| self.mismatch(port, crate::PortType::Float))
    }

    fn int(&self, port: &str) -> GraphResult<i32> {
        self.value(port)?
            .as_int()
            .ok_or_else(|| self.mismatch(port, crate::PortType::Int))
    }

    fn boolean(&self, port: &str) -> GraphResult<bool> {
        self.value(port)?
            .as_bool()
            .ok_or_else(|| self.mismatch(port, crate::PortType::Bool))
    }

    fn mat4(&self, port: &str) -> GraphResult<Mat4> {
        self.value(port)?
            .as_mat4()
            .ok_or_else(|| self.mismatch(port, crate::PortType::Mat4))
    }

    fn vec3(&self, prefix: &str) -> GraphResult<Vec3> {
        Ok(Vec3::new(
            self.float(&format!("{prefix}X"))?,
            self.float(&format!("{prefix}Y"))?,
            self.float(&format!("{prefix}Z"))?,
        ))
    }

    fn has(&self, port: &str) -> bool {
        self.node.port(port).is_some()
    }

    fn mismatch(&self, port: &str, expected: crate::PortType) -> GraphError {
        GraphError::TypeMismatch {
            port: format!("{}.{}", self.node.name, port),
            expected,
        }
    }

    fn unknown(&self, port: &str) -> GraphError {
        GraphError::PortNotFound {
            node: self.node.name.clone(),
            port: port.to_string(),
        }
    }

    fn failed(&self, message: impl Into<String>) -> GraphError {
        GraphError::Evaluation {
            node: self.node.name.clone(),
            message: message.into(),
        }
    }
}

/// Pick the component of a vector named by a port's trailing axis letter
fn axis_of(v: Vec3, port: &str, prefix: &str) -> Option<f32> {
    match port.strip_prefix(prefix)? {
        "X" => Some(v.x),
        "Y" => Some(v.y),
        "Z" => Some(v.z),
        _ => None,
    }
}

/// Compute the value of an output port
pub(crate) fn compute(graph: &Graph, node: &Node, port: &str) -> GraphResult<PortValue> {
    let inputs = Inputs { graph, node };
    match node.kind {
        NodeKind::Transform(_) => transform(&inputs, port),
        NodeKind::MultMatrix => {
            let matrices = node
                .indexed_inputs("matrixIn")
                .into_iter()
                .map(|(i, _)| inputs.mat4(&indexed("matrixIn", i)))
                .collect::<GraphResult<Vec<_>>>()?;
            Ok(PortValue::Mat4(math::product(&matrices)))
        }
        NodeKind::InverseMatrix => Ok(PortValue::Mat4(inputs.mat4("inputMatrix")?.inverse())),
        NodeKind::ComposeMatrix => {
            let translate = inputs.vec3("inputTranslate")?;
            let scale = inputs.vec3("inputScale")?;
            let matrix = if inputs.boolean("useEulerRotation")? {
                math::compose_trs(translate, inputs.vec3("inputRotate")?, scale)
            } else {
                let q = inputs.vec3("inputQuat")?.extend(inputs.float("inputQuatW")?);
                let rotation = normalized_quat(q);
                Mat4::from_scale_rotation_translation(scale, rotation, translate)
            };
            Ok(PortValue::Mat4(matrix))
        }
        NodeKind::DecomposeMatrix => decompose(&inputs, port),
        NodeKind::QuatToEuler => {
            let q = inputs.vec3("inputQuat")?.extend(inputs.float("inputQuatW")?);
            let euler = math::euler_deg_from_quat(normalized_quat(q));
            axis_of(euler, port, "outputRotate")
                .map(PortValue::Float)
                .ok_or_else(|| inputs.unknown(port))
        }
        NodeKind::WeightedConstraint => weighted_constraint(&inputs, port),
        NodeKind::Choice => {
            let selector = inputs.int("selector")?;
            let selected = usize::try_from(selector)
                .ok()
                .map(|i| indexed("input", i))
                .filter(|name| inputs.has(name))
                .ok_or_else(|| GraphError::MissingInput {
                    node: node.name.clone(),
                    port: format!("input[{selector}]"),
                })?;
            inputs.value(&selected)
        }
        NodeKind::Reverse => Ok(PortValue::Float(1.0 - inputs.float("input")?)),
        NodeKind::Condition => {
            let a = inputs.float("firstTerm")?;
            let b = inputs.float("secondTerm")?;
            let hit = match inputs.int("operation")? {
                0 => a == b,
                1 => a != b,
                2 => a > b,
                3 => a >= b,
                4 => a < b,
                5 => a <= b,
                other => return Err(inputs.failed(format!("unknown operation {other}"))),
            };
            let picked = if hit { "colorIfTrue" } else { "colorIfFalse" };
            Ok(PortValue::Float(inputs.float(picked)?))
        }
        NodeKind::Distance => {
            let a = inputs.mat4("inMatrix1")?.w_axis.truncate();
            let b = inputs.mat4("inMatrix2")?.w_axis.truncate();
            Ok(PortValue::Float((a - b).length()))
        }
        NodeKind::MultiplyDivide => {
            let a = inputs.float("input1")?;
            let b = inputs.float("input2")?;
            let value = match inputs.int("operation")? {
                0 => a,
                1 => a * b,
                2 => {
                    if b.abs() < EPSILON {
                        return Err(inputs.failed("division by zero"));
                    }
                    a / b
                }
                3 => a.powf(b),
                other => return Err(inputs.failed(format!("unknown operation {other}"))),
            };
            Ok(PortValue::Float(value))
        }
        NodeKind::PlusMinusAverage => {
            let values = node
                .indexed_inputs("input1D")
                .into_iter()
                .map(|(i, _)| inputs.float(&indexed("input1D", i)))
                .collect::<GraphResult<Vec<_>>>()?;
            let value = match inputs.int("operation")? {
                0 => values.first().copied().unwrap_or(0.0),
                1 => values.iter().sum(),
                2 => match values.split_first() {
                    Some((first, rest)) => rest.iter().fold(*first, |acc, v| acc - v),
                    None => 0.0,
                },
                3 => {
                    if values.is_empty() {
                        0.0
                    } else {
                        values.iter().sum::<f32>() / values.len() as f32
                    }
                }
                other => return Err(inputs.failed(format!("unknown operation {other}"))),
            };
            Ok(PortValue::Float(value))
        }
        NodeKind::Clamp => {
            let value = inputs.float("input")?;
            let min = inputs.float("min")?;
            let max = inputs.float("max")?;
            Ok(PortValue::Float(value.max(min).min(max)))
        }
        NodeKind::BlendScalar => {
            let a = inputs.float("input0")?;
            let b = inputs.float("input1")?;
            let t = inputs.float("blender")?;
            Ok(PortValue::Float(a + (b - a) * t))
        }
    }
}

fn normalized_quat(v: Vec4) -> Quat {
    if v.length_squared() < EPSILON {
        Quat::IDENTITY
    } else {
        Quat::from_vec4(v).normalize()
    }
}

fn transform(inputs: &Inputs<'_>, port: &str) -> GraphResult<PortValue> {
    let parent_world = match inputs.node.parent {
        Some(parent) => inputs
            .graph
            .pull(parent, "worldMatrix")?
            .as_mat4()
            .unwrap_or(Mat4::IDENTITY),
        None => Mat4::IDENTITY,
    };

    let local = || -> GraphResult<Mat4> {
        Ok(math::compose_trs(
            inputs.vec3("translate")?,
            inputs.vec3("rotate")?,
            inputs.vec3("scale")?,
        ))
    };

    let matrix = match port {
        "matrix" => local()?,
        "parentMatrix" => parent_world,
        "parentInverseMatrix" => (parent_world * inputs.mat4("offsetParentMatrix")?).inverse(),
        "worldMatrix" => parent_world * inputs.mat4("offsetParentMatrix")? * local()?,
        "worldInverseMatrix" => {
            (parent_world * inputs.mat4("offsetParentMatrix")? * local()?).inverse()
        }
        _ => return Err(inputs.unknown(port)),
    };
    Ok(PortValue::Mat4(matrix))
}

fn decompose(inputs: &Inputs<'_>, port: &str) -> GraphResult<PortValue> {
    let m = inputs.mat4("inputMatrix")?;
    let (scale, rotation, translation) = m.to_scale_rotation_translation();
    let value = if port == "outputQuatW" {
        Some(rotation.w)
    } else {
        axis_of(translation, port, "outputTranslate")
            .or_else(|| axis_of(math::euler_deg_from_quat(rotation), port, "outputRotate"))
            .or_else(|| axis_of(scale, port, "outputScale"))
            .or_else(|| axis_of(Vec3::new(rotation.x, rotation.y, rotation.z), port, "outputQuat"))
    };
    value
        .map(PortValue::Float)
        .ok_or_else(|| inputs.unknown(port))
}

fn weighted_constraint(inputs: &Inputs<'_>, port: &str) -> GraphResult<PortValue> {
    let parent_inverse = inputs.mat4("parentInverseMatrix")?;

    let mut targets = Vec::new();
    for (i, _) in inputs.node.indexed_inputs("targetMatrix") {
        let weight_port = indexed("targetWeight", i);
        let weight = if inputs.has(&weight_port) {
            inputs.float(&weight_port)?.max(0.0)
        } else {
            1.0
        };
        let offset_port = indexed("targetOffset", i);
        let offset = if inputs.has(&offset_port) {
            inputs.mat4(&offset_port)?
        } else {
            Mat4::IDENTITY
        };
        let target = inputs.mat4(&indexed("targetMatrix", i))?;
        targets.push((parent_inverse * target * offset, weight));
    }

    let total: f32 = targets.iter().map(|(_, w)| w).sum();
    let (translation, rotation, scale) = if total < EPSILON {
        (Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
    } else {
        let mut translation = Vec3::ZERO;
        let mut scale = Vec3::ZERO;
        let mut rotation = Vec4::ZERO;
        let mut reference: Option<Quat> = None;
        for (matrix, weight) in &targets {
            let w = weight / total;
            let (s, q, t) = matrix.to_scale_rotation_translation();
            // Keep every quaternion in the hemisphere of the first one
            let q = match reference {
                Some(r) if r.dot(q) < 0.0 => -q,
                Some(_) => q,
                None => {
                    reference = Some(q);
                    q
                }
            };
            translation += t * w;
            scale += s * w;
            rotation += Vec4::from(q) * w;
        }
        (translation, normalized_quat(rotation), scale)
    };

    if port == "constraintMatrix" {
        return Ok(PortValue::Mat4(Mat4::from_scale_rotation_translation(
            scale,
            rotation,
            translation,
        )));
    }
    axis_of(translation, port, "constraintTranslate")
        .or_else(|| axis_of(math::euler_deg_from_quat(rotation), port, "constraintRotate"))
        .or_else(|| axis_of(scale, port, "constraintScale"))
        .map(PortValue::Float)
        .ok_or_else(|| inputs.unknown(port))
}
