// SPDX-License-Identifier: MIT OR Apache-2.0
//! Primitive node templates the reference host provides.
//!
//! Rig construction only ever wires these; it never evaluates them itself.
//! Indexed inputs (`matrixIn[i]`, `targetMatrix[i]`, `input[i]`,
//! `input1D[i]`) are added per instance with [`crate::SceneGraph::add_port`].

use crate::node::{NodeKind, NodeRegistry, NodeType, TransformRole};
use crate::port::{Port, PortType, PortValue};

/// Condition operations, in enum order
pub const CONDITION_OPERATIONS: [&str; 6] = [
    "equal",
    "notEqual",
    "greaterThan",
    "greaterOrEqual",
    "lessThan",
    "lessOrEqual",
];

/// Multiply/divide operations, in enum order
pub const MULTIPLY_DIVIDE_OPERATIONS: [&str; 4] = ["noOperation", "multiply", "divide", "power"];

/// Plus/minus/average operations, in enum order
pub const PLUS_MINUS_OPERATIONS: [&str; 4] = ["noOperation", "sum", "subtract", "average"];

fn enum_fields(names: &[&str]) -> Vec<(String, i32)> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.to_string(), i as i32))
        .collect()
}

fn float_in(name: &str, default: f32) -> Port {
    Port::input(name, PortType::Float).with_default(PortValue::Float(default))
}

fn xyz_in(prefix: &str, default: f32) -> Vec<Port> {
    ["X", "Y", "Z"]
        .iter()
        .map(|axis| float_in(&format!("{prefix}{axis}"), default))
        .collect()
}

fn xyz_out(prefix: &str) -> Vec<Port> {
    ["X", "Y", "Z"]
        .iter()
        .map(|axis| Port::output(format!("{prefix}{axis}"), PortType::Float))
        .collect()
}

fn transform_type(role: TransformRole, description: &str) -> NodeType {
    let mut inputs = Vec::new();
    inputs.extend(xyz_in("translate", 0.0));
    inputs.extend(xyz_in("rotate", 0.0));
    inputs.extend(xyz_in("scale", 1.0));
    inputs.push(Port::input("visibility", PortType::Bool).with_default(PortValue::Bool(true)));
    inputs.push(Port::input("offsetParentMatrix", PortType::Mat4));
    if role == TransformRole::Control {
        inputs.push(
            Port::input("shape", PortType::String)
                .with_default(PortValue::String("circle".to_string())),
        );
    }

    NodeType {
        kind: NodeKind::Transform(role),
        description: description.to_string(),
        inputs,
        outputs: vec![
            Port::output("matrix", PortType::Mat4),
            Port::output("worldMatrix", PortType::Mat4),
            Port::output("worldInverseMatrix", PortType::Mat4),
            Port::output("parentMatrix", PortType::Mat4),
            Port::output("parentInverseMatrix", PortType::Mat4),
        ],
    }
}

/// Create the primitive node registry with all available node types
pub fn create_primitive_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Hierarchy
    // ========================================================================

    registry.register(transform_type(TransformRole::Group, "Grouping transform"));
    registry.register(transform_type(TransformRole::Joint, "Skinning joint"));
    registry.register(transform_type(TransformRole::Control, "Animator control"));
    registry.register(transform_type(TransformRole::Locator, "Locator"));

    // ========================================================================
    // Matrix math
    // ========================================================================

    registry.register(NodeType {
        kind: NodeKind::MultMatrix,
        description: "Product of matrixIn[i], first index innermost".to_string(),
        inputs: vec![],
        outputs: vec![Port::output("matrixSum", PortType::Mat4)],
    });

    registry.register(NodeType {
        kind: NodeKind::InverseMatrix,
        description: "Matrix inverse".to_string(),
        inputs: vec![Port::input("inputMatrix", PortType::Mat4)],
        outputs: vec![Port::output("outputMatrix", PortType::Mat4)],
    });

    let mut compose_inputs = Vec::new();
    compose_inputs.extend(xyz_in("inputTranslate", 0.0));
    compose_inputs.extend(xyz_in("inputRotate", 0.0));
    compose_inputs.extend(xyz_in("inputScale", 1.0));
    compose_inputs.extend(xyz_in("inputQuat", 0.0));
    compose_inputs.push(float_in("inputQuatW", 1.0));
    compose_inputs.push(
        Port::input("useEulerRotation", PortType::Bool).with_default(PortValue::Bool(true)),
    );
    registry.register(NodeType {
        kind: NodeKind::ComposeMatrix,
        description: "Channels to matrix".to_string(),
        inputs: compose_inputs,
        outputs: vec![Port::output("outputMatrix", PortType::Mat4)],
    });

    let mut decompose_outputs = Vec::new();
    decompose_outputs.extend(xyz_out("outputTranslate"));
    decompose_outputs.extend(xyz_out("outputRotate"));
    decompose_outputs.extend(xyz_out("outputScale"));
    decompose_outputs.extend(xyz_out("outputQuat"));
    decompose_outputs.push(Port::output("outputQuatW", PortType::Float));
    registry.register(NodeType {
        kind: NodeKind::DecomposeMatrix,
        description: "Matrix to channels".to_string(),
        inputs: vec![Port::input("inputMatrix", PortType::Mat4)],
        outputs: decompose_outputs,
    });

    let mut quat_inputs = xyz_in("inputQuat", 0.0);
    quat_inputs.push(float_in("inputQuatW", 1.0));
    registry.register(NodeType {
        kind: NodeKind::QuatToEuler,
        description: "Quaternion to euler angles (degrees)".to_string(),
        inputs: quat_inputs,
        outputs: xyz_out("outputRotate"),
    });

    // ========================================================================
    // Constraints and selection
    // ========================================================================

    let mut constraint_outputs = Vec::new();
    constraint_outputs.extend(xyz_out("constraintTranslate"));
    constraint_outputs.extend(xyz_out("constraintRotate"));
    constraint_outputs.extend(xyz_out("constraintScale"));
    constraint_outputs.push(Port::output("constraintMatrix", PortType::Mat4));
    registry.register(NodeType {
        kind: NodeKind::WeightedConstraint,
        description: "Weighted average of targetMatrix[i] * targetOffset[i]".to_string(),
        inputs: vec![Port::input("parentInverseMatrix", PortType::Mat4)],
        outputs: constraint_outputs,
    });

    registry.register(NodeType {
        kind: NodeKind::Choice,
        description: "Pick input[selector]".to_string(),
        inputs: vec![Port::input("selector", PortType::Int)],
        outputs: vec![Port::output("output", PortType::Any)],
    });

    registry.register(NodeType {
        kind: NodeKind::Condition,
        description: "Compare two terms".to_string(),
        inputs: vec![
            float_in("firstTerm", 0.0),
            float_in("secondTerm", 0.0),
            Port::enumeration("operation", enum_fields(&CONDITION_OPERATIONS)),
            float_in("colorIfTrue", 1.0),
            float_in("colorIfFalse", 0.0),
        ],
        outputs: vec![Port::output("outColor", PortType::Float)],
    });

    // ========================================================================
    // Scalar math
    // ========================================================================

    registry.register(NodeType {
        kind: NodeKind::Reverse,
        description: "1 - input".to_string(),
        inputs: vec![float_in("input", 0.0)],
        outputs: vec![Port::output("output", PortType::Float)],
    });

    registry.register(NodeType {
        kind: NodeKind::Distance,
        description: "Distance between two matrix positions".to_string(),
        inputs: vec![
            Port::input("inMatrix1", PortType::Mat4),
            Port::input("inMatrix2", PortType::Mat4),
        ],
        outputs: vec![Port::output("distance", PortType::Float)],
    });

    registry.register(NodeType {
        kind: NodeKind::MultiplyDivide,
        description: "Scalar multiply, divide or power".to_string(),
        inputs: vec![
            float_in("input1", 0.0),
            float_in("input2", 1.0),
            Port::enumeration("operation", enum_fields(&MULTIPLY_DIVIDE_OPERATIONS))
                .with_default(PortValue::Int(1)),
        ],
        outputs: vec![Port::output("output", PortType::Float)],
    });

    registry.register(NodeType {
        kind: NodeKind::PlusMinusAverage,
        description: "Sum, subtract or average input1D[i]".to_string(),
        inputs: vec![Port::enumeration("operation", enum_fields(&PLUS_MINUS_OPERATIONS))
            .with_default(PortValue::Int(1))],
        outputs: vec![Port::output("output1D", PortType::Float)],
    });

    registry.register(NodeType {
        kind: NodeKind::Clamp,
        description: "Clamp input into [min, max]".to_string(),
        inputs: vec![
            float_in("input", 0.0),
            float_in("min", 0.0),
            float_in("max", 1.0),
        ],
        outputs: vec![Port::output("output", PortType::Float)],
    });

    registry.register(NodeType {
        kind: NodeKind::BlendScalar,
        description: "input0 + (input1 - input0) * blender".to_string(),
        inputs: vec![
            float_in("input0", 0.0),
            float_in("input1", 0.0),
            float_in("blender", 0.0).with_range(0.0, 1.0),
        ],
        outputs: vec![Port::output("output", PortType::Float)],
    });

    registry
}
