// SPDX-License-Identifier: MIT OR Apache-2.0
//! Twist segment: interior joints sharing the twist of an end node.
//!
//! Joints sit between two existing nodes, each under an aim group that
//! follows the weighted position of both ends. At connect time the end's
//! twist about the chosen axis, relative to the start, is distributed over
//! the joints by a weight curve.

use crate::args::{ArgKind, ArgSpec, ArgValue};
use crate::capability::{aimed, place_transform, HasInputPorts, HasOutputPorts};
use crate::constraint::{constrain, Channels, Target, TargetWeight};
use crate::error::{RigError, RigResult};
use crate::lifecycle::{Lifecycle, RigContext, RigNode, RigNodeCore};
use crate::solvers::{build_twist, Axis, InterpolationMode, WeightCurve};
use crate::steps::Section;
use crate::transform::{self, ports};
use rigkit_graph::{NodeId, Port, PortRef, PortType, PortValue, SceneGraph, TransformRole};

/// Root port holding the start node
pub const TWIST_START: &str = "twistStart";
/// Root port holding the end node
pub const TWIST_END: &str = "twistEnd";

/// Interior joints distributing the twist between two nodes
#[derive(Debug, Clone)]
pub struct TwistSegment {
    core: RigNodeCore,
    start: Option<NodeId>,
    end: Option<NodeId>,
}

impl TwistSegment {
    /// Node the twist is measured from
    pub fn start(&self) -> Option<NodeId> {
        self.start
    }

    /// Node whose twist is distributed
    pub fn end(&self) -> Option<NodeId> {
        self.end
    }

    fn count(&self) -> RigResult<usize> {
        let count = self.core.args.int("count")?;
        match usize::try_from(count) {
            Ok(count) if count >= 1 => Ok(count),
            _ => Err(RigError::invalid_arg(
                "count",
                format!("need at least 1 joint, got {count}"),
            )),
        }
    }

    fn weights(&self, count: usize) -> RigResult<Vec<f32>> {
        let args = &self.core.args;
        let curve = if args.contains("weights") {
            let name = args.str("interpolation")?;
            let mode = InterpolationMode::from_name(name).ok_or_else(|| {
                RigError::invalid_arg("interpolation", format!("unknown mode '{name}'"))
            })?;
            WeightCurve::from_pairs(args.curve("weights")?, mode)
        } else {
            WeightCurve::linear_ramp()
        };
        Ok(curve.sample(count))
    }
}

fn create_twist_joints(node: &mut TwistSegment, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let root = node.core.root()?;
    let content = node.core.input()?;
    let start = node.core.args.node("start")?;
    let end = node.core.args.node("end")?;
    if start == end {
        return Err(RigError::invalid_arg("end", "start and end are the same node"));
    }
    let count = node.count()?;

    let from = ctx.graph.get_matrix(start, ports::WORLD_MATRIX)?.w_axis.truncate();
    let to = ctx.graph.get_matrix(end, ports::WORLD_MATRIX)?.w_axis.truncate();

    for (port, value) in [(TWIST_START, start), (TWIST_END, end)] {
        ctx.graph.add_port(
            root,
            Port::input(port, PortType::Handle).with_default(PortValue::Handle(Some(value))),
        )?;
        ctx.graph.set_locked(root, port, true)?;
    }

    let mut joints = Vec::with_capacity(count);
    for i in 0..count {
        let t = (i + 1) as f32 / (count + 1) as f32;
        let token = format!("tw{i:02}");
        let aim_name = node.core.compose_part(ctx, &token, "aim")?;
        let joint_name = node.core.compose_part(ctx, &token, "jnt")?;
        let cns_name = node.core.compose_part(ctx, &token, "cns")?;

        let world = aimed(from.lerp(to, t), to - from);
        let aim = place_transform(ctx, TransformRole::Group, &aim_name, content, world)?;
        let joint = place_transform(ctx, TransformRole::Joint, &joint_name, aim, world)?;
        let targets = [(start, 1.0 - t), (end, t)].map(|(target, weight)| Target {
            matrix: PortRef::new(target, ports::WORLD_MATRIX),
            weight: TargetWeight::Constant(weight),
        });
        constrain(ctx, root, &cns_name, &targets, aim, Channels::TRANSLATE, false)?;
        ctx.graph.append_handle(root, ports::JOINTS, joint)?;
        joints.push(joint);
    }

    node.core.joints = joints;
    node.start = Some(start);
    node.end = Some(end);
    Ok(())
}

fn wire_twist(node: &mut TwistSegment, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let root = node.core.root()?;
    let (Some(start), Some(end)) = (node.start, node.end) else {
        return Err(RigError::MissingHandle("twist start"));
    };
    let axis = Axis::from_name(node.core.args.str("axis")?)?;
    let weights = node.weights(node.core.joints.len())?;
    let name = node.core.compose_part(ctx, "twist", "sol")?;
    let joints = node.core.joints.clone();
    build_twist(ctx, root, &name, start, end, &joints, axis, &weights)?;
    Ok(())
}

impl RigNode for TwistSegment {
    const TYPE_TAG: &'static str = "twist_segment";

    fn from_core(core: RigNodeCore) -> Self {
        Self {
            core,
            start: None,
            end: None,
        }
    }

    fn core(&self) -> &RigNodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RigNodeCore {
        &mut self.core
    }

    fn arg_specs(section: Section) -> Vec<ArgSpec> {
        match section {
            Section::Build => vec![
                ArgSpec::optional("start", ArgKind::Node).side_sensitive(),
                ArgSpec::optional("end", ArgKind::Node).side_sensitive(),
                ArgSpec::with_default("count", ArgKind::Int, ArgValue::Int(3)),
                ArgSpec::with_default("axis", ArgKind::Str, ArgValue::Str("x".into())),
            ],
            Section::Connect => {
                let mut specs = transform::input_arg_specs();
                specs.push(ArgSpec::optional("weights", ArgKind::Curve));
                specs.push(ArgSpec::with_default(
                    "interpolation",
                    ArgKind::Str,
                    ArgValue::Str("linear".into()),
                ));
                specs
            }
        }
    }

    fn register_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        Self::register_input_steps(lifecycle)?;
        Self::register_output_steps(lifecycle)?;
        lifecycle.add_build_step(
            "create_twist_joints",
            create_twist_joints,
            Section::Build,
            Some("register_outputs".into()),
        )?;
        lifecycle.add_build_step(
            "build_twist",
            wire_twist,
            Section::Connect,
            Some("connect_inputs".into()),
        )
    }

    fn read_info(&mut self, graph: &dyn SceneGraph) -> RigResult<()> {
        let root = self.core.root()?;
        self.start = graph.get(root, TWIST_START)?.as_handle().flatten();
        self.end = graph.get(root, TWIST_END)?.as_handle().flatten();
        Ok(())
    }
}

impl HasInputPorts for TwistSegment {}
impl HasOutputPorts for TwistSegment {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::BuildArgs;
    use crate::config::RigConfig;
    use crate::naming::NameTuple;
    use crate::registry::rehydrate_as;
    use glam::Vec3;
    use rigkit_graph::{Graph, NodeKind};

    struct Ends {
        start: NodeId,
        end: NodeId,
    }

    fn ends(graph: &mut Graph) -> Ends {
        let group = NodeKind::Transform(TransformRole::Group);
        let start = graph.create_node(group, "L_arm_00_start_grp", None).unwrap();
        let end = graph.create_node(group, "L_arm_00_end_grp", None).unwrap();
        graph
            .set(end, "translateX", PortValue::Float(4.0), false)
            .unwrap();
        Ends { start, end }
    }

    fn build(graph: &mut Graph, config: &RigConfig, ends: &Ends, connect: BuildArgs) -> TwistSegment {
        let mut ctx = RigContext::new(graph, config);
        let mut twist =
            TwistSegment::from_core(RigNodeCore::new(NameTuple::new("L", "forearm", 0)));
        let args = BuildArgs::new()
            .with("start", ArgValue::Node(ends.start))
            .with("end", ArgValue::Str("L_arm_00_end_grp".into()));
        twist.build(&mut ctx, args).unwrap();
        twist.connect(&mut ctx, connect).unwrap();
        twist
    }

    fn rotate_x(graph: &Graph, joint: NodeId) -> f32 {
        graph.get_float(joint, "rotateX").unwrap()
    }

    #[test]
    fn test_joints_spread_between_ends() {
        let mut graph = Graph::new("twist");
        let config = RigConfig::default();
        let ends = ends(&mut graph);
        let twist = build(&mut graph, &config, &ends, BuildArgs::new());

        assert_eq!(twist.core.joints.len(), 3);
        for (joint, x) in twist.core.joints.iter().zip([1.0, 2.0, 3.0]) {
            let at = graph.get_matrix(*joint, ports::WORLD_MATRIX).unwrap().w_axis;
            assert!((at.truncate() - Vec3::new(x, 0.0, 0.0)).length() < 1e-4);
        }

        graph
            .set(ends.start, "translateY", PortValue::Float(2.0), false)
            .unwrap();
        let middle = graph
            .get_matrix(twist.core.joints[1], ports::WORLD_MATRIX)
            .unwrap()
            .w_axis;
        assert!((middle.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_end_twist_is_distributed() {
        let mut graph = Graph::new("twist");
        let config = RigConfig::default();
        let ends = ends(&mut graph);
        let twist = build(&mut graph, &config, &ends, BuildArgs::new());

        for joint in &twist.core.joints {
            assert!(rotate_x(&graph, *joint).abs() < 1e-3);
        }
        graph
            .set(ends.end, "rotateX", PortValue::Float(90.0), false)
            .unwrap();
        for (joint, expected) in twist.core.joints.iter().zip([22.5, 45.0, 67.5]) {
            let angle = rotate_x(&graph, *joint);
            assert!((angle - expected).abs() < 1e-2, "{angle} != {expected}");
        }
    }

    #[test]
    fn test_weight_curve_shapes_distribution() {
        let mut graph = Graph::new("twist");
        let config = RigConfig::default();
        let ends = ends(&mut graph);
        let connect = BuildArgs::new()
            .with("weights", ArgValue::Curve(vec![[0.0, 0.0], [0.5, 1.0], [1.0, 1.0]]))
            .with("interpolation", ArgValue::Str("constant".into()));
        let twist = build(&mut graph, &config, &ends, connect);

        graph
            .set(ends.end, "rotateX", PortValue::Float(60.0), false)
            .unwrap();
        let angles: Vec<f32> = twist
            .core
            .joints
            .iter()
            .map(|j| rotate_x(&graph, *j))
            .collect();
        assert!(angles[0].abs() < 1e-2);
        assert!((angles[1] - 60.0).abs() < 1e-2);
        assert!((angles[2] - 60.0).abs() < 1e-2);
    }

    #[test]
    fn test_rehydrate_restores_ends() {
        let mut graph = Graph::new("twist");
        let config = RigConfig::default();
        let ends = ends(&mut graph);
        let twist = build(&mut graph, &config, &ends, BuildArgs::new());

        let back: TwistSegment = rehydrate_as(&graph, twist.core.root().unwrap()).unwrap();
        assert_eq!(back.start(), Some(ends.start));
        assert_eq!(back.end(), Some(ends.end));
        assert_eq!(back.core.joints, twist.core.joints);
    }
}
