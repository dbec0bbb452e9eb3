// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stretchy chain between a base and a tip control.
//!
//! Joints are spaced evenly along the start-end line. The base control
//! carries the first joint; the distance from base to tip drives the
//! translation of every following joint through the stretch solver, with
//! optional soft easing toward the upper limit.

use crate::args::{ArgKind, ArgSpec, ArgValue};
use crate::capability::{
    aimed, BuildsControls, BuildsJoints, ControlSpec, HasInputPorts, HasOutputPorts, JointSpec,
    Placement,
};
use crate::constraint::{constrain, Channels, Target, TargetWeight};
use crate::error::{RigError, RigResult};
use crate::lifecycle::{Lifecycle, RigContext, RigNode, RigNodeCore};
use crate::solvers::stretch::STRETCH_MAX;
use crate::solvers::{
    add_stretch_attrs, build_soft_limit, build_stretch, drive_segments, Axis, StretchSettings,
};
use crate::steps::Section;
use crate::transform::{self, ports};
use glam::{Mat4, Vec3};
use rigkit_graph::{NodeId, PortRef};

/// Evenly spaced joints stretched between two controls
#[derive(Debug, Clone)]
pub struct StretchChain {
    core: RigNodeCore,
}

impl StretchChain {
    /// Control at the chain start
    pub fn base_control(&self) -> Option<NodeId> {
        self.core.controls.first().copied()
    }

    /// Control at the chain end; it hosts the stretch ports
    pub fn tip_control(&self) -> Option<NodeId> {
        self.core.controls.get(1).copied()
    }

    fn line(&self) -> RigResult<(Vec3, Vec3)> {
        let start = self.core.args.vec3("start")?;
        let end = self.core.args.vec3("end")?;
        if (end - start).length() <= rigkit_graph::math::EPSILON {
            return Err(RigError::invalid_arg("end", "start and end coincide"));
        }
        Ok((start, end))
    }

    fn joint_count(&self) -> RigResult<usize> {
        let count = self.core.args.int("joint_count")?;
        match usize::try_from(count) {
            Ok(count) if count >= 2 => Ok(count),
            _ => Err(RigError::invalid_arg(
                "joint_count",
                format!("need at least 2 joints, got {count}"),
            )),
        }
    }

    fn settings(&self) -> RigResult<StretchSettings> {
        let args = &self.core.args;
        Ok(StretchSettings::new(
            args.float("stretch")?,
            args.float("stretch_min")?,
            args.float("stretch_max")?,
        ))
    }
}

fn frame(position: Vec3, start: Vec3, end: Vec3) -> Mat4 {
    aimed(position, end - start)
}

fn constrain_base(node: &mut StretchChain, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let root = node.core.root()?;
    let (Some(base), Some(joint)) = (node.base_control(), node.core.joints.first().copied())
    else {
        return Err(RigError::MissingHandle("base control"));
    };
    let name = node.core.compose_part(ctx, "base", "cns")?;
    let target = Target {
        matrix: PortRef::new(base, ports::WORLD_MATRIX),
        weight: TargetWeight::Constant(1.0),
    };
    constrain(ctx, root, &name, &[target], joint, Channels::TRANSLATE_ROTATE, true)?;
    Ok(())
}

fn wire_stretch(node: &mut StretchChain, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let root = node.core.root()?;
    let (Some(base), Some(tip)) = (node.base_control(), node.tip_control()) else {
        return Err(RigError::MissingHandle("tip control"));
    };
    let settings = node.settings()?;
    let soft_start = node.core.args.float("soft_start")?;
    add_stretch_attrs(ctx, tip, &settings)?;

    let stretch_name = node.core.compose_part(ctx, "stretch", "sol")?;
    let soft_name = node.core.compose_part(ctx, "soft", "sol")?;
    let limit = PortRef::new(tip, STRETCH_MAX);
    let soft = |ctx: &mut RigContext<'_>, ratio: &PortRef| {
        build_soft_limit(ctx, root, &soft_name, ratio, soft_start, &limit)
    };
    let shaped: Option<&dyn Fn(&mut RigContext<'_>, &PortRef) -> RigResult<PortRef>> =
        if soft_start < 1.0 { Some(&soft) } else { None };

    let stretch = build_stretch(
        ctx,
        root,
        &stretch_name,
        &PortRef::new(base, ports::WORLD_MATRIX),
        &PortRef::new(tip, ports::WORLD_MATRIX),
        tip,
        shaped,
    )?;

    let segment = stretch.rest_length / (node.core.joints.len() - 1) as f32;
    let segments: Vec<(NodeId, f32)> = node
        .core
        .joints
        .iter()
        .skip(1)
        .map(|joint| (*joint, segment))
        .collect();
    drive_segments(ctx, root, &stretch_name, &stretch.ratio, &segments, Axis::X)?;
    Ok(())
}

fn publish_outputs(node: &mut StretchChain, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let (Some(first), Some(last)) = (
        node.core.joints.first().copied(),
        node.core.joints.last().copied(),
    ) else {
        return Ok(());
    };
    for (name, joint) in [("base", first), ("tip", last)] {
        transform::expose_output(
            ctx,
            &mut node.core,
            name,
            &PortRef::new(joint, ports::WORLD_MATRIX),
        )?;
    }
    Ok(())
}

impl RigNode for StretchChain {
    const TYPE_TAG: &'static str = "stretch_chain";

    fn from_core(core: RigNodeCore) -> Self {
        Self { core }
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
                ArgSpec::optional("start", ArgKind::Vec3).side_sensitive(),
                ArgSpec::optional("end", ArgKind::Vec3).side_sensitive(),
                ArgSpec::with_default("joint_count", ArgKind::Int, ArgValue::Int(3)),
                ArgSpec::with_default("stretch", ArgKind::Float, ArgValue::Float(1.0)),
                ArgSpec::with_default("stretch_min", ArgKind::Float, ArgValue::Float(1.0)),
                ArgSpec::with_default("stretch_max", ArgKind::Float, ArgValue::Float(2.0)),
                ArgSpec::with_default("soft_start", ArgKind::Float, ArgValue::Float(1.0)),
                ArgSpec::with_default("size", ArgKind::Float, ArgValue::Float(1.0)),
            ],
            Section::Connect => transform::input_arg_specs(),
        }
    }

    fn register_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        Self::register_input_steps(lifecycle)?;
        Self::register_output_steps(lifecycle)?;
        Self::register_joint_steps(lifecycle)?;
        Self::register_control_steps(lifecycle)?;
        lifecycle.add_build_step(
            "constrain_base",
            constrain_base,
            Section::Build,
            Some("create_controls".into()),
        )?;
        lifecycle.add_build_step(
            "build_stretch",
            wire_stretch,
            Section::Build,
            Some("constrain_base".into()),
        )?;
        lifecycle.add_build_step(
            "publish_outputs",
            publish_outputs,
            Section::Build,
            Some("build_stretch".into()),
        )
    }

    fn output_driver(&self) -> Option<NodeId> {
        self.core.joints.last().copied()
    }
}

impl HasInputPorts for StretchChain {}
impl HasOutputPorts for StretchChain {}

impl BuildsJoints for StretchChain {
    fn joint_layout(&self, _ctx: &RigContext<'_>) -> RigResult<Vec<JointSpec>> {
        let (start, end) = self.line()?;
        let count = self.joint_count()?;
        Ok((0..count)
            .map(|i| {
                let t = i as f32 / (count - 1) as f32;
                JointSpec {
                    token: format!("seg{i:02}"),
                    world: frame(start.lerp(end, t), start, end),
                    parent: Placement::Previous,
                }
            })
            .collect())
    }
}

impl BuildsControls for StretchChain {
    fn control_layout(&self, _ctx: &RigContext<'_>) -> RigResult<Vec<ControlSpec>> {
        let (start, end) = self.line()?;
        let size = self.core.args.float("size")?;
        Ok([("base", start, "cube"), ("tip", end, "sphere")]
            .into_iter()
            .map(|(token, position, shape)| ControlSpec {
                token: token.into(),
                world: frame(position, start, end),
                parent: Placement::Content,
                shape: shape.into(),
                size,
            })
            .collect())
    }
}
