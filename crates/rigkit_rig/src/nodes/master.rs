// SPDX-License-Identifier: MIT OR Apache-2.0
//! Master: the global root control every character rig hangs under.

use crate::args::{ArgKind, ArgSpec, ArgValue};
use crate::capability::{BuildsControls, ControlSpec, HasInputPorts, HasOutputPorts, Placement};
use crate::error::RigResult;
use crate::lifecycle::{Lifecycle, RigContext, RigNode, RigNodeCore};
use crate::steps::Section;
use crate::transform::{self, ports};
use glam::Mat4;
use rigkit_graph::{NodeId, PortRef};

/// Global and offset controls, publishing `world` and `master` outputs
#[derive(Debug, Clone)]
pub struct Master {
    core: RigNodeCore,
}

impl Master {
    /// Innermost control, driving the published output
    pub fn offset_control(&self) -> Option<NodeId> {
        self.core.controls.last().copied()
    }
}

fn publish_outputs(node: &mut Master, ctx: &mut RigContext<'_>) -> RigResult<()> {
    let input = node.core.input()?;
    let Some(control) = node.offset_control() else {
        return Ok(());
    };
    transform::expose_output(
        ctx,
        &mut node.core,
        "world",
        &PortRef::new(input, ports::WORLD_MATRIX),
    )?;
    transform::expose_output(
        ctx,
        &mut node.core,
        "master",
        &PortRef::new(control, ports::WORLD_MATRIX),
    )?;
    Ok(())
}

impl RigNode for Master {
    const TYPE_TAG: &'static str = "master";

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
                ArgSpec::with_default("size", ArgKind::Float, ArgValue::Float(1.0)),
                ArgSpec::with_default("shape", ArgKind::Str, ArgValue::Str("square".into())),
            ],
            Section::Connect => transform::input_arg_specs(),
        }
    }

    fn register_steps(lifecycle: &mut Lifecycle<Self>) -> RigResult<()> {
        Self::register_input_steps(lifecycle)?;
        Self::register_output_steps(lifecycle)?;
        Self::register_control_steps(lifecycle)?;
        lifecycle.add_build_step(
            "publish_outputs",
            publish_outputs,
            Section::Build,
            Some("create_controls".into()),
        )
    }

    fn output_driver(&self) -> Option<NodeId> {
        self.offset_control()
    }
}

impl HasInputPorts for Master {}
impl HasOutputPorts for Master {}

impl BuildsControls for Master {
    fn control_layout(&self, _ctx: &RigContext<'_>) -> RigResult<Vec<ControlSpec>> {
        let args = &self.core.args;
        let size = args.float("size")?;
        Ok(vec![
            ControlSpec {
                token: "global".into(),
                world: Mat4::IDENTITY,
                parent: Placement::Content,
                shape: args.str("shape")?.to_string(),
                size,
            },
            ControlSpec {
                token: "offset".into(),
                world: Mat4::IDENTITY,
                parent: Placement::Previous,
                shape: "circle".into(),
                size: size * 0.8,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::BuildArgs;
    use crate::config::RigConfig;
    use crate::naming::NameTuple;
    use crate::registry::rehydrate_as;
    use glam::Vec3;
    use rigkit_graph::{Graph, PortValue, SceneGraph};

    fn built(graph: &mut Graph, config: &RigConfig) -> Master {
        let mut ctx = RigContext::new(graph, config);
        let mut master = Master::from_core(RigNodeCore::new(NameTuple::new("C", "master", 0)));
        master
            .build(&mut ctx, BuildArgs::new().with("size", ArgValue::Float(5.0)))
            .unwrap();
        master.connect(&mut ctx, BuildArgs::new()).unwrap();
        master
    }

    #[test]
    fn test_build_creates_controls_and_outputs() {
        let mut graph = Graph::new("master");
        let config = RigConfig::default();
        let master = built(&mut graph, &config);

        assert_eq!(master.core.controls.len(), 2);
        assert_eq!(master.core.outputs, vec!["world", "master"]);
        let root = master.core.root().unwrap();
        assert_eq!(graph.node_name(root).unwrap(), "C_master_00_rig");
        assert!(graph.find_node("C_master_00_global_ctl").is_some());
        assert_eq!(
            graph
                .get_float(master.core.controls[0], crate::capability::SHAPE_SIZE)
                .unwrap(),
            5.0
        );
    }

    #[test]
    fn test_hierarchy_follows_offset_control() {
        let mut graph = Graph::new("master");
        let config = RigConfig::default();
        let master = built(&mut graph, &config);
        let root = master.core.root().unwrap();
        let global = master.core.controls[0];

        graph
            .set(global, "translateY", PortValue::Float(3.0), false)
            .unwrap();
        let hierarchy = graph.get_matrix(root, ports::HIERARCHY_MATRIX).unwrap();
        assert!((hierarchy.w_axis.truncate() - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-5);
        let published = graph
            .get_matrix(root, &ports::output_port("master"))
            .unwrap();
        assert!(rigkit_graph::math::matrices_close(published, hierarchy, 1e-6));
    }

    #[test]
    fn test_rehydrate_reproduces_state() {
        let mut graph = Graph::new("master");
        let config = RigConfig::default();
        let master = built(&mut graph, &config);
        let root = master.core.root().unwrap();

        let back: Master = rehydrate_as(&graph, root).unwrap();
        assert_eq!(back.core.name, master.core.name);
        assert_eq!(back.core.controls, master.core.controls);
        assert_eq!(back.core.outputs, master.core.outputs);
        assert_eq!(back.core.stage, crate::lifecycle::Stage::Connected);
        assert_eq!(back.output_driver(), master.output_driver());
    }
}
