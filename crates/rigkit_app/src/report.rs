// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig reports: everything the graph says about its rig nodes.

use rigkit_graph::SceneGraph;
use rigkit_rig::info::rig_roots;
use rigkit_rig::{
    get_info, get_input_info, get_output_info, RigInfo, RigInputInfo, RigOutputInfo, RigRegistry,
    RigResult,
};
use serde::Serialize;
use std::fmt::Write as _;

/// Rehydrated state of one rig node
#[derive(Debug, Clone, Serialize)]
pub struct RigEntry {
    /// Identity and progress
    pub info: RigInfo,
    /// Input side
    pub input: RigInputInfo,
    /// Output side
    pub output: RigOutputInfo,
    /// Whether the registry could rehydrate it
    pub rehydrated: bool,
}

/// Every rig node of a document
#[derive(Debug, Clone, Serialize)]
pub struct RigReport {
    /// Document name
    pub document: String,
    /// Rig nodes, in creation order
    pub rigs: Vec<RigEntry>,
}

/// Collect a report over every rig root in `graph`
pub fn collect(
    graph: &dyn SceneGraph,
    document: &str,
    registry: &RigRegistry,
) -> RigResult<RigReport> {
    let mut rigs = Vec::new();
    for root in rig_roots(graph) {
        let rehydrated = match registry.rehydrate(graph, root) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Cannot rehydrate {}: {}", graph.node_name(root)?, e);
                false
            }
        };
        rigs.push(RigEntry {
            info: get_info(graph, root)?,
            input: get_input_info(graph, root)?,
            output: get_output_info(graph, root)?,
            rehydrated,
        });
    }
    Ok(RigReport {
        document: document.to_string(),
        rigs,
    })
}

impl RigReport {
    /// Human-readable summary, one block per rig node
    pub fn summary(&self, graph: &dyn SceneGraph) -> RigResult<String> {
        let mut out = String::new();
        let _ = writeln!(out, "{}: {} rig nodes", self.document, self.rigs.len());
        for rig in &self.rigs {
            let parent = match rig.input.parent {
                Some(parent) => graph.node_name(parent)?,
                None => "-".to_string(),
            };
            let _ = writeln!(
                out,
                "  {} [{}] {:?}{}",
                rig.info.root_name,
                rig.info.type_tag,
                rig.info.stage,
                if rig.info.flipped { " flipped" } else { "" },
            );
            let _ = writeln!(
                out,
                "    parent: {parent}, joints: {}, controls: {}, helpers: {}",
                rig.output.joints.len(),
                rig.output.controls.len(),
                rig.info.helper_count,
            );
            if !rig.output.outputs.is_empty() {
                let _ = writeln!(out, "    outputs: {}", rig.output.outputs.join(", "));
            }
        }
        Ok(out)
    }
}
