// SPDX-License-Identifier: MIT OR Apache-2.0
//! Procedural rig construction on top of the rigkit scene-graph contract.
//!
//! ## Architecture
//!
//! Three layers, each depending only on the ones before it:
//! - **Lifecycle**: rig node types contribute ordered, insertable build and
//!   connect steps; every node stores its type tag and identity in the
//!   graph so it can be rehydrated later ([`lifecycle`], [`steps`],
//!   [`registry`], [`info`])
//! - **Matrix composition**: the fixed input/offset/output/hierarchy port
//!   contract, constraints and the numeric solvers built on it
//!   ([`transform`], [`constraint`], [`solvers`])
//! - **Space blending**: priority-ordered space sets, the two-slot blend
//!   and derived visibility ([`space`])
//!
//! Built-in rig node types live in [`nodes`]; [`assembly`] builds whole
//! rigs from a RON description.

pub mod args;
pub mod assembly;
pub mod capability;
pub mod config;
pub mod constraint;
pub mod error;
pub mod info;
pub mod lifecycle;
pub mod naming;
pub mod nodes;
pub mod registry;
pub mod solvers;
pub mod space;
pub mod steps;
pub mod transform;

pub use args::{ArgKind, ArgSpec, ArgValue, BuildArgs};
pub use assembly::{assemble, remove_rig, RigDescription, RigNodeDescription};
pub use capability::{BuildsControls, BuildsJoints, HasInputPorts, HasOutputPorts};
pub use config::RigConfig;
pub use error::{ConfigError, RigError, RigResult};
pub use info::{get_info, get_input_info, get_output_info, RigInfo, RigInputInfo, RigOutputInfo};
pub use lifecycle::{Lifecycle, RigContext, RigNode, RigNodeCore, Stage};
pub use naming::{NameTuple, Naming};
pub use registry::{DynRigNode, RigRegistry};
pub use space::{sort_spaces, SpaceSet};
pub use steps::Section;
