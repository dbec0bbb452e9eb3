// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in rig node types.
//!
//! Every type implements [`crate::RigNode`] plus the capabilities it needs
//! and is registered by [`crate::RigRegistry::with_builtin`].

mod fk_chain;
mod master;
mod space_switch;
mod stretch_chain;
mod twist_segment;

pub use fk_chain::FkChain;
pub use master::Master;
pub use space_switch::{SpaceSwitch, SPACE_PREFIX, SPACE_TARGET};
pub use stretch_chain::StretchChain;
pub use twist_segment::{TwistSegment, TWIST_END, TWIST_START};
