// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene-graph contract and in-memory reference host for rigkit.
//!
//! Rig construction talks to its host exclusively through the
//! [`SceneGraph`] trait. This crate provides that contract plus [`Graph`],
//! an in-memory implementation used by the command-line tool and by tests.
//!
//! ## Architecture
//!
//! The reference host is built on a generic graph model with:
//! - An arena of nodes addressed by stable [`NodeId`] handles
//! - Typed, named ports that can be set, locked, read or connected
//! - A transform hierarchy with world-matrix propagation
//! - Lazy pull evaluation with per-port caching and cycle detection
//! - RON document serialization

pub mod connection;
pub mod evaluation;
pub mod graph;
pub mod math;
pub mod node;
pub mod port;
pub mod primitives;
pub mod scene;

pub use connection::{Connection, ConnectionId, PortRef};
pub use graph::Graph;
pub use node::{indexed, Node, NodeId, NodeKind, NodeRegistry, TransformRole};
pub use port::{Port, PortDirection, PortId, PortType, PortValue};
pub use scene::{GraphError, GraphResult, SceneGraph, WriteOutcome};
