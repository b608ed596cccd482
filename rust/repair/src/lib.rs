// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # MeshFix Repair
//!
//! Open-edge repair for half-edge meshes that are not watertight.
//!
//! Imprecise CAD import and boolean operations leave meshes with *open*
//! half-edges: boundary edges without a reverse partner. An
//! [`EdgeLoopFinder`] session works on the open edges of one sub-mesh:
//!
//! 1. merge near-duplicate boundary vertices (or collapse a tiny boundary
//!    cluster to a single point),
//! 2. collapse degenerate zero-length open edges,
//! 3. pair open edges that run between the same two vertices in opposite
//!    directions ("simple loops"),
//! 4. trace closed loops of three or more open edges so they can be closed
//!    with new faces.
//!
//! Every mutating step snapshots the meshset first (at most once per
//! session). Passes that a [`MeshOracle`](meshfix_halfedge::MeshOracle)
//! judges net-negative are rolled back to that snapshot.
//!
//! [`repair_open_edges`] runs the whole sequence over every sub-mesh of a
//! meshset.

pub mod config;
pub mod driver;
pub mod error;
pub mod finder;
pub mod loops;
pub mod merge;
pub mod simple_loops;

pub use config::{PathScoping, RepairParams};
pub use driver::{repair_open_edges, RepairReport};
pub use error::{Error, Result};
pub use finder::{EdgeLoopFinder, InitOutcome};
pub use loops::{EdgeLoop, LoopEdge, LoopSearchOutcome, SyntheticEdge, SyntheticEdgeKey};
pub use simple_loops::{ApproximateMatches, SimpleLoopOutcome};
