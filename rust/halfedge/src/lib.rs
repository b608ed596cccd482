// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # MeshFix Half-Edge
//!
//! Arena-based half-edge mesh used as input for mesh repair and boolean
//! operations.
//!
//! A [`MeshSet`] owns vertices, half-edges, faces and sub-meshes in slot
//! maps with stable, generational keys. Every cross reference between
//! entities (`rev`, `next`, `prev`, `face`) is a plain key, so the whole
//! structure is `Clone` and a clone is a faithful snapshot: keys taken from
//! the original resolve to the same entities in the copy.
//!
//! Half-edges without a `rev` partner are *open*. They mark holes and seams
//! that keep the mesh from being watertight. The [`validity`] module scores
//! a meshset for suitability as boolean-operation input.

pub mod construction;
pub mod error;
pub mod geometry;
pub mod keys;
pub mod meshset;
pub mod serialization;
pub mod spatial;
pub mod validity;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};

pub use error::{Error, Result};
pub use geometry::Aabb;
pub use keys::{EdgeKey, FaceKey, MeshKey, VertexKey};
pub use meshset::{FaceData, HalfEdgeData, MeshData, MeshSet, VertexData};
pub use spatial::SpatialIndex;
pub use validity::{BoolOpOracle, MeshInfo, MeshOracle};
