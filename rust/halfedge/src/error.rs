// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for half-edge mesh operations.

use crate::keys::{EdgeKey, FaceKey, MeshKey, VertexKey};

/// Result type alias for half-edge mesh operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or editing a meshset.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mesh key not found in the meshset.
    #[error("mesh not found: {0:?}")]
    MeshNotFound(MeshKey),

    /// Vertex key not found in the meshset.
    #[error("vertex not found: {0:?}")]
    VertexNotFound(VertexKey),

    /// Half-edge key not found in the meshset.
    #[error("half-edge not found: {0:?}")]
    EdgeNotFound(EdgeKey),

    /// Face key not found in the meshset.
    #[error("face not found: {0:?}")]
    FaceNotFound(FaceKey),

    /// A face needs at least three vertices.
    #[error("face has {0} vertices, at least 3 are required")]
    DegenerateFace(usize),

    /// A loose edge must connect two distinct vertices.
    #[error("loose edge starts and ends at the same vertex: {0:?}")]
    ZeroLengthEdge(VertexKey),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
