// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for half-edge meshes.
//!
//! The [`MeshSet`] is the central owner of all mesh data. Faces own their
//! edge loops in the sense that a face's half-edges are created and linked
//! together with it; half-edges never own vertices or other half-edges.
//! `rev`, `next`, `prev` and `face` are non-owning keys.
//!
//! ## Loose edges
//!
//! A half-edge normally ends where its `next` edge starts. Repair code also
//! works with half-edges that do not bound a face (boundary fragments left
//! by an importer). Those *loose* edges carry an explicit end vertex.

use nalgebra::Point3;
use slotmap::SlotMap;

use crate::keys::*;

/// Data stored for a vertex. The position is overwritten in place when
/// vertices are merged, so every half-edge referencing the vertex sees the
/// update.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexData {
    pub pos: Point3<f64>,
}

/// Data stored for a directed half-edge.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfEdgeData {
    /// Start vertex.
    pub vert: VertexKey,
    /// Successor in the owning face loop.
    pub next: Option<EdgeKey>,
    /// Predecessor in the owning face loop.
    pub prev: Option<EdgeKey>,
    /// Reverse partner. `None` means the edge is open.
    pub rev: Option<EdgeKey>,
    /// Owning face, `None` for loose edges.
    pub face: Option<FaceKey>,
    /// Sub-mesh the edge belongs to.
    pub mesh: MeshKey,
    /// End vertex of a loose edge. Face edges end at `next.vert`.
    pub(crate) loose_end: Option<VertexKey>,
}

/// Data stored for a face: one half-edge of its loop and the loop length.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceData {
    pub edge: EdgeKey,
    pub n_edges: usize,
    pub mesh: MeshKey,
}

/// A sub-mesh: a group of faces plus loose edges, with its open and closed
/// half-edge lists.
///
/// `open_edges` and `closed_edges` are derived from the `rev` links by
/// [`MeshSet::refresh_edge_sets`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub faces: Vec<FaceKey>,
    pub loose_edges: Vec<EdgeKey>,
    pub open_edges: Vec<EdgeKey>,
    pub closed_edges: Vec<EdgeKey>,
}

/// The arena that owns every mesh entity of a meshset.
///
/// # Example
///
/// ```
/// use meshfix_halfedge::MeshSet;
///
/// let mut meshset = MeshSet::new();
/// let mesh = meshset.add_mesh();
/// let v0 = meshset.add_vertex(0.0, 0.0, 0.0);
/// let v1 = meshset.add_vertex(1.0, 0.0, 0.0);
/// let v2 = meshset.add_vertex(0.0, 1.0, 0.0);
/// meshset.add_face(mesh, &[v0, v1, v2]).unwrap();
/// meshset.refresh_edge_sets(mesh).unwrap();
///
/// assert_eq!(meshset.mesh(mesh).unwrap().open_edges.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeshSet {
    pub(crate) vertices: SlotMap<VertexKey, VertexData>,
    pub(crate) edges: SlotMap<EdgeKey, HalfEdgeData>,
    pub(crate) faces: SlotMap<FaceKey, FaceData>,
    pub(crate) meshes: SlotMap<MeshKey, MeshData>,
}

impl MeshSet {
    /// Creates a new, empty meshset.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Vertex access ---

    /// Returns the vertex data for the given key, or `None` if not found.
    pub fn vertex(&self, key: VertexKey) -> Option<&VertexData> {
        self.vertices.get(key)
    }

    /// Returns the position of a vertex.
    pub fn position(&self, key: VertexKey) -> Option<Point3<f64>> {
        self.vertices.get(key).map(|v| v.pos)
    }

    /// Iterates over all vertices.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexKey, &VertexData)> {
        self.vertices.iter()
    }

    /// Returns the number of vertices in the meshset.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    // --- Half-edge access ---

    /// Returns the half-edge data for the given key, or `None` if not found.
    pub fn edge(&self, key: EdgeKey) -> Option<&HalfEdgeData> {
        self.edges.get(key)
    }

    /// Iterates over all half-edges.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &HalfEdgeData)> {
        self.edges.iter()
    }

    /// Returns the number of half-edges in the meshset.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Start vertex of a half-edge.
    pub fn v1(&self, key: EdgeKey) -> Option<VertexKey> {
        self.edges.get(key).map(|e| e.vert)
    }

    /// End vertex of a half-edge: the start of its successor, or the
    /// explicit end of a loose edge.
    pub fn v2(&self, key: EdgeKey) -> Option<VertexKey> {
        let edge = self.edges.get(key)?;
        match edge.next {
            Some(next) => self.edges.get(next).map(|n| n.vert),
            None => edge.loose_end,
        }
    }

    /// Both endpoints of a half-edge, `(v1, v2)`.
    pub fn endpoints(&self, key: EdgeKey) -> Option<(VertexKey, VertexKey)> {
        Some((self.v1(key)?, self.v2(key)?))
    }

    /// Returns `true` if the half-edge has no reverse partner.
    pub fn is_open(&self, key: EdgeKey) -> bool {
        self.edges.get(key).is_some_and(|e| e.rev.is_none())
    }

    // --- Face access ---

    /// Returns the face data for the given key, or `None` if not found.
    pub fn face(&self, key: FaceKey) -> Option<&FaceData> {
        self.faces.get(key)
    }

    /// Returns the number of faces in the meshset.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    // --- Mesh access ---

    /// Returns the sub-mesh data for the given key, or `None` if not found.
    pub fn mesh(&self, key: MeshKey) -> Option<&MeshData> {
        self.meshes.get(key)
    }

    /// Keys of all sub-meshes, in creation order.
    pub fn mesh_keys(&self) -> Vec<MeshKey> {
        self.meshes.keys().collect()
    }

    /// Returns the number of sub-meshes.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}
