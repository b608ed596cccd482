// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The repair session: open-edge index, lazy backup and rollback.
//!
//! A session borrows the meshset exclusively for its whole lifetime and
//! works on the open edges of one sub-mesh. The repair passes live in
//! [`merge`](crate::merge), [`simple_loops`](crate::simple_loops) and
//! [`loops`](crate::loops).

use std::collections::{BTreeMap, BTreeSet};

use meshfix_halfedge::{Aabb, EdgeKey, MeshKey, MeshSet, Point3, VertexKey};
use rustc_hash::FxHashSet;
use slotmap::SlotMap;

use crate::config::RepairParams;
use crate::error::{Error, Result};
use crate::loops::{EdgeLoop, SyntheticEdge, SyntheticEdgeKey};

/// What [`EdgeLoopFinder::init_from_mesh`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitOutcome {
    /// Any vertex moved; the caller should revalidate.
    pub changed: bool,
    /// The whole boundary was collapsed to one point.
    pub merged_to_point: bool,
    pub vertices_merged: usize,
}

/// Repair session over the open edges of one sub-mesh.
///
/// The open-edge index maps each boundary vertex to the open edges incident
/// to it; an edge is listed under both endpoints. Ordered collections keep
/// every pass deterministic.
pub struct EdgeLoopFinder<'a> {
    pub(crate) meshset: &'a mut MeshSet,
    pub(crate) mesh: MeshKey,
    pub(crate) params: RepairParams,
    pub(crate) open_edges: FxHashSet<EdgeKey>,
    pub(crate) vertex_open_edges: BTreeMap<VertexKey, BTreeSet<EdgeKey>>,
    pub(crate) closed_loops: Vec<EdgeLoop>,
    pub(crate) synthetic_edges: SlotMap<SyntheticEdgeKey, SyntheticEdge>,
    backup: Option<MeshSet>,
    changed: bool,
}

impl<'a> EdgeLoopFinder<'a> {
    /// Starts a session on `mesh` and builds the open-edge index.
    ///
    /// Fails if the mesh key is unknown or the parameters are unusable.
    pub fn new(meshset: &'a mut MeshSet, mesh: MeshKey, params: RepairParams) -> Result<Self> {
        params.validate()?;
        if meshset.mesh(mesh).is_none() {
            return Err(Error::Mesh(meshfix_halfedge::Error::MeshNotFound(mesh)));
        }
        meshset.refresh_edge_sets(mesh)?;

        let mut finder = Self {
            meshset,
            mesh,
            params,
            open_edges: FxHashSet::default(),
            vertex_open_edges: BTreeMap::new(),
            closed_loops: Vec::new(),
            synthetic_edges: SlotMap::with_key(),
            backup: None,
            changed: false,
        };
        finder.rebuild_index();
        Ok(finder)
    }

    /// Runs the global simplifications of a new session: collapses a tiny
    /// boundary to its center (when enabled) and merges near-duplicate
    /// boundary vertices.
    ///
    /// A sub-mesh without open edges is left untouched.
    pub fn init_from_mesh(&mut self) -> InitOutcome {
        let mut outcome = InitOutcome::default();
        if self.open_edges.is_empty() {
            return outcome;
        }

        if self.params.merge_open_edges_to_point {
            outcome.merged_to_point = self.merge_open_edges_to_point();
        }

        outcome.vertices_merged = self.merge_close_vertices();
        outcome.changed = outcome.merged_to_point || outcome.vertices_merged > 0;

        tracing::debug!(
            open_edges = self.open_edges.len(),
            boundary_vertices = self.vertex_open_edges.len(),
            merged_to_point = outcome.merged_to_point,
            vertices_merged = outcome.vertices_merged,
            "Initialized open-edge session"
        );
        outcome
    }

    /// Moves every boundary vertex to the center of the boundary's bounding
    /// box if all half extents are below the merge-to-point tolerance.
    fn merge_open_edges_to_point(&mut self) -> bool {
        let points: Vec<Point3<f64>> = self
            .vertex_open_edges
            .keys()
            .filter_map(|&vk| self.meshset.position(vk))
            .collect();
        let Some(bbox) = Aabb::fit(points) else {
            return false;
        };
        if !bbox.is_smaller_than(self.params.eps_merge_open_edges_to_point) {
            return false;
        }

        let center = bbox.center();
        let vertices: Vec<VertexKey> = self.vertex_open_edges.keys().copied().collect();
        for vk in vertices {
            self.move_vertex(vk, center);
        }
        tracing::debug!(vertices = self.vertex_open_edges.len(), "Collapsed open boundary to a point");
        true
    }

    // --- Index ---

    /// Rebuilds the open-edge set and the vertex index from the sub-mesh's
    /// open-edge list.
    pub(crate) fn rebuild_index(&mut self) {
        self.open_edges.clear();
        self.vertex_open_edges.clear();

        let Some(data) = self.meshset.mesh(self.mesh) else {
            return;
        };
        for &ek in &data.open_edges {
            let Some((v1, v2)) = self.meshset.endpoints(ek) else {
                tracing::warn!(edge = ?ek, "Open edge without endpoints, skipping");
                continue;
            };
            self.open_edges.insert(ek);
            self.vertex_open_edges.entry(v1).or_default().insert(ek);
            self.vertex_open_edges.entry(v2).or_default().insert(ek);
        }
    }

    /// Files an edge again after its endpoints were repointed.
    ///
    /// `old` are the endpoints the edge was indexed under. The edge is
    /// filed under its current endpoints if it is still open.
    pub(crate) fn reindex_edge(&mut self, ek: EdgeKey, old: (VertexKey, VertexKey)) {
        for vk in [old.0, old.1] {
            if let Some(edges) = self.vertex_open_edges.get_mut(&vk) {
                edges.remove(&ek);
                if edges.is_empty() {
                    self.vertex_open_edges.remove(&vk);
                }
            }
        }
        if !self.open_edges.contains(&ek) {
            return;
        }
        let Some((v1, v2)) = self.meshset.endpoints(ek) else {
            tracing::warn!(edge = ?ek, "Open edge without endpoints, skipping");
            return;
        };
        self.vertex_open_edges.entry(v1).or_default().insert(ek);
        self.vertex_open_edges.entry(v2).or_default().insert(ek);
    }

    /// Drops resolved edges from the vertex index and removes vertices left
    /// without open edges.
    pub(crate) fn prune_index(&mut self) {
        let open = &self.open_edges;
        self.vertex_open_edges.retain(|_, edges| {
            edges.retain(|ek| open.contains(ek));
            !edges.is_empty()
        });
    }

    // --- Mutation helpers ---

    /// Snapshots the meshset before its first mutation in this session.
    pub(crate) fn create_backup(&mut self) {
        if self.backup.is_none() {
            self.backup = Some(self.meshset.clone());
        }
        self.changed = true;
    }

    /// Moves a vertex, taking the backup first. Returns `false` if the vertex
    /// does not exist.
    pub(crate) fn move_vertex(&mut self, vk: VertexKey, pos: Point3<f64>) -> bool {
        if self.meshset.vertex(vk).is_none() {
            tracing::warn!(vertex = ?vk, "Indexed vertex missing from meshset");
            return false;
        }
        self.create_backup();
        self.meshset.set_vertex_position(vk, pos).is_ok()
    }

    /// Restores the meshset from the backup and rebuilds the index.
    ///
    /// The backup itself is kept, so later passes still compare against the
    /// state before the session. Traced loops are discarded.
    pub fn rollback(&mut self) -> bool {
        let Some(backup) = &self.backup else {
            return false;
        };
        *self.meshset = backup.clone();
        self.changed = false;
        self.closed_loops.clear();
        self.synthetic_edges.clear();
        self.rebuild_index();
        tracing::debug!("Rolled back open-edge session");
        true
    }

    // --- Accessors ---

    /// The meshset as it is now.
    pub fn meshset(&self) -> &MeshSet {
        &*self.meshset
    }

    pub fn mesh(&self) -> MeshKey {
        self.mesh
    }

    pub fn params(&self) -> &RepairParams {
        &self.params
    }

    /// The snapshot taken before the first mutation, if any.
    pub fn backup(&self) -> Option<&MeshSet> {
        self.backup.as_ref()
    }

    /// Takes ownership of the snapshot, ending rollback support.
    pub fn take_backup(&mut self) -> Option<MeshSet> {
        self.backup.take()
    }

    /// Returns `true` if the live meshset differs from the state at session
    /// start.
    pub fn has_changes(&self) -> bool {
        self.changed
    }

    /// Open edges not yet resolved by this session.
    pub fn open_edge_count(&self) -> usize {
        self.open_edges.len()
    }

    pub fn is_open_edge(&self, ek: EdgeKey) -> bool {
        self.open_edges.contains(&ek)
    }

    /// Vertices currently in the open-edge index.
    pub fn indexed_vertex_count(&self) -> usize {
        self.vertex_open_edges.len()
    }

    /// Open edges indexed under a vertex.
    pub fn open_edges_at(&self, vk: VertexKey) -> Vec<EdgeKey> {
        self.vertex_open_edges
            .get(&vk)
            .map(|edges| edges.iter().copied().collect())
            .unwrap_or_default()
    }
}
