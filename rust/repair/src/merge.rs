// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertex merging passes over the open boundary.

use meshfix_halfedge::geometry::{midpoint, within_per_axis};
use meshfix_halfedge::{EdgeKey, SpatialIndex, VertexKey};

use crate::config::MAX_MERGE_VERTICES;
use crate::finder::EdgeLoopFinder;

impl EdgeLoopFinder<'_> {
    /// Moves every pair of boundary vertices closer than
    /// `sqrt(10) * eps_merge_points` (but not coincident) to their midpoint.
    ///
    /// Pairs are visited in index order of the first vertex and key order of
    /// the second, against current positions, so a vertex merged once can
    /// merge again with a later neighbour. The grid follows every move, so
    /// the result equals a scan over all vertex pairs. Returns the number of
    /// merges. Boundaries with more than [`MAX_MERGE_VERTICES`] vertices are
    /// skipped.
    pub fn merge_close_vertices(&mut self) -> usize {
        let num_vertices = self.vertex_open_edges.len();
        if num_vertices > MAX_MERGE_VERTICES {
            tracing::debug!(
                vertices = num_vertices,
                limit = MAX_MERGE_VERTICES,
                "Too many boundary vertices, skipping vertex merge"
            );
            return 0;
        }

        let eps2 = self.params.eps_merge_points * self.params.eps_merge_points * 10.0;
        let tol = eps2.sqrt();
        let vertices: Vec<VertexKey> = self.vertex_open_edges.keys().copied().collect();
        let mut grid =
            SpatialIndex::from_vertices(&*self.meshset, vertices.iter().copied(), tol * 4.0);

        let mut merged = 0;
        for &v1 in &vertices {
            let mut last = None;
            // candidates are looked up again after every move of v1
            while let Some(v2) = self.next_merge_candidate(&grid, v1, last) {
                last = Some(v2);
                let (Some(p1), Some(p2)) = (self.meshset.position(v1), self.meshset.position(v2))
                else {
                    continue;
                };
                let d2 = (p1 - p2).norm_squared();
                if d2 > 0.0 && d2 < eps2 {
                    let center = midpoint(&p1, &p2);
                    self.move_vertex(v1, center);
                    self.move_vertex(v2, center);
                    grid.relocate(v1, &p1, &center);
                    grid.relocate(v2, &p2, &center);
                    merged += 1;
                }
            }
        }

        if merged > 0 {
            tracing::debug!(merged, "Merged close boundary vertices");
        }
        merged
    }

    /// The first grid neighbour of `v1` at its current position with a key
    /// after `last`.
    fn next_merge_candidate(
        &self,
        grid: &SpatialIndex,
        v1: VertexKey,
        last: Option<VertexKey>,
    ) -> Option<VertexKey> {
        let p1 = self.meshset.position(v1)?;
        grid.candidates(&p1)
            .into_iter()
            .find(|&v2| v2 != v1 && last.map_or(true, |last| v2 > last))
    }

    /// Collapses open edges whose endpoints differ by less than `eps` on
    /// every axis: the end vertex is moved onto the start vertex.
    ///
    /// Returns `true` if any vertex moved. Edges stay open; pairing and
    /// loop tracing see them as zero length afterwards.
    pub fn find_and_eliminate_short_open_edges(&mut self, eps: f64) -> bool {
        let mut changed = false;
        for ek in self.open_edges_in_mesh_order() {
            let Some((v1, v2)) = self.meshset.endpoints(ek) else {
                tracing::warn!(edge = ?ek, "Open edge without endpoints, skipping");
                continue;
            };
            let (Some(p1), Some(p2)) = (self.meshset.position(v1), self.meshset.position(v2)) else {
                continue;
            };
            if p1 != p2 && within_per_axis(&p1, &p2, eps) {
                changed |= self.move_vertex(v2, p1);
            }
        }
        changed
    }

    /// Unresolved open edges in the order of the sub-mesh's open-edge list.
    pub(crate) fn open_edges_in_mesh_order(&self) -> Vec<EdgeKey> {
        self.meshset
            .mesh(self.mesh)
            .map(|data| {
                data.open_edges
                    .iter()
                    .copied()
                    .filter(|ek| self.open_edges.contains(ek))
                    .collect()
            })
            .unwrap_or_default()
    }
}
