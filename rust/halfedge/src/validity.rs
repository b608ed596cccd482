// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh validity scoring for boolean-operation input.
//!
//! A boolean operation needs closed, manifold input. [`MeshInfo`] summarises
//! how far a meshset is from that, and a [`MeshOracle`] decides which of two
//! variants of a meshset is the better input. Repair code treats the oracle
//! as a black box and only ever asks it to compare a candidate against a
//! baseline.

use crate::geometry::within_per_axis;
use crate::keys::EdgeKey;
use crate::meshset::MeshSet;

/// Summary of a meshset's structural quality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshInfo {
    pub num_faces: usize,
    pub num_open_edges: usize,
    pub num_closed_edges: usize,
    /// Half-edges shorter than the merge tolerance.
    pub num_degenerate_edges: usize,
    /// Faces with fewer than three edges or with (near) zero area.
    pub num_degenerate_faces: usize,
    pub max_edges_per_face: usize,
    pub surface_area: f64,
    /// `rev`, `next`, `prev` and `face` links are mutually consistent.
    pub all_pointers_valid: bool,
    /// Closed, consistent and free of degenerate edges.
    pub valid: bool,
}

impl MeshInfo {
    /// Returns `true` if no half-edge is open.
    pub fn is_closed(&self) -> bool {
        self.num_open_edges == 0
    }
}

/// Scores meshsets and compares them as boolean-operation input.
pub trait MeshOracle {
    /// Scores a meshset.
    fn score(&self, meshset: &MeshSet) -> MeshInfo;

    /// Returns `true` if `candidate` is better input for a boolean operation
    /// than `baseline`.
    fn is_better_for_bool_op(&self, candidate: &MeshInfo, baseline: &MeshInfo) -> bool;
}

/// Default oracle: counts open edges, degenerate entities and link
/// consistency.
#[derive(Debug, Clone)]
pub struct BoolOpOracle {
    pub eps_merge_points: f64,
    pub min_face_area: f64,
    pub allow_degenerate_edges: bool,
    /// Prefer triangulated candidates over polygonal baselines.
    pub consider_triangulation: bool,
}

impl Default for BoolOpOracle {
    fn default() -> Self {
        Self {
            eps_merge_points: 1e-8,
            min_face_area: 1e-12,
            allow_degenerate_edges: false,
            consider_triangulation: false,
        }
    }
}

impl BoolOpOracle {
    fn edge_links_valid(&self, meshset: &MeshSet, ek: EdgeKey) -> bool {
        let Some(edge) = meshset.edge(ek) else {
            return false;
        };
        if meshset.v2(ek).is_none() {
            return false;
        }

        if let Some(face) = edge.face {
            if meshset.face(face).is_none() {
                return false;
            }
            let next_ok = edge
                .next
                .and_then(|n| meshset.edge(n))
                .is_some_and(|n| n.prev == Some(ek) && n.face == Some(face));
            if !next_ok {
                return false;
            }
        }

        if let Some(rev) = edge.rev {
            let Some(rev_data) = meshset.edge(rev) else {
                return false;
            };
            if rev_data.rev != Some(ek) {
                return false;
            }
            // reversed endpoints must coincide, identity is not required
            let (Some((a1, a2)), Some((b1, b2))) = (meshset.endpoints(ek), meshset.endpoints(rev))
            else {
                return false;
            };
            let tol = self.eps_merge_points * 10.0;
            let coincide = |x, y| match (meshset.position(x), meshset.position(y)) {
                (Some(p), Some(q)) => within_per_axis(&p, &q, tol),
                _ => false,
            };
            if !(coincide(a1, b2) && coincide(a2, b1)) {
                return false;
            }
        }

        true
    }
}

impl MeshOracle for BoolOpOracle {
    fn score(&self, meshset: &MeshSet) -> MeshInfo {
        let mut info = MeshInfo {
            all_pointers_valid: true,
            ..MeshInfo::default()
        };

        let eps_sq = self.eps_merge_points * self.eps_merge_points;
        for mesh in meshset.mesh_keys() {
            let Ok(edges) = meshset.mesh_edges(mesh) else {
                info.all_pointers_valid = false;
                continue;
            };
            for ek in edges {
                if !self.edge_links_valid(meshset, ek) {
                    info.all_pointers_valid = false;
                }
                if meshset.is_open(ek) {
                    info.num_open_edges += 1;
                } else {
                    info.num_closed_edges += 1;
                }
                if meshset.edge_length_squared(ek).is_some_and(|l| l < eps_sq) {
                    info.num_degenerate_edges += 1;
                }
            }

            let Some(data) = meshset.mesh(mesh) else {
                continue;
            };
            info.num_faces += data.faces.len();
            for &fk in &data.faces {
                let Some(face) = meshset.face(fk) else {
                    info.all_pointers_valid = false;
                    continue;
                };
                info.max_edges_per_face = info.max_edges_per_face.max(face.n_edges);
                let area = meshset.face_area(fk).unwrap_or(0.0);
                if face.n_edges < 3 || area < self.min_face_area {
                    info.num_degenerate_faces += 1;
                }
                info.surface_area += area;
            }
        }

        info.valid = info.all_pointers_valid
            && info.num_faces > 0
            && info.is_closed()
            && (self.allow_degenerate_edges || info.num_degenerate_edges == 0);
        info
    }

    fn is_better_for_bool_op(&self, candidate: &MeshInfo, baseline: &MeshInfo) -> bool {
        if candidate.num_open_edges > baseline.num_open_edges {
            return false;
        }
        if !candidate.valid && baseline.valid {
            return false;
        }

        let all_edges = candidate.num_open_edges + candidate.num_closed_edges;
        let fewer_open_edges = candidate.num_open_edges < baseline.num_open_edges && all_edges > 0;

        if candidate.valid {
            if fewer_open_edges {
                return true;
            }
            if candidate.num_faces < baseline.num_faces && candidate.num_faces > 0 {
                return true;
            }
            if self.consider_triangulation
                && candidate.max_edges_per_face == 3
                && baseline.max_edges_per_face > 3
                && candidate.num_degenerate_edges <= baseline.num_degenerate_edges
            {
                return true;
            }
            if candidate.num_degenerate_edges < baseline.num_degenerate_edges {
                return true;
            }
            return false;
        }

        // both invalid
        fewer_open_edges && (candidate.all_pointers_valid || !baseline.all_pointers_valid)
    }
}
