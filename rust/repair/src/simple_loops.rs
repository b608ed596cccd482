// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pairing of open edges that run between the same two points.
//!
//! Two open half-edges between (nearly) the same vertices are the two sides
//! of one physical edge that lost its link. The pass finds such pairs,
//! makes their endpoints coincide and links them as reverse partners. The
//! oracle then compares the result with the session backup and the pass is
//! undone if the mesh got worse.

use meshfix_halfedge::geometry::{midpoint, within_per_axis};
use meshfix_halfedge::{EdgeKey, MeshOracle, Point3, VertexKey};
use smallvec::SmallVec;

use crate::finder::EdgeLoopFinder;

/// Squared distance below which paired endpoints are left as they are.
const SNAP_EPS_SQ: f64 = 1e-16;

/// Vertex pairs that matched within tolerance but are not the same vertex.
pub type ApproximateMatches = SmallVec<[(VertexKey, VertexKey); 2]>;

/// What [`EdgeLoopFinder::find_and_eliminate_simple_loops`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimpleLoopOutcome {
    /// Edge pairs linked as reverse partners.
    pub pairs: usize,
    /// Vertices moved to make paired endpoints coincide.
    pub vertices_snapped: usize,
    /// The oracle preferred the backup and the session was rolled back.
    pub rolled_back: bool,
}

impl SimpleLoopOutcome {
    /// Returns `true` if the live meshset was modified and kept.
    pub fn changed(&self) -> bool {
        !self.rolled_back && (self.pairs > 0 || self.vertices_snapped > 0)
    }
}

/// How two matched open edges lie relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    /// Opposite directions: a regular reverse pair.
    Opposite,
    /// Same direction: the second edge has to be respliced first.
    Same,
}

impl EdgeLoopFinder<'_> {
    /// Links pairs of open edges that connect the same two points.
    ///
    /// For every indexed vertex and open edge `e1` at it (skipping edges
    /// shorter than `sqrt(10) * eps_merge_points`), a partner `e2` with the
    /// same endpoints is searched at `eps_merge_points` and then at ten
    /// times that. Endpoints that matched only approximately are merged to
    /// their midpoint. Opposite edges are snapped together and paired.
    /// Edges running the same way get `e2` repointed onto `e1`'s vertices
    /// first, which touches `e2` and its successor only.
    ///
    /// If the session holds a backup afterwards and the oracle scores it
    /// better than the live meshset, the session is rolled back.
    pub fn find_and_eliminate_simple_loops(&mut self, oracle: &dyn MeshOracle) -> SimpleLoopOutcome {
        let mut outcome = SimpleLoopOutcome::default();
        let eps = self.params.eps_merge_points;
        let min_length_sq = eps * eps * 10.0;
        let connect_tol_sq = eps * self.params.eps_merge_open_edges_to_point * 10.0;

        let starts: Vec<VertexKey> = self.vertex_open_edges.keys().copied().collect();
        for start in starts {
            for e1 in self.open_edges_at(start) {
                if !self.open_edges.contains(&e1) {
                    continue;
                }
                if self
                    .meshset
                    .edge_length_squared(e1)
                    .map_or(true, |len| len < min_length_sq)
                {
                    continue;
                }
                let Some((a1, a2)) = self.meshset.endpoints(e1) else {
                    continue;
                };
                let end = if a1 == start {
                    a2
                } else if a2 == start {
                    a1
                } else {
                    tracing::warn!(
                        edge = ?e1,
                        vertex = ?start,
                        "Open edge indexed under a vertex it does not touch, skipping"
                    );
                    continue;
                };

                let mut approximate = ApproximateMatches::new();
                let mut found =
                    self.find_edge_by_start_and_end_point(start, end, e1, eps, &mut approximate);
                if found.is_none() {
                    found = self.find_edge_by_start_and_end_point(
                        start,
                        end,
                        e1,
                        eps * 10.0,
                        &mut approximate,
                    );
                }
                let Some(e2) = found else {
                    continue;
                };

                for (va, vb) in approximate {
                    if self.merge_pair(va, vb) {
                        outcome.vertices_snapped += 1;
                    }
                }

                match self.orientation(e1, e2, connect_tol_sq) {
                    Some(Orientation::Opposite) => {
                        outcome.vertices_snapped += self.snap_opposite(e1, e2);
                    }
                    Some(Orientation::Same) => {
                        if !self.resplice(e1, e2) {
                            continue;
                        }
                    }
                    None => continue,
                }

                self.create_backup();
                if let Err(error) = self.meshset.pair(e1, e2) {
                    tracing::warn!(%error, "Could not pair open edges");
                    continue;
                }
                self.open_edges.remove(&e1);
                self.open_edges.remove(&e2);
                outcome.pairs += 1;
            }
        }

        self.prune_index();
        if let Err(error) = self.meshset.refresh_edge_sets(self.mesh) {
            tracing::warn!(%error, "Could not refresh open edge list");
        }

        let backup_is_better = self.backup().is_some_and(|backup| {
            let backup_info = oracle.score(backup);
            let live_info = oracle.score(self.meshset());
            oracle.is_better_for_bool_op(&backup_info, &live_info)
        });
        if backup_is_better {
            self.rollback();
            outcome.rolled_back = true;
        }

        tracing::debug!(
            pairs = outcome.pairs,
            vertices_snapped = outcome.vertices_snapped,
            rolled_back = outcome.rolled_back,
            "Simple loop pass finished"
        );
        outcome
    }

    /// Finds an open edge other than `exclude` that runs between the points
    /// of `start` and `end` in either direction, within `eps` per axis.
    ///
    /// Edges starting near `start` are tried first, then edges starting near
    /// `end`. Endpoints of the match that are close to but not identical with
    /// `start`/`end` are appended to `approximate`.
    pub fn find_edge_by_start_and_end_point(
        &self,
        start: VertexKey,
        end: VertexKey,
        exclude: EdgeKey,
        eps: f64,
        approximate: &mut ApproximateMatches,
    ) -> Option<EdgeKey> {
        let p_start = self.meshset.position(start)?;
        let p_end = self.meshset.position(end)?;

        for (from, to) in [(start, end), (end, start)] {
            let (p_from, p_to) = if from == start { (p_start, p_end) } else { (p_end, p_start) };
            for edge in self.edges_by_start_point(&p_from, exclude, eps) {
                let Some((v1, v2)) = self.meshset.endpoints(edge) else {
                    continue;
                };
                let Some(p2) = self.meshset.position(v2) else {
                    continue;
                };
                if within_per_axis(&p2, &p_to, eps) {
                    if v1 != from {
                        approximate.push((v1, from));
                    }
                    if v2 != to {
                        approximate.push((v2, to));
                    }
                    return Some(edge);
                }
            }
        }
        None
    }

    /// Open edges whose start vertex lies within `eps` of `p` on every axis.
    fn edges_by_start_point(&self, p: &Point3<f64>, exclude: EdgeKey, eps: f64) -> Vec<EdgeKey> {
        let mut result = Vec::new();
        for (&vk, edges) in &self.vertex_open_edges {
            let Some(pos) = self.meshset.position(vk) else {
                continue;
            };
            if !within_per_axis(&pos, p, eps) {
                continue;
            }
            result.extend(edges.iter().copied().filter(|&ek| {
                ek != exclude && self.open_edges.contains(&ek) && self.meshset.v1(ek) == Some(vk)
            }));
        }
        result
    }

    fn orientation(&self, e1: EdgeKey, e2: EdgeKey, tol_sq: f64) -> Option<Orientation> {
        let (a1, a2) = self.meshset.endpoints(e1)?;
        let (b1, b2) = self.meshset.endpoints(e2)?;
        let close = |x: VertexKey, y: VertexKey| -> Option<bool> {
            Some((self.meshset.position(x)? - self.meshset.position(y)?).norm_squared() < tol_sq)
        };

        if close(a1, b2)? && close(a2, b1)? {
            Some(Orientation::Opposite)
        } else if close(a1, b1)? && close(a2, b2)? {
            Some(Orientation::Same)
        } else {
            None
        }
    }

    /// Moves the endpoints of `e1` onto the matching endpoints of `e2` where
    /// they still differ. Returns the number of vertices moved.
    fn snap_opposite(&mut self, e1: EdgeKey, e2: EdgeKey) -> usize {
        let (Some((a1, a2)), Some((b1, b2))) = (self.meshset.endpoints(e1), self.meshset.endpoints(e2))
        else {
            return 0;
        };
        let mut moved = 0;
        for (from, onto) in [(a2, b1), (a1, b2)] {
            let (Some(p), Some(q)) = (self.meshset.position(from), self.meshset.position(onto)) else {
                continue;
            };
            if (p - q).norm_squared() > SNAP_EPS_SQ && self.move_vertex(from, q) {
                moved += 1;
            }
        }
        moved
    }

    /// Repoints `e2` to run from `e1`'s start to `e1`'s end. Only `e2` and
    /// the start of its successor change; the predecessor's end follows
    /// `e2`'s new start. All three are filed again in the vertex index.
    fn resplice(&mut self, e1: EdgeKey, e2: EdgeKey) -> bool {
        let Some((a1, a2)) = self.meshset.endpoints(e1) else {
            return false;
        };
        let Some(data) = self.meshset.edge(e2) else {
            return false;
        };
        let touched: SmallVec<[(EdgeKey, (VertexKey, VertexKey)); 3]> =
            [Some(e2), data.next, data.prev]
                .into_iter()
                .flatten()
                .filter_map(|ek| Some((ek, self.meshset.endpoints(ek)?)))
                .collect();

        self.create_backup();
        let result = self
            .meshset
            .set_end_vertex(e2, a2)
            .and_then(|()| self.meshset.set_start_vertex(e2, a1));
        for &(ek, old) in &touched {
            self.reindex_edge(ek, old);
        }
        if let Err(error) = result {
            tracing::warn!(%error, "Could not resplice open edge");
            return false;
        }
        true
    }

    /// Moves two vertices to their midpoint. Returns `false` if they already
    /// coincide.
    fn merge_pair(&mut self, va: VertexKey, vb: VertexKey) -> bool {
        let (Some(pa), Some(pb)) = (self.meshset.position(va), self.meshset.position(vb)) else {
            return false;
        };
        if pa == pb {
            return false;
        }
        let center = midpoint(&pa, &pb);
        self.move_vertex(va, center) && self.move_vertex(vb, center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepairParams;
    use crate::loops::LoopSearchOutcome;
    use meshfix_halfedge::{BoolOpOracle, MeshInfo, MeshKey, MeshSet};

    fn params() -> RepairParams {
        RepairParams::default().merge_open_edges_to_point(false)
    }

    /// Never prefers the backup, so every change is kept.
    struct KeepEverything;

    impl MeshOracle for KeepEverything {
        fn score(&self, _: &MeshSet) -> MeshInfo {
            MeshInfo::default()
        }
        fn is_better_for_bool_op(&self, _: &MeshInfo, _: &MeshInfo) -> bool {
            false
        }
    }

    /// Every indexed edge is open and touches its vertex, and every open
    /// edge is filed under both endpoints.
    fn assert_index_consistent(finder: &EdgeLoopFinder<'_>) {
        for (&vk, edges) in &finder.vertex_open_edges {
            for &ek in edges {
                let (v1, v2) = finder.meshset().endpoints(ek).unwrap();
                assert!(v1 == vk || v2 == vk, "{ek:?} filed under {vk:?}");
            }
        }
        for &ek in &finder.open_edges {
            let (v1, v2) = finder.meshset().endpoints(ek).unwrap();
            for vk in [v1, v2] {
                assert!(finder.vertex_open_edges.get(&vk).is_some_and(|edges| edges.contains(&ek)));
            }
        }
    }

    /// Two loose edges between `(0,0,0)` and `(1,0,0)`; the second one's end
    /// is a separate vertex shifted by `offset` along y.
    fn opposite_pair(offset: f64) -> (MeshSet, MeshKey, EdgeKey, EdgeKey) {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let v1 = meshset.add_vertex(0.0, 0.0, 0.0);
        let v2 = meshset.add_vertex(1.0, 0.0, 0.0);
        let e1 = meshset.add_loose_edge(mesh, v1, v2).unwrap();
        let e2 = if offset == 0.0 {
            meshset.add_loose_edge(mesh, v2, v1).unwrap()
        } else {
            let v1b = meshset.add_vertex(0.0, offset, 0.0);
            meshset.add_loose_edge(mesh, v2, v1b).unwrap()
        };
        (meshset, mesh, e1, e2)
    }

    #[test]
    fn exact_reverse_edges_pair_without_moving() {
        let (mut meshset, mesh, e1, e2) = opposite_pair(0.0);
        let before = meshset.clone();
        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();

        let outcome = finder.find_and_eliminate_simple_loops(&BoolOpOracle::default());

        assert_eq!(outcome.pairs, 1);
        assert_eq!(outcome.vertices_snapped, 0);
        assert!(outcome.changed());
        assert_eq!(finder.open_edge_count(), 0);
        drop(finder);
        assert_eq!(meshset.edge(e1).unwrap().rev, Some(e2));
        assert_eq!(meshset.edge(e2).unwrap().rev, Some(e1));
        for (vk, v) in before.vertices() {
            assert_eq!(meshset.position(vk), Some(v.pos));
        }
    }

    #[test]
    fn near_vertices_merge_before_pairing() {
        let (mut meshset, mesh, e1, e2) = opposite_pair(5e-9);
        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();

        let outcome = finder.find_and_eliminate_simple_loops(&BoolOpOracle::default());

        assert_eq!(outcome.pairs, 1);
        assert_eq!(outcome.vertices_snapped, 1);
        drop(finder);
        let (a1, _) = meshset.endpoints(e1).unwrap();
        let (_, b2) = meshset.endpoints(e2).unwrap();
        assert_eq!(meshset.position(a1), meshset.position(b2));
        assert_eq!(meshset.position(a1), Some(Point3::new(0.0, 2.5e-9, 0.0)));
    }

    #[test]
    fn wider_tolerance_is_tried_second() {
        let (mut meshset, mesh, e1, e2) = opposite_pair(5e-8);
        let finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();
        let (start, end) = finder.meshset().endpoints(e1).unwrap();

        let mut approximate = ApproximateMatches::new();
        assert_eq!(finder.find_edge_by_start_and_end_point(start, end, e1, 1e-8, &mut approximate), None);
        assert!(approximate.is_empty());
        assert_eq!(
            finder.find_edge_by_start_and_end_point(start, end, e1, 1e-7, &mut approximate),
            Some(e2)
        );
        assert_eq!(approximate.len(), 1);
        assert_eq!(approximate[0].1, start);
    }

    #[test]
    fn same_direction_edges_are_respliced() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let v1 = meshset.add_vertex(0.0, 0.0, 0.0);
        let v2 = meshset.add_vertex(1.0, 0.0, 0.0);
        let w1 = meshset.add_vertex(0.0, 0.0, 1e-9);
        let w2 = meshset.add_vertex(1.0, 0.0, 1e-9);
        let e1 = meshset.add_loose_edge(mesh, v1, v2).unwrap();
        let e2 = meshset.add_loose_edge(mesh, w1, w2).unwrap();

        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();
        let outcome = finder.find_and_eliminate_simple_loops(&KeepEverything);
        assert_eq!(outcome.pairs, 1);
        drop(finder);

        assert_eq!(meshset.endpoints(e2), Some((v1, v2)));
        assert_eq!(meshset.edge(e1).unwrap().rev, Some(e2));
    }

    #[test]
    fn respliced_face_edge_repoints_only_its_successor() {
        // Two triangles sharing the direction p -> q, the second one's
        // corners 1e-9 off the first one's.
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let p = meshset.add_vertex(0.0, 0.0, 0.0);
        let q = meshset.add_vertex(1.0, 0.0, 0.0);
        let r = meshset.add_vertex(0.0, 1.0, 0.0);
        let p2 = meshset.add_vertex(0.0, 0.0, 1e-9);
        let q2 = meshset.add_vertex(1.0, 0.0, 1e-9);
        let s = meshset.add_vertex(0.0, -1.0, 0.0);
        let first = meshset.add_face(mesh, &[p, q, r]).unwrap();
        let second = meshset.add_face(mesh, &[p2, q2, s]).unwrap();
        let e1 = meshset.face(first).unwrap().edge;
        let e2 = meshset.face(second).unwrap().edge;
        let e2_next = meshset.edge(e2).unwrap().next.unwrap();
        let e2_prev = meshset.edge(e2).unwrap().prev.unwrap();
        let before = meshset.clone();

        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();
        let outcome = finder.find_and_eliminate_simple_loops(&KeepEverything);

        assert_eq!(outcome.pairs, 1);
        assert!(!outcome.rolled_back);
        assert_eq!(finder.open_edge_count(), 4);
        assert_index_consistent(&finder);

        let ms = finder.meshset();
        assert_eq!(ms.endpoints(e2), Some((p, q)));
        assert_eq!(ms.v1(e2_next), Some(q));
        let old_prev = before.edge(e2_prev).unwrap();
        let new_prev = ms.edge(e2_prev).unwrap();
        assert_eq!(new_prev.vert, old_prev.vert);
        assert_eq!((new_prev.next, new_prev.prev), (old_prev.next, old_prev.prev));
        for ek in before.face_edges(first).unwrap() {
            assert_eq!(ms.edge(ek).unwrap().vert, before.edge(ek).unwrap().vert);
        }
        assert_eq!(ms.edge(e1).unwrap().rev, Some(e2));

        // The rest of the boundary is a single quadrilateral p, r, q, s.
        let loops = finder.find_loops();
        assert_eq!(
            loops,
            LoopSearchOutcome::Completed { loops_found: 1, unresolved_edges: 0, search_steps: 4 }
        );
        assert_eq!(finder.closed_loops()[0].len(), 4);
    }

    #[test]
    fn unrelated_edges_stay_open() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let a = meshset.add_vertex(0.0, 0.0, 0.0);
        let b = meshset.add_vertex(1.0, 0.0, 0.0);
        let c = meshset.add_vertex(0.0, 1.0, 0.0);
        meshset.add_face(mesh, &[a, b, c]).unwrap();

        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();
        let outcome = finder.find_and_eliminate_simple_loops(&BoolOpOracle::default());

        assert_eq!(outcome, SimpleLoopOutcome::default());
        assert_eq!(finder.open_edge_count(), 3);
        assert!(finder.backup().is_none());
    }
}
