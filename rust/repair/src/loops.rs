// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed-loop tracing over the remaining open edges.
//!
//! A depth-first search walks open edges from a start vertex, in either
//! direction, until it arrives back at the start. Each loop found is stored
//! in traversal order. An edge walked against its direction is represented
//! by its reverse; open edges have none, so the session creates a
//! [`SyntheticEdge`] for it. Synthetic edges are owned by the session and
//! never enter the meshset unless a loop is closed with a face.

use meshfix_halfedge::{EdgeKey, MeshOracle, VertexKey};
use rustc_hash::FxHashSet;
use slotmap::new_key_type;

use crate::config::{PathScoping, MAX_LOOP_SEARCH_VERTICES};
use crate::finder::EdgeLoopFinder;

new_key_type! {
    /// Key of a half-edge created by loop tracing.
    pub struct SyntheticEdgeKey;
}

/// A half-edge that exists only in a traced loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticEdge {
    pub start: VertexKey,
    pub end: VertexKey,
}

/// One half-edge of a traced loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopEdge {
    Mesh(EdgeKey),
    Synthetic(SyntheticEdgeKey),
}

/// A closed loop of half-edges in traversal order.
pub type EdgeLoop = Vec<LoopEdge>;

/// Result of [`EdgeLoopFinder::find_loops`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSearchOutcome {
    /// The boundary has more than [`MAX_LOOP_SEARCH_VERTICES`] vertices and
    /// was left alone.
    Skipped { vertices: usize },
    Completed {
        loops_found: usize,
        /// Open edges that are in no loop.
        unresolved_edges: usize,
        /// Edges examined over all start vertices.
        search_steps: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct LoopElement {
    edge: EdgeKey,
    /// The loop runs along the edge's own direction.
    same_sense: bool,
}

/// State of the search from one start vertex.
struct LoopSearch {
    start: VertexKey,
    scoping: PathScoping,
    path: FxHashSet<EdgeKey>,
    /// Built from the closing edge backwards.
    elements: Vec<LoopElement>,
    /// Edges on the way from `start` to the current vertex.
    depth: usize,
    steps: usize,
    budget: usize,
}

impl LoopSearch {
    fn new(start: VertexKey, scoping: PathScoping, budget: usize) -> Self {
        Self {
            start,
            scoping,
            path: FxHashSet::default(),
            elements: Vec::new(),
            depth: 0,
            steps: 0,
            budget,
        }
    }

    fn exhausted(&self) -> bool {
        self.steps >= self.budget
    }
}

impl EdgeLoopFinder<'_> {
    fn find_next_edge(
        &self,
        search: &mut LoopSearch,
        current_vertex: VertexKey,
        current_edge: Option<EdgeKey>,
    ) -> bool {
        let Some(edges) = self.vertex_open_edges.get(&current_vertex) else {
            return false;
        };

        for &check in edges {
            if search.exhausted() {
                return false;
            }
            if Some(check) == current_edge
                || !self.open_edges.contains(&check)
                || search.path.contains(&check)
            {
                continue;
            }
            search.steps += 1;

            let Some((v1, v2)) = self.meshset.endpoints(check) else {
                tracing::warn!(edge = ?check, "Open edge without endpoints, skipping");
                continue;
            };
            let (opposite, same_sense) = if v1 == current_vertex {
                (v2, true)
            } else if v2 == current_vertex {
                (v1, false)
            } else {
                tracing::warn!(
                    edge = ?check,
                    vertex = ?current_vertex,
                    "Open edge indexed under a vertex it does not touch, skipping"
                );
                continue;
            };

            if opposite == search.start {
                // a loop needs at least three edges
                if search.depth < 2 {
                    continue;
                }
                search.elements.push(LoopElement { edge: check, same_sense });
                return true;
            }

            if !self.vertex_open_edges.contains_key(&opposite) {
                continue;
            }

            search.path.insert(check);
            search.depth += 1;
            let found = self.find_next_edge(search, opposite, Some(check));
            search.depth -= 1;
            if found {
                search.elements.push(LoopElement { edge: check, same_sense });
                return true;
            }
            if search.scoping == PathScoping::PerBranch {
                search.path.remove(&check);
            }
        }
        false
    }

    /// Traces closed loops of open edges, starting from each indexed vertex
    /// in turn.
    ///
    /// Only cycles of three or more edges count; two edges between the same
    /// vertices are left to the simple loop pass. A start vertex leaves the
    /// index after its search whether or not a loop was found. A loop's edges leave the open-edge set and the start
    /// vertex of every loop edge leaves the index. Boundaries with more than
    /// [`MAX_LOOP_SEARCH_VERTICES`] vertices are skipped untouched.
    pub fn find_loops(&mut self) -> LoopSearchOutcome {
        let num_vertices = self.vertex_open_edges.len();
        if num_vertices > MAX_LOOP_SEARCH_VERTICES {
            tracing::debug!(
                vertices = num_vertices,
                limit = MAX_LOOP_SEARCH_VERTICES,
                "Too many boundary vertices, skipping loop search"
            );
            return LoopSearchOutcome::Skipped { vertices: num_vertices };
        }

        let mut loops_found = 0;
        let mut search_steps = 0;
        for _ in 0..num_vertices {
            let Some(&start) = self.vertex_open_edges.keys().next() else {
                break;
            };

            let mut search = LoopSearch::new(
                start,
                self.params.path_scoping,
                self.params.max_loop_search_steps,
            );
            let found = self.find_next_edge(&mut search, start, None);
            search_steps += search.steps;
            if search.exhausted() {
                tracing::debug!(vertex = ?start, steps = search.steps, "Loop search budget exhausted");
            }

            self.vertex_open_edges.remove(&start);
            if found {
                search.elements.reverse();
                let edge_loop = self.materialize_loop(&search.elements);
                tracing::trace!(vertex = ?start, edges = edge_loop.len(), "Traced closed loop");
                self.closed_loops.push(edge_loop);
                loops_found += 1;
            }
        }

        tracing::debug!(
            loops_found,
            unresolved_edges = self.open_edges.len(),
            search_steps,
            "Loop search finished"
        );
        LoopSearchOutcome::Completed {
            loops_found,
            unresolved_edges: self.open_edges.len(),
            search_steps,
        }
    }

    fn materialize_loop(&mut self, elements: &[LoopElement]) -> EdgeLoop {
        let mut edge_loop = Vec::with_capacity(elements.len());
        for element in elements {
            let Some((v1, v2)) = self.meshset.endpoints(element.edge) else {
                continue;
            };
            let rev = self.meshset.edge(element.edge).and_then(|e| e.rev);
            let (loop_edge, start) = match (element.same_sense, rev) {
                (true, _) => (LoopEdge::Mesh(element.edge), v1),
                (false, Some(rev)) => (LoopEdge::Mesh(rev), v2),
                (false, None) => {
                    let key = self.synthetic_edges.insert(SyntheticEdge { start: v2, end: v1 });
                    (LoopEdge::Synthetic(key), v2)
                }
            };
            self.vertex_open_edges.remove(&start);
            self.open_edges.remove(&element.edge);
            edge_loop.push(loop_edge);
        }
        self.prune_index();
        edge_loop
    }

    /// Loops traced so far and not yet committed.
    pub fn closed_loops(&self) -> &[EdgeLoop] {
        &self.closed_loops
    }

    pub fn synthetic_edge(&self, key: SyntheticEdgeKey) -> Option<&SyntheticEdge> {
        self.synthetic_edges.get(key)
    }

    /// Start vertices of a loop's half-edges, in loop order.
    pub fn loop_vertices(&self, edge_loop: &[LoopEdge]) -> Vec<VertexKey> {
        edge_loop
            .iter()
            .filter_map(|edge| match *edge {
                LoopEdge::Mesh(ek) => self.meshset.v1(ek),
                LoopEdge::Synthetic(sk) => self.synthetic_edges.get(sk).map(|s| s.start),
            })
            .collect()
    }

    /// Closes every traced loop with a new face on a copy of the meshset and
    /// keeps the copy if the oracle prefers it.
    ///
    /// A face runs against the open edges it closes: loops traced along
    /// existing open edges are reversed, loops made mostly of synthetic
    /// edges are used as traced. Returns the number of faces added, 0 if the
    /// patched mesh was discarded.
    pub fn close_loops_with_faces(&mut self, oracle: &dyn MeshOracle) -> usize {
        if self.closed_loops.is_empty() {
            return 0;
        }

        let mut candidate = self.meshset.clone();
        let mut added = 0;
        for edge_loop in &self.closed_loops {
            let mut vertices = self.loop_vertices(edge_loop);
            if vertices.len() < 3 {
                tracing::debug!(edges = vertices.len(), "Loop too short for a face, skipping");
                continue;
            }
            let mesh_edges = edge_loop
                .iter()
                .filter(|e| matches!(e, LoopEdge::Mesh(_)))
                .count();
            if mesh_edges * 2 >= edge_loop.len() {
                vertices.reverse();
            }
            match candidate.add_face(self.mesh, &vertices) {
                Ok(_) => added += 1,
                Err(error) => tracing::warn!(%error, "Could not close loop with a face"),
            }
        }
        if added == 0 {
            return 0;
        }
        if let Err(error) = candidate.link_reverse_edges(self.mesh) {
            tracing::warn!(%error, "Could not link patch faces");
            return 0;
        }

        let candidate_info = oracle.score(&candidate);
        let baseline_info = oracle.score(self.meshset);
        if !oracle.is_better_for_bool_op(&candidate_info, &baseline_info) {
            tracing::debug!(
                faces = added,
                open_edges = candidate_info.num_open_edges,
                "Patched mesh is not better, discarding"
            );
            return 0;
        }

        self.create_backup();
        *self.meshset = candidate;
        self.closed_loops.clear();
        self.synthetic_edges.clear();
        self.rebuild_index();
        tracing::debug!(faces = added, "Closed open loops with faces");
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepairParams;
    use meshfix_halfedge::{BoolOpOracle, MeshKey, MeshSet};

    fn params() -> RepairParams {
        RepairParams::default().merge_open_edges_to_point(false)
    }

    /// Open polygon boundary made of loose edges `0 -> 1 -> ... -> 0`.
    fn polygon(n: usize) -> (MeshSet, MeshKey, Vec<VertexKey>, Vec<EdgeKey>) {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let verts: Vec<VertexKey> = (0..n)
            .map(|i| {
                let angle = i as f64 / n as f64 * std::f64::consts::TAU;
                meshset.add_vertex(angle.cos(), angle.sin(), 0.0)
            })
            .collect();
        let edges = (0..n)
            .map(|i| meshset.add_loose_edge(mesh, verts[i], verts[(i + 1) % n]).unwrap())
            .collect();
        (meshset, mesh, verts, edges)
    }

    #[test]
    fn pentagon_is_one_loop() {
        let (mut meshset, mesh, verts, edges) = polygon(5);
        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();

        let outcome = finder.find_loops();

        assert!(matches!(
            outcome,
            LoopSearchOutcome::Completed { loops_found: 1, unresolved_edges: 0, .. }
        ));
        let expected: Vec<LoopEdge> = edges.iter().map(|&e| LoopEdge::Mesh(e)).collect();
        assert_eq!(finder.closed_loops(), &[expected]);
        assert_eq!(finder.loop_vertices(&finder.closed_loops()[0]), verts);
        assert_eq!(finder.indexed_vertex_count(), 0);
    }

    #[test]
    fn reversed_edges_become_synthetic() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let a = meshset.add_vertex(0.0, 0.0, 0.0);
        let b = meshset.add_vertex(1.0, 0.0, 0.0);
        let c = meshset.add_vertex(0.0, 1.0, 0.0);
        // a -> b is walked forward, then b <- c and c <- a against their direction
        let ab = meshset.add_loose_edge(mesh, a, b).unwrap();
        meshset.add_loose_edge(mesh, c, b).unwrap();
        meshset.add_loose_edge(mesh, a, c).unwrap();

        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();
        finder.find_loops();

        let edge_loop = finder.closed_loops()[0].clone();
        assert_eq!(edge_loop.len(), 3);
        assert_eq!(edge_loop[0], LoopEdge::Mesh(ab));
        let LoopEdge::Synthetic(sk) = edge_loop[1] else {
            panic!("expected a synthetic edge");
        };
        assert_eq!(finder.synthetic_edge(sk), Some(&SyntheticEdge { start: b, end: c }));
        assert_eq!(finder.loop_vertices(&edge_loop), vec![a, b, c]);
    }

    #[test]
    fn dead_end_spur_is_not_part_of_loop() {
        let (mut meshset, mesh, verts, _) = polygon(4);
        let spur_end = meshset.add_vertex(5.0, 5.0, 0.0);
        let spur = meshset.add_loose_edge(mesh, verts[1], spur_end).unwrap();

        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();
        let outcome = finder.find_loops();

        assert!(matches!(
            outcome,
            LoopSearchOutcome::Completed { loops_found: 1, unresolved_edges: 1, .. }
        ));
        assert_eq!(finder.closed_loops()[0].len(), 4);
        assert!(finder.is_open_edge(spur));
    }

    /// Triangle `v1 v2 v3` plus a spur `v2 -> v0`; the search from `v0`
    /// fails after exploring the triangle.
    fn triangle_with_spur() -> (MeshSet, MeshKey, [VertexKey; 4], [EdgeKey; 4]) {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let v0 = meshset.add_vertex(-1.0, 0.0, 0.0);
        let v1 = meshset.add_vertex(1.0, 0.0, 0.0);
        let v2 = meshset.add_vertex(0.0, 0.0, 0.0);
        let v3 = meshset.add_vertex(0.5, 1.0, 0.0);
        let e0 = meshset.add_loose_edge(mesh, v2, v1).unwrap();
        let e1 = meshset.add_loose_edge(mesh, v2, v0).unwrap();
        let e2 = meshset.add_loose_edge(mesh, v3, v1).unwrap();
        let e3 = meshset.add_loose_edge(mesh, v3, v2).unwrap();
        (meshset, mesh, [v0, v1, v2, v3], [e0, e1, e2, e3])
    }

    #[test]
    fn path_scoping_changes_cost_not_loops() {
        let mut results = Vec::new();
        for scoping in [PathScoping::PerBranch, PathScoping::Lossy] {
            let (mut meshset, mesh, [_, v1, v2, v3], [e0, e1, e2, e3]) = triangle_with_spur();
            let mut finder =
                EdgeLoopFinder::new(&mut meshset, mesh, params().path_scoping(scoping)).unwrap();

            let outcome = finder.find_loops();

            assert_eq!(finder.closed_loops().len(), 1);
            let edge_loop = finder.closed_loops()[0].clone();
            assert_eq!(finder.loop_vertices(&edge_loop), vec![v1, v2, v3]);
            assert_eq!(edge_loop[2], LoopEdge::Mesh(e2));
            assert!(finder.is_open_edge(e1));
            assert!(!finder.is_open_edge(e0) && !finder.is_open_edge(e3));
            results.push(outcome);
        }

        assert_eq!(
            results,
            vec![
                LoopSearchOutcome::Completed { loops_found: 1, unresolved_edges: 1, search_steps: 11 },
                LoopSearchOutcome::Completed { loops_found: 1, unresolved_edges: 1, search_steps: 8 },
            ]
        );
    }

    #[test]
    fn two_edge_cycle_is_not_a_loop() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let a = meshset.add_vertex(0.0, 0.0, 0.0);
        let b = meshset.add_vertex(1.0, 0.0, 0.0);
        let c = meshset.add_vertex(0.0, 1.0, 0.0);
        let ab = meshset.add_loose_edge(mesh, a, b).unwrap();
        let ba = meshset.add_loose_edge(mesh, b, a).unwrap();
        let bc = meshset.add_loose_edge(mesh, b, c).unwrap();
        let ca = meshset.add_loose_edge(mesh, c, a).unwrap();
        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();

        let outcome = finder.find_loops();

        assert_eq!(
            outcome,
            LoopSearchOutcome::Completed { loops_found: 1, unresolved_edges: 1, search_steps: 4 }
        );
        assert_eq!(
            finder.closed_loops()[0],
            vec![LoopEdge::Mesh(ab), LoopEdge::Mesh(bc), LoopEdge::Mesh(ca)]
        );
        assert!(finder.is_open_edge(ba));
    }

    #[test]
    fn parallel_edge_pair_finds_nothing() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let a = meshset.add_vertex(0.0, 0.0, 0.0);
        let b = meshset.add_vertex(1.0, 0.0, 0.0);
        meshset.add_loose_edge(mesh, a, b).unwrap();
        meshset.add_loose_edge(mesh, a, b).unwrap();
        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();

        let outcome = finder.find_loops();

        assert!(matches!(
            outcome,
            LoopSearchOutcome::Completed { loops_found: 0, unresolved_edges: 2, .. }
        ));
        assert!(finder.closed_loops().is_empty());
    }

    #[test]
    fn large_boundary_is_skipped() {
        let (mut meshset, mesh, _, _) = polygon(MAX_LOOP_SEARCH_VERTICES + 1);
        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();

        let outcome = finder.find_loops();

        assert_eq!(outcome, LoopSearchOutcome::Skipped { vertices: MAX_LOOP_SEARCH_VERTICES + 1 });
        assert_eq!(finder.indexed_vertex_count(), MAX_LOOP_SEARCH_VERTICES + 1);
        assert!(finder.closed_loops().is_empty());
    }

    #[test]
    fn exhausted_budget_finds_nothing() {
        let (mut meshset, mesh, _, _) = polygon(6);
        let mut params = params();
        params.max_loop_search_steps = 3;
        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params).unwrap();

        let outcome = finder.find_loops();

        assert!(matches!(
            outcome,
            LoopSearchOutcome::Completed { loops_found: 0, unresolved_edges: 6, .. }
        ));
    }

    #[test]
    fn traced_loop_closes_with_face() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let a = meshset.add_vertex(0.0, 0.0, 0.0);
        let b = meshset.add_vertex(1.0, 0.0, 0.0);
        let c = meshset.add_vertex(0.0, 1.0, 0.0);
        let d = meshset.add_vertex(0.0, 0.0, 1.0);
        meshset.add_face(mesh, &[a, c, b]).unwrap();
        meshset.add_face(mesh, &[a, b, d]).unwrap();
        meshset.add_face(mesh, &[b, c, d]).unwrap();
        meshset.link_reverse_edges(mesh).unwrap();

        let oracle = BoolOpOracle::default();
        let mut finder = EdgeLoopFinder::new(&mut meshset, mesh, params()).unwrap();
        finder.find_loops();
        assert_eq!(finder.closed_loops().len(), 1);

        assert_eq!(finder.close_loops_with_faces(&oracle), 1);
        assert!(finder.closed_loops().is_empty());
        assert_eq!(finder.open_edge_count(), 0);
        drop(finder);

        let info = oracle.score(&meshset);
        assert!(info.valid);
        assert_eq!(info.num_faces, 4);
    }
}
