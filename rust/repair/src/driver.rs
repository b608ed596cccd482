// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-meshset repair.

use meshfix_halfedge::{MeshInfo, MeshOracle, MeshSet};

use crate::config::{RepairParams, MAX_MESHES_FOR_LOOP_SEARCH, MAX_OPEN_EDGE_RATIO};
use crate::error::Result;
use crate::finder::EdgeLoopFinder;
use crate::loops::LoopSearchOutcome;

/// Summary of a [`repair_open_edges`] run.
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub before: MeshInfo,
    pub after: MeshInfo,
    pub meshes_changed: usize,
    pub vertices_merged: usize,
    pub edges_paired: usize,
    pub loops_closed: usize,
    /// At least one pass, or the whole run, was undone because the oracle
    /// preferred the earlier state.
    pub rolled_back: bool,
}

impl RepairReport {
    /// Returns `true` if the oracle considers the result better input for a
    /// boolean operation than the original.
    pub fn improved(&self, oracle: &dyn MeshOracle) -> bool {
        oracle.is_better_for_bool_op(&self.after, &self.before)
    }
}

/// Repairs the open edges of every sub-mesh in `meshset`.
///
/// Each sub-mesh gets its own session: boundary vertex merge, short edge
/// collapse (if enabled), simple loop pairing and, while open edges are
/// rare compared to closed ones, loop tracing with new faces. If the
/// repaired meshset scores worse than the input, the input is restored.
///
/// Already valid meshsets are returned untouched. Errors only come from
/// invalid parameters.
pub fn repair_open_edges(
    meshset: &mut MeshSet,
    params: &RepairParams,
    oracle: &dyn MeshOracle,
) -> Result<RepairReport> {
    params.validate()?;

    let before = oracle.score(meshset);
    let mut report = RepairReport {
        before: before.clone(),
        after: before.clone(),
        ..RepairReport::default()
    };
    if before.valid {
        tracing::debug!("Meshset already valid, nothing to repair");
        return Ok(report);
    }

    let original = meshset.clone();
    let open_ratio = if before.num_closed_edges > 0 {
        before.num_open_edges as f64 / before.num_closed_edges as f64
    } else {
        0.0
    };
    let trace_loops =
        open_ratio < MAX_OPEN_EDGE_RATIO && meshset.mesh_count() <= MAX_MESHES_FOR_LOOP_SEARCH;
    if !trace_loops {
        tracing::debug!(
            open_ratio,
            meshes = meshset.mesh_count(),
            "Skipping loop tracing for this meshset"
        );
    }

    for mesh in meshset.mesh_keys() {
        let mut finder = EdgeLoopFinder::new(meshset, mesh, params.clone())?;
        if finder.open_edge_count() == 0 {
            continue;
        }

        let init = finder.init_from_mesh();
        report.vertices_merged += init.vertices_merged;

        if params.try_merge_short_open_edges {
            finder.find_and_eliminate_short_open_edges(params.short_edge_eps());
        }

        let simple = finder.find_and_eliminate_simple_loops(oracle);
        if simple.rolled_back {
            report.rolled_back = true;
        } else {
            report.edges_paired += simple.pairs;
        }

        if trace_loops && finder.indexed_vertex_count() > 0 {
            if let LoopSearchOutcome::Completed { loops_found, .. } = finder.find_loops() {
                if loops_found > 0 {
                    report.loops_closed += finder.close_loops_with_faces(oracle);
                }
            }
        }

        if finder.has_changes() {
            report.meshes_changed += 1;
        }
    }

    let after = oracle.score(meshset);
    if report.meshes_changed > 0 && oracle.is_better_for_bool_op(&before, &after) {
        tracing::debug!(
            open_before = before.num_open_edges,
            open_after = after.num_open_edges,
            "Repair made the meshset worse, restoring input"
        );
        *meshset = original;
        return Ok(RepairReport {
            before: before.clone(),
            after: before,
            rolled_back: true,
            ..RepairReport::default()
        });
    }

    tracing::debug!(
        meshes_changed = report.meshes_changed,
        vertices_merged = report.vertices_merged,
        edges_paired = report.edges_paired,
        loops_closed = report.loops_closed,
        open_before = before.num_open_edges,
        open_after = after.num_open_edges,
        "Open edge repair finished"
    );
    report.after = after;
    Ok(report)
}
