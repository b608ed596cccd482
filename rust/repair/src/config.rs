// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Repair parameters.
//!
//! Defaults suit meshes in metres. [`RepairParams::from_env`] overlays
//! environment variables on top of the defaults.

use std::str::FromStr;

use meshfix_halfedge::BoolOpOracle;

use crate::error::{Error, Result};

/// Open-edge indices with more vertices than this skip the vertex merge.
pub const MAX_MERGE_VERTICES: usize = 10_000;

/// Open-edge indices with more vertices than this skip loop tracing.
pub const MAX_LOOP_SEARCH_VERTICES: usize = 100;

/// Meshsets with more sub-meshes than this skip loop tracing in the driver.
pub const MAX_MESHES_FOR_LOOP_SEARCH: usize = 20;

/// Loop tracing only runs while open edges are below this share of the
/// closed edges.
pub const MAX_OPEN_EDGE_RATIO: f64 = 0.2;

/// How the loop search treats edges tried on a branch that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathScoping {
    /// An edge leaves the current path again when its branch fails, so a
    /// sibling branch may use it.
    #[default]
    PerBranch,
    /// Edges from failed branches stay on the path for the rest of the
    /// search from that start vertex. Finds fewer loops on branching
    /// boundaries.
    Lossy,
}

impl FromStr for PathScoping {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-branch" | "per_branch" | "perbranch" => Ok(PathScoping::PerBranch),
            "lossy" => Ok(PathScoping::Lossy),
            other => Err(format!("unknown path scoping: {other}")),
        }
    }
}

/// Parameters of a repair session.
#[derive(Debug, Clone)]
pub struct RepairParams {
    /// Points closer than this are the same point.
    pub eps_merge_points: f64,
    /// A boundary whose bounding box half extents are all below this is
    /// collapsed to its center.
    pub eps_merge_open_edges_to_point: f64,
    /// Enables the collapse of tiny boundaries to a single point.
    pub merge_open_edges_to_point: bool,
    /// Enables the degenerate open-edge pass in the driver.
    pub try_merge_short_open_edges: bool,
    /// Backtracking behaviour of the loop search.
    pub path_scoping: PathScoping,
    /// Recursion steps allowed per loop search start vertex.
    pub max_loop_search_steps: usize,
    /// Faces below this area count as degenerate in the default oracle.
    pub min_face_area: f64,
    /// Lets the default oracle accept meshes with degenerate edges.
    pub allow_degenerate_edges: bool,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self::with_eps(1e-8)
    }
}

impl RepairParams {
    /// Parameters for a point merge tolerance, with the merge-to-point
    /// tolerance at 50 times that value.
    pub fn with_eps(eps_merge_points: f64) -> Self {
        Self {
            eps_merge_points,
            eps_merge_open_edges_to_point: eps_merge_points * 50.0,
            merge_open_edges_to_point: true,
            try_merge_short_open_edges: true,
            path_scoping: PathScoping::PerBranch,
            max_loop_search_steps: 100_000,
            min_face_area: 1e-12,
            allow_degenerate_edges: false,
        }
    }

    /// Load parameters from environment variables, falling back to the
    /// defaults for unset or unparsable values.
    ///
    /// - `MESHFIX_EPS_MERGE_POINTS`
    /// - `MESHFIX_EPS_MERGE_TO_POINT` (defaults to 50 x the point tolerance)
    /// - `MESHFIX_MERGE_TO_POINT`
    /// - `MESHFIX_MERGE_SHORT_OPEN_EDGES`
    /// - `MESHFIX_PATH_SCOPING` (`per-branch` or `lossy`)
    /// - `MESHFIX_MAX_LOOP_SEARCH_STEPS`
    pub fn from_env() -> Self {
        let eps = env_or("MESHFIX_EPS_MERGE_POINTS", 1e-8);
        let defaults = Self::with_eps(eps);
        Self {
            eps_merge_points: eps,
            eps_merge_open_edges_to_point: env_or(
                "MESHFIX_EPS_MERGE_TO_POINT",
                defaults.eps_merge_open_edges_to_point,
            ),
            merge_open_edges_to_point: env_or(
                "MESHFIX_MERGE_TO_POINT",
                defaults.merge_open_edges_to_point,
            ),
            try_merge_short_open_edges: env_or(
                "MESHFIX_MERGE_SHORT_OPEN_EDGES",
                defaults.try_merge_short_open_edges,
            ),
            path_scoping: env_or("MESHFIX_PATH_SCOPING", defaults.path_scoping),
            max_loop_search_steps: env_or(
                "MESHFIX_MAX_LOOP_SEARCH_STEPS",
                defaults.max_loop_search_steps,
            ),
            ..defaults
        }
    }

    pub fn path_scoping(mut self, scoping: PathScoping) -> Self {
        self.path_scoping = scoping;
        self
    }

    pub fn merge_open_edges_to_point(mut self, enabled: bool) -> Self {
        self.merge_open_edges_to_point = enabled;
        self
    }

    pub fn try_merge_short_open_edges(mut self, enabled: bool) -> Self {
        self.try_merge_short_open_edges = enabled;
        self
    }

    /// Per-axis tolerance of the degenerate open-edge pass.
    pub fn short_edge_eps(&self) -> f64 {
        self.eps_merge_points * 10.0
    }

    /// The default validity oracle for these tolerances.
    pub fn oracle(&self) -> BoolOpOracle {
        BoolOpOracle {
            eps_merge_points: self.eps_merge_points,
            min_face_area: self.min_face_area,
            allow_degenerate_edges: self.allow_degenerate_edges,
            ..BoolOpOracle::default()
        }
    }

    /// Checks that every tolerance is positive and finite.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("eps_merge_points", self.eps_merge_points),
            ("eps_merge_open_edges_to_point", self.eps_merge_open_edges_to_point),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidParams { name, value });
            }
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
