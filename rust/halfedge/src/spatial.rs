// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial hash for tolerance-based vertex lookup.
//!
//! The grid divides 3D space into cubic cells of side `cell_size`. A lookup
//! visits the 27 cells around the query point, so every vertex within
//! `cell_size` of it is returned as a candidate.

use nalgebra::Point3;
use rustc_hash::FxHashMap;

use crate::keys::VertexKey;
use crate::meshset::MeshSet;

/// A spatial hash grid over vertex keys.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    grid: FxHashMap<(i64, i64, i64), Vec<VertexKey>>,
}

impl SpatialIndex {
    /// Creates a new spatial index with the given cell size.
    ///
    /// `cell_size` should be >= the tolerance used for queries. Non-positive
    /// or non-finite sizes fall back to 1.0.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            grid: FxHashMap::default(),
        }
    }

    /// Builds an index over the given vertices at their current positions.
    /// Unknown keys are skipped.
    pub fn from_vertices<I>(meshset: &MeshSet, vertices: I, cell_size: f64) -> Self
    where
        I: IntoIterator<Item = VertexKey>,
    {
        let mut index = Self::new(cell_size);
        for vk in vertices {
            if let Some(p) = meshset.position(vk) {
                index.insert(vk, &p);
            }
        }
        index
    }

    /// Inserts a vertex key at the given position.
    pub fn insert(&mut self, key: VertexKey, p: &Point3<f64>) {
        let cell = self.cell_coords(p);
        self.grid.entry(cell).or_default().push(key);
    }

    /// Moves a key from the cell of `from` to the cell of `to`.
    pub fn relocate(&mut self, key: VertexKey, from: &Point3<f64>, to: &Point3<f64>) {
        let old = self.cell_coords(from);
        let new = self.cell_coords(to);
        if old == new {
            return;
        }
        if let Some(keys) = self.grid.get_mut(&old) {
            keys.retain(|&k| k != key);
            if keys.is_empty() {
                self.grid.remove(&old);
            }
        }
        self.grid.entry(new).or_default().push(key);
    }

    /// All keys stored in the 3x3x3 neighbourhood of `p`, sorted by key.
    pub fn candidates(&self, p: &Point3<f64>) -> Vec<VertexKey> {
        let (cx, cy, cz) = self.cell_coords(p);
        let mut result = Vec::new();

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(keys) = self.grid.get(&(cx + dx, cy + dy, cz + dz)) {
                        result.extend_from_slice(keys);
                    }
                }
            }
        }

        result.sort_unstable();
        result.dedup();
        result
    }

    /// Finds all indexed vertices within `tolerance` of `p`, measured at
    /// their current positions in `meshset`.
    pub fn find_all_near(&self, meshset: &MeshSet, p: &Point3<f64>, tolerance: f64) -> Vec<VertexKey> {
        let tol_sq = tolerance * tolerance;
        self.candidates(p)
            .into_iter()
            .filter(|&vk| {
                meshset
                    .position(vk)
                    .is_some_and(|q| (q - p).norm_squared() <= tol_sq)
            })
            .collect()
    }

    fn cell_coords(&self, p: &Point3<f64>) -> (i64, i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }
}
