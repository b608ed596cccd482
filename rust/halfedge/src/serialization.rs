// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON exchange format for meshsets.
//!
//! Meshes are written as indexed polygons: a shared position list, per mesh
//! a list of faces (vertex index loops) and loose edges (index pairs).
//! Reverse links are not stored; they are rebuilt on load by matching
//! opposite half-edges, so only the connectivity that vertex identity
//! implies survives a round trip.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::VertexKey;
use crate::meshset::MeshSet;

/// Serializable representation of a meshset.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeshSetSnapshot {
    pub positions: Vec<[f64; 3]>,
    pub meshes: Vec<MeshSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeshSnapshot {
    pub faces: Vec<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loose_edges: Vec<[usize; 2]>,
}

impl MeshSet {
    /// Serializes the meshset to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.to_snapshot()?;
        serde_json::to_string_pretty(&snapshot).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserializes a meshset from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: MeshSetSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(&snapshot)
    }

    /// Creates a serializable snapshot of the meshset.
    ///
    /// SlotMap keys are mapped to sequential integer IDs for portability.
    pub fn to_snapshot(&self) -> Result<MeshSetSnapshot> {
        let mut vertex_ids: FxHashMap<VertexKey, usize> = FxHashMap::default();
        let positions = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, (k, v))| {
                vertex_ids.insert(k, i);
                [v.pos.x, v.pos.y, v.pos.z]
            })
            .collect();

        let id_of = |vk: VertexKey| {
            vertex_ids
                .get(&vk)
                .copied()
                .ok_or(Error::VertexNotFound(vk))
        };

        let mut meshes = Vec::with_capacity(self.meshes.len());
        for (_, mesh) in self.meshes.iter() {
            let mut faces = Vec::with_capacity(mesh.faces.len());
            for &fk in &mesh.faces {
                let loop_ids = self
                    .face_edges(fk)?
                    .iter()
                    .map(|&ek| self.v1(ek).ok_or(Error::EdgeNotFound(ek)).and_then(id_of))
                    .collect::<Result<Vec<_>>>()?;
                faces.push(loop_ids);
            }

            let mut loose_edges = Vec::with_capacity(mesh.loose_edges.len());
            for &ek in &mesh.loose_edges {
                let (v1, v2) = self.endpoints(ek).ok_or(Error::EdgeNotFound(ek))?;
                loose_edges.push([id_of(v1)?, id_of(v2)?]);
            }

            meshes.push(MeshSnapshot { faces, loose_edges });
        }

        Ok(MeshSetSnapshot { positions, meshes })
    }

    /// Rebuilds a meshset from a snapshot and links reverse half-edges.
    pub fn from_snapshot(snapshot: &MeshSetSnapshot) -> Result<Self> {
        let mut meshset = MeshSet::new();
        let keys: Vec<VertexKey> = snapshot
            .positions
            .iter()
            .map(|p| meshset.add_vertex(p[0], p[1], p[2]))
            .collect();

        let resolve = |id: usize| {
            keys.get(id)
                .copied()
                .ok_or_else(|| Error::Serialization(format!("vertex index {id} out of range")))
        };

        for mesh_snapshot in &snapshot.meshes {
            let mesh = meshset.add_mesh();
            for face in &mesh_snapshot.faces {
                let verts = face.iter().map(|&id| resolve(id)).collect::<Result<Vec<_>>>()?;
                meshset.add_face(mesh, &verts)?;
            }
            for &[a, b] in &mesh_snapshot.loose_edges {
                meshset.add_loose_edge(mesh, resolve(a)?, resolve(b)?)?;
            }
            meshset.link_reverse_edges(mesh)?;
        }

        tracing::debug!(
            vertices = meshset.vertex_count(),
            meshes = meshset.mesh_count(),
            faces = meshset.face_count(),
            "Loaded meshset snapshot"
        );
        Ok(meshset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_connectivity() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let v0 = meshset.add_vertex(0.0, 0.0, 0.0);
        let v1 = meshset.add_vertex(1.0, 0.0, 0.0);
        let v2 = meshset.add_vertex(1.0, 1.0, 0.0);
        let v3 = meshset.add_vertex(0.0, 1.0, 0.0);
        meshset.add_face(mesh, &[v0, v1, v2]).unwrap();
        meshset.add_face(mesh, &[v0, v2, v3]).unwrap();
        meshset.add_loose_edge(mesh, v3, v1).unwrap();
        meshset.link_reverse_edges(mesh).unwrap();

        let json = meshset.to_json().unwrap();
        let restored = MeshSet::from_json(&json).unwrap();

        assert_eq!(restored.vertex_count(), 4);
        assert_eq!(restored.face_count(), 2);
        let mesh = restored.mesh_keys()[0];
        let data = restored.mesh(mesh).unwrap();
        assert_eq!(data.loose_edges.len(), 1);
        assert_eq!(data.closed_edges.len(), 2);
        assert_eq!(data.open_edges.len(), 5);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let json = r#"{"positions":[[0,0,0],[1,0,0],[0,1,0]],"meshes":[{"faces":[[0,1,7]]}]}"#;
        assert!(matches!(MeshSet::from_json(json), Err(Error::Serialization(_))));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(MeshSet::from_json("{"), Err(Error::Serialization(_))));
    }
}
