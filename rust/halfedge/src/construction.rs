// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction and editing methods for meshsets.
//!
//! Every method validates the keys it is given and returns an error instead
//! of creating dangling references.

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::keys::*;
use crate::meshset::*;

impl MeshSet {
    /// Adds an empty sub-mesh.
    pub fn add_mesh(&mut self) -> MeshKey {
        self.meshes.insert(MeshData::default())
    }

    /// Adds a vertex at the given 3D coordinates.
    pub fn add_vertex(&mut self, x: f64, y: f64, z: f64) -> VertexKey {
        self.vertices.insert(VertexData {
            pos: Point3::new(x, y, z),
        })
    }

    /// Adds a vertex at the given point.
    pub fn add_vertex_at(&mut self, pos: Point3<f64>) -> VertexKey {
        self.vertices.insert(VertexData { pos })
    }

    /// Creates a face from an ordered list of vertices.
    ///
    /// One half-edge is created per vertex, linked into a cyclic `next`/`prev`
    /// loop. The new half-edges are open until [`MeshSet::link_reverse_edges`]
    /// or [`MeshSet::pair`] gives them a partner.
    pub fn add_face(&mut self, mesh: MeshKey, vertices: &[VertexKey]) -> Result<FaceKey> {
        if !self.meshes.contains_key(mesh) {
            return Err(Error::MeshNotFound(mesh));
        }
        if vertices.len() < 3 {
            return Err(Error::DegenerateFace(vertices.len()));
        }
        for &vk in vertices {
            if !self.vertices.contains_key(vk) {
                return Err(Error::VertexNotFound(vk));
            }
        }

        let loop_edges: SmallVec<[EdgeKey; 8]> = vertices
            .iter()
            .map(|&vert| {
                self.edges.insert(HalfEdgeData {
                    vert,
                    next: None,
                    prev: None,
                    rev: None,
                    face: None,
                    mesh,
                    loose_end: None,
                })
            })
            .collect();

        let n = loop_edges.len();
        let face = self.faces.insert(FaceData {
            edge: loop_edges[0],
            n_edges: n,
            mesh,
        });

        for i in 0..n {
            let edge = &mut self.edges[loop_edges[i]];
            edge.next = Some(loop_edges[(i + 1) % n]);
            edge.prev = Some(loop_edges[(i + n - 1) % n]);
            edge.face = Some(face);
        }

        self.meshes[mesh].faces.push(face);
        Ok(face)
    }

    /// Creates a loose half-edge from `v1` to `v2` that bounds no face.
    pub fn add_loose_edge(&mut self, mesh: MeshKey, v1: VertexKey, v2: VertexKey) -> Result<EdgeKey> {
        if !self.meshes.contains_key(mesh) {
            return Err(Error::MeshNotFound(mesh));
        }
        if !self.vertices.contains_key(v1) {
            return Err(Error::VertexNotFound(v1));
        }
        if !self.vertices.contains_key(v2) {
            return Err(Error::VertexNotFound(v2));
        }
        if v1 == v2 {
            return Err(Error::ZeroLengthEdge(v1));
        }

        let key = self.edges.insert(HalfEdgeData {
            vert: v1,
            next: None,
            prev: None,
            rev: None,
            face: None,
            mesh,
            loose_end: Some(v2),
        });
        self.meshes[mesh].loose_edges.push(key);
        Ok(key)
    }

    /// Overwrites the position of a vertex in place.
    pub fn set_vertex_position(&mut self, key: VertexKey, pos: Point3<f64>) -> Result<()> {
        let vertex = self.vertices.get_mut(key).ok_or(Error::VertexNotFound(key))?;
        vertex.pos = pos;
        Ok(())
    }

    /// Repoints the start vertex of a half-edge.
    pub fn set_start_vertex(&mut self, edge: EdgeKey, vertex: VertexKey) -> Result<()> {
        if !self.vertices.contains_key(vertex) {
            return Err(Error::VertexNotFound(vertex));
        }
        let data = self.edges.get_mut(edge).ok_or(Error::EdgeNotFound(edge))?;
        data.vert = vertex;
        Ok(())
    }

    /// Repoints the end vertex of a half-edge.
    ///
    /// For a face edge this moves the start of its `next` edge, which is the
    /// only other edge affected. For a loose edge the explicit end changes.
    pub fn set_end_vertex(&mut self, edge: EdgeKey, vertex: VertexKey) -> Result<()> {
        if !self.vertices.contains_key(vertex) {
            return Err(Error::VertexNotFound(vertex));
        }
        let next = self.edges.get(edge).ok_or(Error::EdgeNotFound(edge))?.next;
        match next {
            Some(next) => {
                let next_data = self.edges.get_mut(next).ok_or(Error::EdgeNotFound(next))?;
                next_data.vert = vertex;
            }
            None => self.edges[edge].loose_end = Some(vertex),
        }
        Ok(())
    }

    /// Makes `a` and `b` reverse partners of each other.
    pub fn pair(&mut self, a: EdgeKey, b: EdgeKey) -> Result<()> {
        if !self.edges.contains_key(b) {
            return Err(Error::EdgeNotFound(b));
        }
        self.edges.get_mut(a).ok_or(Error::EdgeNotFound(a))?.rev = Some(b);
        self.edges[b].rev = Some(a);
        Ok(())
    }

    /// Half-edges of a face in loop order.
    ///
    /// The walk is bounded by the face's edge count, so a corrupted `next`
    /// chain cannot loop forever.
    pub fn face_edges(&self, face: FaceKey) -> Result<SmallVec<[EdgeKey; 8]>> {
        let data = self.faces.get(face).ok_or(Error::FaceNotFound(face))?;
        let mut result = SmallVec::new();
        let mut current = Some(data.edge);
        for _ in 0..data.n_edges {
            let Some(ek) = current else { break };
            let Some(edge) = self.edges.get(ek) else { break };
            result.push(ek);
            current = edge.next;
            if current == Some(data.edge) {
                break;
            }
        }
        Ok(result)
    }

    /// All half-edges of a sub-mesh: face loops first, then loose edges.
    pub fn mesh_edges(&self, mesh: MeshKey) -> Result<Vec<EdgeKey>> {
        let data = self.meshes.get(mesh).ok_or(Error::MeshNotFound(mesh))?;
        let mut result = Vec::new();
        for &fk in &data.faces {
            result.extend(self.face_edges(fk)?);
        }
        result.extend(data.loose_edges.iter().copied().filter(|&e| self.edges.contains_key(e)));
        Ok(result)
    }

    /// Pairs every open half-edge of a sub-mesh with an open half-edge that
    /// runs between the same two vertices in the opposite direction.
    ///
    /// Matching is by vertex identity. Returns the number of pairs formed.
    /// The open/closed edge lists are refreshed afterwards.
    pub fn link_reverse_edges(&mut self, mesh: MeshKey) -> Result<usize> {
        let edges = self.mesh_edges(mesh)?;

        let mut unpaired: FxHashMap<(VertexKey, VertexKey), SmallVec<[EdgeKey; 2]>> =
            FxHashMap::default();
        for &ek in &edges {
            if !self.is_open(ek) {
                continue;
            }
            if let Some(ends) = self.endpoints(ek) {
                let same_way = unpaired.entry(ends).or_default();
                if !same_way.is_empty() {
                    tracing::trace!(edge = ?ek, "Open half-edge duplicates the direction of another");
                }
                same_way.push(ek);
            }
        }

        let mut pairs = 0;
        for &ek in &edges {
            if !self.is_open(ek) {
                continue;
            }
            let Some((v1, v2)) = self.endpoints(ek) else {
                continue;
            };
            let partner = unpaired
                .get_mut(&(v2, v1))
                .and_then(|candidates| {
                    let pos = candidates.iter().position(|&c| c != ek && self.is_open(c))?;
                    Some(candidates.remove(pos))
                });
            if let Some(partner) = partner {
                self.pair(ek, partner)?;
                pairs += 1;
            }
        }

        self.refresh_edge_sets(mesh)?;
        tracing::debug!(
            mesh = ?mesh,
            pairs,
            open_edges = self.meshes[mesh].open_edges.len(),
            "Linked reverse half-edges"
        );
        Ok(pairs)
    }

    /// Recomputes the open and closed half-edge lists of a sub-mesh from the
    /// current `rev` links.
    pub fn refresh_edge_sets(&mut self, mesh: MeshKey) -> Result<()> {
        let edges = self.mesh_edges(mesh)?;
        let (closed, open): (Vec<EdgeKey>, Vec<EdgeKey>) = edges
            .into_iter()
            .partition(|&ek| self.edges[ek].rev.is_some());

        let data = &mut self.meshes[mesh];
        data.open_edges = open;
        data.closed_edges = closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> (MeshSet, MeshKey, [VertexKey; 4]) {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let v0 = meshset.add_vertex(0.0, 0.0, 0.0);
        let v1 = meshset.add_vertex(1.0, 0.0, 0.0);
        let v2 = meshset.add_vertex(1.0, 1.0, 0.0);
        let v3 = meshset.add_vertex(0.0, 1.0, 0.0);
        meshset.add_face(mesh, &[v0, v1, v2]).unwrap();
        meshset.add_face(mesh, &[v0, v2, v3]).unwrap();
        (meshset, mesh, [v0, v1, v2, v3])
    }

    #[test]
    fn face_needs_three_vertices() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let a = meshset.add_vertex(0.0, 0.0, 0.0);
        let b = meshset.add_vertex(1.0, 0.0, 0.0);

        assert!(matches!(
            meshset.add_face(mesh, &[a, b]),
            Err(Error::DegenerateFace(2))
        ));
    }

    #[test]
    fn face_loop_is_cyclic() {
        let (meshset, mesh, _) = two_triangles();
        let face = meshset.mesh(mesh).unwrap().faces[0];
        let edges = meshset.face_edges(face).unwrap();

        assert_eq!(edges.len(), 3);
        for (i, &ek) in edges.iter().enumerate() {
            let e = meshset.edge(ek).unwrap();
            assert_eq!(e.next, Some(edges[(i + 1) % 3]));
            assert_eq!(e.prev, Some(edges[(i + 2) % 3]));
            assert_eq!(e.face, Some(face));
        }
    }

    #[test]
    fn shared_diagonal_gets_linked() {
        let (mut meshset, mesh, [v0, _, v2, _]) = two_triangles();
        let pairs = meshset.link_reverse_edges(mesh).unwrap();

        assert_eq!(pairs, 1);
        let data = meshset.mesh(mesh).unwrap();
        assert_eq!(data.closed_edges.len(), 2);
        assert_eq!(data.open_edges.len(), 4);

        for &ek in &data.closed_edges {
            let rev = meshset.edge(ek).unwrap().rev.unwrap();
            assert_eq!(meshset.edge(rev).unwrap().rev, Some(ek));
            let ends = meshset.endpoints(ek).unwrap();
            assert!(ends == (v0, v2) || ends == (v2, v0));
        }
    }

    #[test]
    fn set_end_vertex_moves_successor_start() {
        let (mut meshset, mesh, [v0, v1, _, v3]) = two_triangles();
        let face = meshset.mesh(mesh).unwrap().faces[0];
        let first = meshset.face(face).unwrap().edge;
        assert_eq!(meshset.endpoints(first), Some((v0, v1)));

        meshset.set_end_vertex(first, v3).unwrap();

        let next = meshset.edge(first).unwrap().next.unwrap();
        assert_eq!(meshset.v2(first), Some(v3));
        assert_eq!(meshset.v1(next), Some(v3));
    }

    #[test]
    fn loose_edge_rejects_identical_endpoints() {
        let mut meshset = MeshSet::new();
        let mesh = meshset.add_mesh();
        let a = meshset.add_vertex(0.0, 0.0, 0.0);
        let b = meshset.add_vertex(1.0, 0.0, 0.0);

        assert!(meshset.add_loose_edge(mesh, a, b).is_ok());
        assert!(matches!(
            meshset.add_loose_edge(mesh, a, a),
            Err(Error::ZeroLengthEdge(_))
        ));
        assert_eq!(meshset.mesh(mesh).unwrap().loose_edges.len(), 1);
    }
}
