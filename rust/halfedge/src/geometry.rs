// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric helpers on points, boxes and mesh entities.

use nalgebra::{Point3, Vector3};

use crate::keys::*;
use crate::meshset::MeshSet;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// Fits a box around the given points. Returns `None` for an empty input.
    pub fn fit<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Aabb {
            min: first,
            max: first,
        };
        for p in iter {
            bbox.min = bbox.min.inf(&p);
            bbox.max = bbox.max.sup(&p);
        }
        Some(bbox)
    }

    /// Center of the box.
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Half size of the box along each axis.
    pub fn half_extent(&self) -> Vector3<f64> {
        (self.max - self.min) * 0.5
    }

    /// Returns `true` if every half extent is strictly below `eps`.
    pub fn is_smaller_than(&self, eps: f64) -> bool {
        let ext = self.half_extent();
        ext.x < eps && ext.y < eps && ext.z < eps
    }
}

/// Midpoint of two points.
pub fn midpoint(a: &Point3<f64>, b: &Point3<f64>) -> Point3<f64> {
    nalgebra::center(a, b)
}

/// Returns `true` if `a` and `b` differ by less than `eps` on every axis.
pub fn within_per_axis(a: &Point3<f64>, b: &Point3<f64>, eps: f64) -> bool {
    let d = a - b;
    d.x.abs() < eps && d.y.abs() < eps && d.z.abs() < eps
}

impl MeshSet {
    /// Vector from the start to the end of a half-edge.
    pub fn edge_vector(&self, key: EdgeKey) -> Option<Vector3<f64>> {
        let (v1, v2) = self.endpoints(key)?;
        Some(self.position(v2)? - self.position(v1)?)
    }

    /// Squared length of a half-edge.
    pub fn edge_length_squared(&self, key: EdgeKey) -> Option<f64> {
        self.edge_vector(key).map(|v| v.norm_squared())
    }

    /// Positions of a face's loop vertices in order.
    pub fn face_points(&self, key: FaceKey) -> Option<Vec<Point3<f64>>> {
        let edges = self.face_edges(key).ok()?;
        edges
            .iter()
            .map(|&ek| self.v1(ek).and_then(|v| self.position(v)))
            .collect()
    }

    /// Computes the face normal using Newell's method.
    ///
    /// Works for any planar polygon (convex or concave). Returns `None` for a
    /// degenerate face.
    pub fn face_normal(&self, key: FaceKey) -> Option<Vector3<f64>> {
        let points = self.face_points(key)?;
        let normal = newell_normal(&points);
        let len = normal.norm();
        if len < 1e-15 {
            return None;
        }
        Some(normal / len)
    }

    /// Computes the area of a face using the cross-product triangle fan.
    pub fn face_area(&self, key: FaceKey) -> Option<f64> {
        let points = self.face_points(key)?;
        if points.len() < 3 {
            return Some(0.0);
        }

        let p0 = points[0];
        let mut total = Vector3::new(0.0, 0.0, 0.0);
        for i in 1..points.len() - 1 {
            let v1 = points[i] - p0;
            let v2 = points[i + 1] - p0;
            total += v1.cross(&v2);
        }

        Some(total.norm() / 2.0)
    }
}

/// Unnormalized polygon normal by Newell's method.
fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    let n = points.len();
    for i in 0..n {
        let curr = points[i];
        let next = points[(i + 1) % n];
        normal.x += (curr.y - next.y) * (curr.z + next.z);
        normal.y += (curr.z - next.z) * (curr.x + next.x);
        normal.z += (curr.x - next.x) * (curr.y + next.y);
    }
    normal
}
