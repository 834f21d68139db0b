//! Triangle primitive.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::{Intersection, MaterialId, Primitive};
use arbor_math::{Bounds3, Ray, Vec2, Vec3};

/// Determinants smaller than this mean the ray is parallel to the triangle plane.
const PARALLEL_EPSILON: f32 = 1e-8;

/// Hits closer than this are rejected to avoid self-intersection of rays
/// leaving a surface.
pub const HIT_EPSILON: f32 = 1e-4;

/// A triangle primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Pre-computed edges from v0
    edge1: Vec3,
    edge2: Vec3,
    /// Pre-computed face normal (unit length, zero for degenerate triangles)
    normal: Vec3,
    material: MaterialId,
}

impl Triangle {
    /// Create a new triangle from three vertices with the default material.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        Self {
            v0,
            v1,
            v2,
            edge1,
            edge2,
            normal: edge1.cross(edge2).normalize_or_zero(),
            material: MaterialId::default(),
        }
    }

    /// Set the material reported by hits on this triangle.
    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = material;
        self
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn area(&self) -> f32 {
        0.5 * self.edge1.cross(self.edge2).length()
    }

    /// Solves for `(t, u, v)`. `None` when the ray misses or the hit lies
    /// outside the ray window.
    #[inline]
    fn solve(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        let h = ray.direction.cross(self.edge2);
        let det = self.edge1.dot(h);

        // Ray is parallel to triangle
        if det.abs() < PARALLEL_EPSILON {
            return None;
        }

        let f = 1.0 / det;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.edge2.dot(q);
        if t <= HIT_EPSILON || t <= ray.t_min || t > ray.t_max {
            return None;
        }

        Some((t, u, v))
    }
}

impl Primitive for Triangle {
    fn bounds(&self) -> Bounds3 {
        Bounds3::from_points(self.v0, self.v1).union_point(self.v2)
    }

    fn intersect(&self, ray: &Ray) -> Intersection {
        let Some((t, u, v)) = self.solve(ray) else {
            return Intersection::NONE;
        };

        // Normal always points against the ray
        let front_face = ray.direction.dot(self.normal) < 0.0;
        let normal = if front_face { self.normal } else { -self.normal };

        Intersection {
            happened: true,
            t,
            point: ray.at(t),
            normal,
            front_face,
            uv: Vec2::new(u, v),
            material: Some(self.material),
            primitive: None,
        }
    }

    fn intersect_p(&self, ray: &Ray) -> bool {
        self.solve(ray).is_some()
    }
}
