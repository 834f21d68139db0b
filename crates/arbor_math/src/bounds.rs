use crate::{Interval, Ray, Vec3};

/// Relative slack added to each side of a slab by [`Bounds3::intersect_p`].
pub const SLAB_SLACK: f32 = 1e-4;

/// Axis-aligned bounding box.
///
/// Non-empty boxes satisfy `p_min[i] <= p_max[i]` on every axis. A box may
/// be flat (zero extent) along any axis; flat boxes are valid and keep a
/// finite surface area. [`Bounds3::EMPTY`] is the identity for [`Bounds3::union`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds3 {
    pub p_min: Vec3,
    pub p_max: Vec3,
}

impl Bounds3 {
    /// Contains nothing. `p_min = +inf`, `p_max = -inf`.
    pub const EMPTY: Bounds3 = Bounds3 {
        p_min: Vec3::INFINITY,
        p_max: Vec3::NEG_INFINITY,
    };

    /// Create a box from two corner points in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            p_min: a.min(b),
            p_max: a.max(b),
        }
    }

    /// A zero-volume box around a single point.
    pub fn from_point(p: Vec3) -> Self {
        Self { p_min: p, p_max: p }
    }

    pub fn is_empty(&self) -> bool {
        self.p_min.cmpgt(self.p_max).any()
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &Bounds3) -> Bounds3 {
        Self {
            p_min: self.p_min.min(other.p_min),
            p_max: self.p_max.max(other.p_max),
        }
    }

    /// Smallest box enclosing this box and `point`.
    pub fn union_point(&self, point: Vec3) -> Bounds3 {
        Self {
            p_min: self.p_min.min(point),
            p_max: self.p_max.max(point),
        }
    }

    /// Overlap of two boxes; [`Bounds3::EMPTY`] when they are disjoint.
    pub fn intersection(&self, other: &Bounds3) -> Bounds3 {
        let overlap = Self {
            p_min: self.p_min.max(other.p_min),
            p_max: self.p_max.min(other.p_max),
        };
        if overlap.is_empty() {
            Self::EMPTY
        } else {
            overlap
        }
    }

    pub fn overlaps(&self, other: &Bounds3) -> bool {
        self.p_max.cmpge(other.p_min).all() && self.p_min.cmple(other.p_max).all()
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.p_max.cmpge(point).all() && self.p_min.cmple(point).all()
    }

    /// Vector from `p_min` to `p_max`. Zero for empty boxes.
    pub fn diagonal(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.p_max - self.p_min
        }
    }

    /// `2 * (dx*dy + dy*dz + dz*dx)`. Flat and empty boxes give finite values.
    pub fn surface_area(&self) -> f32 {
        let d = self.diagonal();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn centroid(&self) -> Vec3 {
        0.5 * (self.p_min + self.p_max)
    }

    /// Index (0=X, 1=Y, 2=Z) of the axis with the largest extent.
    pub fn max_extent(&self) -> usize {
        let d = self.diagonal();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Position of `point` relative to the box corners: 0 at `p_min`, 1 at `p_max`.
    ///
    /// Axes with zero extent report 0.
    pub fn offset(&self, point: Vec3) -> Vec3 {
        let d = self.diagonal();
        let o = point - self.p_min;
        Vec3::new(
            if d.x > 0.0 { o.x / d.x } else { 0.0 },
            if d.y > 0.0 { o.y / d.y } else { 0.0 },
            if d.z > 0.0 { o.z / d.z } else { 0.0 },
        )
    }

    /// Get the slab for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, axis: usize) -> Interval {
        Interval::new(self.p_min[axis], self.p_max[axis])
    }

    /// Slab test against the ray's window.
    ///
    /// `inv_dir` and `dir_is_neg` are the ray's precomputed inverse
    /// direction and sign, passed in so a traversal computes them once per
    /// ray rather than once per node. Touching a face or edge counts as a
    /// hit. Each slab is widened by [`SLAB_SLACK`] relative to its
    /// coordinates, so the test never rejects a box that a rounded primitive
    /// hit lies on; the stored bounds themselves stay tight. An axis the ray
    /// is parallel to is a miss when the origin lies outside that slab and
    /// otherwise places no constraint on `t`.
    pub fn intersect_p(&self, ray: &Ray, inv_dir: Vec3, dir_is_neg: [bool; 3]) -> bool {
        if self.is_empty() {
            return false;
        }

        let mut span = Interval::UNIVERSE;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let slab = self.axis_interval(axis);
            // Widen relative to the coordinates involved: primitive tests accept
            // edge and vertex hits within rounding error, which can land just
            // outside the tight box
            let scale = slab.min.abs().max(slab.max.abs()).max(origin.abs()).max(1.0);
            let slab = slab.expand(2.0 * SLAB_SLACK * scale);

            if ray.direction[axis] == 0.0 {
                if !slab.contains(origin) {
                    return false;
                }
                continue;
            }

            let (near, far) = if dir_is_neg[axis] {
                (slab.max, slab.min)
            } else {
                (slab.min, slab.max)
            };
            let t_near = (near - origin) * inv_dir[axis];
            let t_far = (far - origin) * inv_dir[axis];

            span = span.intersect(&Interval::new(t_near, t_far));
            if span.is_empty() {
                return false;
            }
        }

        // Inclusive at t_max so a box touching the current closest hit is still
        // visited; equal-distance hits in sibling subtrees both get reported
        span.max > ray.t_min && span.min <= ray.t_max
    }
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl FromIterator<Bounds3> for Bounds3 {
    fn from_iter<I: IntoIterator<Item = Bounds3>>(iter: I) -> Self {
        iter.into_iter().fold(Bounds3::EMPTY, |acc, b| acc.union(&b))
    }
}
