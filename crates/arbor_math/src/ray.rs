use crate::{Interval, Vec3};

/// A ray in 3D space with a parametric window.
///
/// The direction is stored exactly as given and is never renormalized, so
/// hit distances are in units of `direction`. The inverse direction and
/// per-axis sign are computed once here and reused by every slab test.
///
/// `t_max` is the current closest distance: traversal narrows it (via
/// [`Ray::with_t_max`]) as nearer hits are found.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub inv_direction: Vec3,
    pub dir_is_neg: [bool; 3],
    pub t_min: f32,
    pub t_max: f32,
}

impl Ray {
    /// Create a new ray with the window `[0, +inf)`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self::with_window(origin, direction, 0.0, f32::INFINITY)
    }

    /// Create a ray that only accepts hits with `t_min < t <= t_max`.
    pub fn with_window(origin: Vec3, direction: Vec3, t_min: f32, t_max: f32) -> Self {
        Self {
            origin,
            direction,
            // 1/0 yields +-inf; zero components are special-cased by the slab test
            inv_direction: direction.recip(),
            dir_is_neg: [direction.x < 0.0, direction.y < 0.0, direction.z < 0.0],
            t_min,
            t_max,
        }
    }

    /// Copy of this ray with a narrower upper bound.
    #[inline]
    pub fn with_t_max(&self, t_max: f32) -> Self {
        Self { t_max, ..*self }
    }

    /// The accepted parameter range as an [`Interval`].
    #[inline]
    pub fn window(&self) -> Interval {
        Interval::new(self.t_min, self.t_max)
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z)
    }
}
