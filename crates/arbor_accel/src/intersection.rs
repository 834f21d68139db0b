//! Result of a nearest-hit ray query.

use arbor_math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque handle to a material owned by the shading stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Record of a ray-primitive intersection.
///
/// A miss is a normal outcome and is represented by [`Intersection::NONE`]
/// (`happened == false`, `t == +inf`), never by an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Whether anything was hit
    pub happened: bool,
    /// Ray parameter of the hit, `+inf` on a miss
    pub t: f32,
    /// Point of intersection
    pub point: Vec3,
    /// Unit surface normal, always pointing against the ray
    pub normal: Vec3,
    /// Whether the ray hit the front face (the side the geometric normal points to)
    pub front_face: bool,
    /// Barycentric coordinates (u, v) of the hit on the primitive
    pub uv: Vec2,
    /// Material of the hit primitive
    pub material: Option<MaterialId>,
    /// Index of the hit primitive in the aggregate's primitive list
    pub primitive: Option<usize>,
}

impl Intersection {
    /// The no-hit result.
    pub const NONE: Intersection = Intersection {
        happened: false,
        t: f32::INFINITY,
        point: Vec3::ZERO,
        normal: Vec3::ZERO,
        front_face: false,
        uv: Vec2::ZERO,
        material: None,
        primitive: None,
    };

    /// Returns whichever of the two results is the nearer hit.
    ///
    /// On equal `t`, `self` wins.
    #[inline]
    pub fn nearer(self, other: Intersection) -> Intersection {
        if other.happened && (!self.happened || other.t < self.t) {
            other
        } else {
            self
        }
    }

    /// Attach the aggregate-level index of the primitive that produced this hit.
    #[inline]
    pub fn with_primitive(mut self, index: usize) -> Intersection {
        if self.happened {
            self.primitive = Some(index);
        }
        self
    }
}

impl Default for Intersection {
    fn default() -> Self {
        Self::NONE
    }
}
