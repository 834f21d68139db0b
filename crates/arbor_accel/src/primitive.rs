//! Primitive trait and the linear-scan aggregate.

use crate::Intersection;
use arbor_math::{Bounds3, Ray};

/// Anything a ray can be intersected with.
pub trait Primitive: Send + Sync {
    /// Tight axis-aligned bounds of the geometry.
    fn bounds(&self) -> Bounds3;

    /// Nearest hit within the ray's window, or [`Intersection::NONE`].
    fn intersect(&self, ray: &Ray) -> Intersection;

    /// Whether [`Primitive::intersect`] would report a hit.
    ///
    /// Implementations may override this with a cheaper test but must agree
    /// with `intersect(ray).happened` for every ray.
    fn intersect_p(&self, ray: &Ray) -> bool {
        self.intersect(ray).happened
    }
}

/// A flat list of borrowed primitives, tested one after another.
///
/// Linear in the number of primitives; used for tiny scenes and as the
/// reference answer the BVH must reproduce.
pub struct PrimitiveList<'a, P: Primitive + ?Sized + 'a> {
    objects: Vec<&'a P>,
    bounds: Bounds3,
}

impl<'a, P: Primitive + ?Sized + 'a> PrimitiveList<'a, P> {
    /// Create a new empty list.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            bounds: Bounds3::EMPTY,
        }
    }

    /// Add an object to the list.
    pub fn add(&mut self, object: &'a P) {
        self.bounds = self.bounds.union(&object.bounds());
        self.objects.push(object);
    }

    /// Get the number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<'a, P: Primitive + ?Sized + 'a> Default for PrimitiveList<'a, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, P: Primitive + ?Sized + 'a> FromIterator<&'a P> for PrimitiveList<'a, P> {
    fn from_iter<I: IntoIterator<Item = &'a P>>(iter: I) -> Self {
        let mut list = Self::new();
        for object in iter {
            list.add(object);
        }
        list
    }
}

impl<'a, P: Primitive + ?Sized + 'a> Primitive for PrimitiveList<'a, P> {
    fn bounds(&self) -> Bounds3 {
        self.bounds
    }

    fn intersect(&self, ray: &Ray) -> Intersection {
        let mut closest = Intersection::NONE;
        let mut window = *ray;

        for (index, object) in self.objects.iter().enumerate() {
            let rec = object.intersect(&window);
            if rec.happened && rec.t < closest.t {
                window = window.with_t_max(rec.t);
                closest = rec.with_primitive(index);
            }
        }

        closest
    }

    fn intersect_p(&self, ray: &Ray) -> bool {
        self.objects.iter().any(|object| object.intersect_p(ray))
    }
}
