//! Arbor math - vectors, intervals, bounding boxes and rays.
//!
//! Thin layer over `glam` with the geometric primitives the acceleration
//! structure is built from.

// Re-export glam for convenience
pub use glam::*;

mod bounds;
mod interval;
mod ray;

pub use bounds::{Bounds3, SLAB_SLACK};
pub use interval::Interval;
pub use ray::Ray;
