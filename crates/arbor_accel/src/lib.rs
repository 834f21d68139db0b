//! Arbor accel - bounding volume hierarchy for nearest-hit ray queries.
//!
//! Builds a binary BVH once over a static set of borrowed primitives
//! (triangles, or anything implementing [`Primitive`]) and answers
//! closest-hit and any-hit queries in sub-linear time.
//!
//! # Example
//!
//! ```
//! use arbor_accel::{BvhAccel, BvhConfig, Ray, SplitMethod, Triangle, Vec3};
//!
//! let triangles = vec![Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y)];
//! let config = BvhConfig::new().with_split_method(SplitMethod::Sah);
//! let bvh = BvhAccel::new(triangles.iter(), config)?;
//!
//! let hit = bvh.intersect(&Ray::new(Vec3::new(0.2, 0.2, -1.0), Vec3::Z));
//! assert!(hit.happened);
//! assert_eq!(hit.primitive, Some(0));
//! # Ok::<(), arbor_accel::BvhError>(())
//! ```

mod build;
mod bvh;
mod config;
mod intersection;
mod primitive;
mod triangle;

#[cfg(test)]
mod test_scenes;

pub use build::BuildReport;
pub use bvh::{BvhAccel, BvhError, BvhNode, NodeId};
pub use config::{BvhConfig, ConfigError, SplitMethod, DEFAULT_SAH_BUCKETS};
pub use intersection::{Intersection, MaterialId};
pub use primitive::{Primitive, PrimitiveList};
pub use triangle::{Triangle, HIT_EPSILON};

/// Re-export math types from arbor_math
pub use arbor_math::{Bounds3, Interval, Ray, Vec3};
