//! Shared scene generators for unit tests.

use crate::Triangle;
use arbor_math::{Ray, Vec3};
use rand::Rng;

/// Triangle with vertices (0,0,0), (1,0,0), (0,1,0).
pub fn unit_triangle() -> Triangle {
    Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y)
}

fn random_point(rng: &mut impl Rng, half_extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-half_extent..half_extent),
    )
}

/// Triangle soup: `count` small triangles scattered through [-10, 10]^3.
pub fn random_triangles(rng: &mut impl Rng, count: usize) -> Vec<Triangle> {
    (0..count)
        .map(|_| {
            let center = random_point(rng, 10.0);
            Triangle::new(
                center + random_point(rng, 1.0),
                center + random_point(rng, 1.0),
                center + random_point(rng, 1.0),
            )
        })
        .collect()
}

/// Rays from around the scene aimed at random points inside it. Every
/// fourth ray is axis-aligned to exercise the parallel-slab cases.
pub fn random_rays(rng: &mut impl Rng, count: usize) -> Vec<Ray> {
    (0..count)
        .map(|i| {
            let origin = random_point(rng, 15.0);
            let mut direction = random_point(rng, 10.0) - origin;
            if i % 4 == 3 {
                let axis = rng.gen_range(0..3);
                let keep = direction[axis];
                direction = Vec3::ZERO;
                direction[axis] = if keep == 0.0 { 1.0 } else { keep };
            }
            Ray::new(origin, direction)
        })
        .collect()
}

/// Rays aimed at points on the edges of `triangles`, with every fifth ray
/// aimed exactly at a vertex. These are the hits most sensitive to
/// rounding in the box and triangle tests.
pub fn edge_rays(rng: &mut impl Rng, triangles: &[Triangle], count: usize) -> Vec<Ray> {
    (0..count)
        .map(|i| {
            let [v0, v1, v2] = triangles[rng.gen_range(0..triangles.len())].vertices();
            let (a, b) = match rng.gen_range(0..3) {
                0 => (v0, v1),
                1 => (v1, v2),
                _ => (v2, v0),
            };
            let target = if i % 5 == 4 {
                a
            } else {
                a + (b - a) * rng.gen::<f32>()
            };
            let origin = random_point(rng, 15.0);
            Ray::new(origin, target - origin)
        })
        .collect()
}
