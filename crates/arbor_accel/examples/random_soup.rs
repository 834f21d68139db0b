//! Random triangle soup example.
//!
//! Builds a naive and an SAH BVH over the same soup, casts a batch of
//! random rays through both and reports build stats and agreement.
//!
//! Usage: `cargo run --example random_soup -- [triangles] [rays] [sah-leaf-size]`
//! The build log is printed at `info`; override with `RUST_LOG`.

use anyhow::{bail, Context, Result};
use arbor_accel::{BvhAccel, BvhConfig, Ray, SplitMethod, Triangle, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let triangle_count = parse_arg(&args, 0, 1000)?;
    let ray_count = parse_arg(&args, 1, 100_000)?;
    let sah_leaf_size = parse_arg(&args, 2, 4)?;

    println!("arbor - random triangle soup");
    println!("============================");

    let mut rng = StdRng::seed_from_u64(0);
    let triangles = random_soup(&mut rng, triangle_count);
    let rays = random_rays(&mut rng, ray_count);

    let naive = BvhAccel::new(
        triangles.iter(),
        BvhConfig::new().with_split_method(SplitMethod::Naive),
    )?;
    let sah = BvhAccel::new(
        triangles.iter(),
        BvhConfig::new()
            .with_split_method(SplitMethod::Sah)
            .with_max_prims_in_node(sah_leaf_size),
    )?;

    for (name, bvh) in [("naive", &naive), ("sah", &sah)] {
        let report = bvh.report();
        println!(
            "{name:>5}: {} nodes ({} leaves), depth {}, built in {:?}",
            report.total_nodes(),
            report.leaf_nodes,
            report.max_depth,
            report.build_time
        );
    }

    let start = Instant::now();
    let naive_hits = naive.intersect_batch(&rays);
    let naive_time = start.elapsed();

    let start = Instant::now();
    let sah_hits = sah.intersect_batch(&rays);
    let sah_time = start.elapsed();

    let hits = naive_hits.iter().filter(|h| h.happened).count();
    let disagreements = naive_hits
        .iter()
        .zip(&sah_hits)
        .filter(|(a, b)| a.happened != b.happened || (a.happened && (a.t - b.t).abs() > 1e-3))
        .count();

    println!("Cast {} rays: {} hits", rays.len(), hits);
    println!("  naive: {naive_time:?}");
    println!("    sah: {sah_time:?}");

    if disagreements > 0 {
        bail!("{disagreements} rays disagree between naive and SAH trees");
    }
    println!("Both trees agree on every ray");
    Ok(())
}

fn parse_arg(args: &[String], index: usize, default: usize) -> Result<usize> {
    match args.get(index) {
        Some(value) => value
            .parse()
            .with_context(|| format!("argument {} must be a positive integer, got {value:?}", index + 1)),
        None => Ok(default),
    }
}

fn random_soup(rng: &mut StdRng, count: usize) -> Vec<Triangle> {
    (0..count)
        .map(|_| {
            let center = Vec3::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
            );
            let mut vertex = || center + Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 2.0 - 1.0;
            Triangle::new(vertex(), vertex(), vertex())
        })
        .collect()
}

fn random_rays(rng: &mut StdRng, count: usize) -> Vec<Ray> {
    (0..count)
        .map(|_| {
            let origin = Vec3::new(
                rng.gen_range(-80.0..80.0),
                rng.gen_range(-80.0..80.0),
                rng.gen_range(-80.0..80.0),
            );
            let target = Vec3::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
            );
            Ray::new(origin, target - origin)
        })
        .collect()
}
