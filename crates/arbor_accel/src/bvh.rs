//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`], so the
//! tree has exactly one owner and is freed in one go. Primitives are
//! borrowed: the accelerator never copies or drops geometry.

use crate::{
    build::{self, BuildReport},
    BvhConfig, ConfigError, Intersection, Primitive,
};
use arbor_math::{Bounds3, Ray};
use rayon::prelude::*;
use std::time::Instant;
use thiserror::Error;

/// Errors from [`BvhAccel::new`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BvhError {
    #[error("invalid BVH configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("primitive {0} has non-finite bounds")]
    NonFiniteBounds(usize),
}

/// Index of a node in the accelerator's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// BVH node - either an interior node with two children or a leaf with primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum BvhNode {
    /// Internal node; bounds are the union of both children's bounds.
    Interior {
        bounds: Bounds3,
        left: NodeId,
        right: NodeId,
        split_axis: usize,
    },
    /// Leaf over `count` primitives starting at `first` in the ordered index list.
    Leaf {
        bounds: Bounds3,
        first: usize,
        count: usize,
    },
}

impl BvhNode {
    pub fn bounds(&self) -> Bounds3 {
        match self {
            BvhNode::Interior { bounds, .. } | BvhNode::Leaf { bounds, .. } => *bounds,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }
}

/// Nearest-hit accelerator over a static set of borrowed primitives.
pub struct BvhAccel<'a, P: Primitive + ?Sized + 'a> {
    /// Primitives in caller order; hit indices refer to this list
    primitives: Vec<&'a P>,
    /// Primitive indices partitioned by the build; leaves index into this
    ordered: Vec<usize>,
    nodes: Vec<BvhNode>,
    root: Option<NodeId>,
    config: BvhConfig,
    report: BuildReport,
}

impl<'a, P: Primitive + ?Sized + 'a> BvhAccel<'a, P> {
    /// Build a BVH over `primitives`.
    ///
    /// An empty primitive list is not an error: the result has no root and
    /// every query misses.
    pub fn new<I>(primitives: I, config: BvhConfig) -> Result<Self, BvhError>
    where
        I: IntoIterator<Item = &'a P>,
    {
        config.validate()?;

        let primitives: Vec<&'a P> = primitives.into_iter().collect();
        let bounds: Vec<Bounds3> = primitives.iter().map(|p| p.bounds()).collect();

        if let Some(index) = bounds
            .iter()
            .position(|b| !(b.p_min.is_finite() && b.p_max.is_finite()))
        {
            return Err(BvhError::NonFiniteBounds(index));
        }

        if primitives.is_empty() {
            log::warn!("Building BVH over an empty scene; all queries will miss");
        }

        let start = Instant::now();
        let built = build::build(&bounds, &config);
        let mut report = built.report;
        report.build_time = start.elapsed();

        log::info!(
            "BVH ({}): {} primitives, {} interior / {} leaf nodes, depth {}, built in {:?}",
            config.split_method,
            report.primitives,
            report.interior_nodes,
            report.leaf_nodes,
            report.max_depth,
            report.build_time
        );

        Ok(Self {
            primitives,
            ordered: built.ordered,
            nodes: built.nodes,
            root: built.root,
            config,
            report,
        })
    }

    /// Bounds of the whole scene; [`Bounds3::EMPTY`] when there is no geometry.
    pub fn world_bound(&self) -> Bounds3 {
        self.root
            .and_then(|root| self.node(root))
            .map_or(Bounds3::EMPTY, BvhNode::bounds)
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn config(&self) -> &BvhConfig {
        &self.config
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Primitives in the order they were given.
    pub fn primitives(&self) -> &[&'a P] {
        &self.primitives
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The node `id` refers to, or `None` if it is not in this accelerator's arena.
    pub fn node(&self, id: NodeId) -> Option<&BvhNode> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Indices (into [`BvhAccel::primitives`]) of the primitives a leaf holds.
    /// Empty for interior nodes.
    pub fn leaf_primitives(&self, node: &BvhNode) -> &[usize] {
        match *node {
            BvhNode::Leaf { first, count, .. } => &self.ordered[first..first + count],
            BvhNode::Interior { .. } => &[],
        }
    }

    /// Edges on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.report.max_depth
    }

    /// Nearest hit along `ray`, or [`Intersection::NONE`].
    ///
    /// The returned hit carries the index of the primitive in
    /// [`BvhAccel::primitives`].
    pub fn intersect(&self, ray: &Ray) -> Intersection {
        match self.root {
            Some(root) => self.get_intersection(root, ray),
            None => Intersection::NONE,
        }
    }

    /// Whether `ray` hits anything. Stops at the first hit found.
    pub fn intersect_p(&self, ray: &Ray) -> bool {
        match self.root {
            Some(root) => self.any_hit(root, ray),
            None => false,
        }
    }

    /// [`BvhAccel::intersect`] for many rays, spread over the rayon thread pool.
    ///
    /// Results are in the same order as `rays`.
    pub fn intersect_batch(&self, rays: &[Ray]) -> Vec<Intersection> {
        rays.par_iter().map(|ray| self.intersect(ray)).collect()
    }

    fn get_intersection(&self, id: NodeId, ray: &Ray) -> Intersection {
        let node = &self.nodes[id.index()];
        if !node.bounds().intersect_p(ray, ray.inv_direction, ray.dir_is_neg) {
            return Intersection::NONE;
        }

        match *node {
            BvhNode::Leaf { .. } => {
                let mut closest = Intersection::NONE;
                let mut window = *ray;

                for &index in self.leaf_primitives(node) {
                    let rec = self.primitives[index].intersect(&window);
                    if rec.happened && rec.t < closest.t {
                        window = window.with_t_max(rec.t);
                        closest = rec.with_primitive(index);
                    }
                }
                closest
            }
            BvhNode::Interior {
                left,
                right,
                split_axis,
                ..
            } => {
                // Visit the child on the near side of the split first so its
                // hit can prune the far side
                let left_first = !ray.dir_is_neg[split_axis];
                let (near, far) = if left_first { (left, right) } else { (right, left) };

                let near_hit = self.get_intersection(near, ray);
                let far_hit = if near_hit.happened {
                    self.get_intersection(far, &ray.with_t_max(near_hit.t))
                } else {
                    self.get_intersection(far, ray)
                };

                // Equal distances resolve to the left child
                if left_first {
                    near_hit.nearer(far_hit)
                } else {
                    far_hit.nearer(near_hit)
                }
            }
        }
    }

    fn any_hit(&self, id: NodeId, ray: &Ray) -> bool {
        let node = &self.nodes[id.index()];
        if !node.bounds().intersect_p(ray, ray.inv_direction, ray.dir_is_neg) {
            return false;
        }

        match *node {
            BvhNode::Leaf { .. } => self
                .leaf_primitives(node)
                .iter()
                .any(|&index| self.primitives[index].intersect_p(ray)),
            BvhNode::Interior { left, right, .. } => {
                self.any_hit(left, ray) || self.any_hit(right, ray)
            }
        }
    }
}

impl<'a, P: Primitive + ?Sized + 'a> Primitive for BvhAccel<'a, P> {
    fn bounds(&self) -> Bounds3 {
        self.world_bound()
    }

    fn intersect(&self, ray: &Ray) -> Intersection {
        BvhAccel::intersect(self, ray)
    }

    fn intersect_p(&self, ray: &Ray) -> bool {
        BvhAccel::intersect_p(self, ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_scenes, PrimitiveList, SplitMethod, Triangle};
    use arbor_math::Vec3;
    use rand::{rngs::StdRng, SeedableRng};

    fn config(split_method: SplitMethod, max_prims_in_node: usize) -> BvhConfig {
        BvhConfig::new()
            .with_split_method(split_method)
            .with_max_prims_in_node(max_prims_in_node)
    }

    /// Walk the tree and check every node's bounds equal the union of the
    /// primitive bounds beneath it. Returns that union.
    fn check_node_bounds<P: Primitive + ?Sized>(bvh: &BvhAccel<'_, P>, id: NodeId) -> Bounds3 {
        let node = bvh.node(id).unwrap();
        let expected: Bounds3 = match *node {
            BvhNode::Leaf { .. } => bvh
                .leaf_primitives(node)
                .iter()
                .map(|&i| bvh.primitives()[i].bounds())
                .collect(),
            BvhNode::Interior { left, right, .. } => {
                let l = check_node_bounds(bvh, left);
                let r = check_node_bounds(bvh, right);
                l.union(&r)
            }
        };
        assert_eq!(node.bounds(), expected, "node {id:?} bounds are not tight");
        expected
    }

    /// Hit distance must agree; a different primitive is only acceptable
    /// when it is hit at the same distance (shared edges, overlaps).
    fn assert_same_hit(ray: &Ray, actual: &Intersection, expected: &Intersection, tris: &[Triangle]) {
        assert_eq!(actual.happened, expected.happened, "ray {ray:?}");
        if !expected.happened {
            return;
        }

        let tolerance = 1e-4 * expected.t.max(1.0);
        assert!(
            (actual.t - expected.t).abs() <= tolerance,
            "t mismatch for {ray:?}: {} vs {}",
            actual.t,
            expected.t
        );
        if actual.primitive != expected.primitive {
            let other = tris[actual.primitive.unwrap()].intersect(ray);
            assert!(other.happened && (other.t - expected.t).abs() <= tolerance);
        }
    }

    #[test]
    fn test_bvh_empty() {
        let _ = env_logger::builder().is_test(true).try_init();
        let tris: Vec<Triangle> = Vec::new();
        let bvh = BvhAccel::new(tris.iter(), BvhConfig::default()).unwrap();

        assert!(bvh.is_empty());
        assert!(bvh.root().is_none());
        assert!(bvh.world_bound().is_empty());

        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(!bvh.intersect(&ray).happened);
        assert!(!bvh.intersect_p(&ray));
    }

    #[test]
    fn test_bvh_rejects_invalid_config() {
        let tris = [test_scenes::unit_triangle()];
        let err = BvhAccel::new(tris.iter(), BvhConfig::new().with_max_prims_in_node(0))
            .err()
            .unwrap();
        assert_eq!(err, BvhError::Config(ConfigError::ZeroLeafSize));
    }

    #[test]
    fn test_bvh_rejects_non_finite_bounds() {
        let tris = [
            test_scenes::unit_triangle(),
            Triangle::new(Vec3::ZERO, Vec3::new(f32::INFINITY, 0.0, 0.0), Vec3::Y),
        ];
        let err = BvhAccel::new(tris.iter(), BvhConfig::default()).err().unwrap();
        assert_eq!(err, BvhError::NonFiniteBounds(1));
    }

    #[test]
    fn test_bvh_single_triangle() {
        let tris = [test_scenes::unit_triangle()];
        let bvh = BvhAccel::new(tris.iter(), BvhConfig::default()).unwrap();

        let root = bvh.root().unwrap();
        assert!(bvh.node(root).unwrap().is_leaf());
        assert_eq!(bvh.world_bound(), tris[0].bounds());

        let rec = bvh.intersect(&Ray::new(Vec3::new(0.2, 0.2, -1.0), Vec3::Z));
        assert!(rec.happened);
        assert!((rec.t - 1.0).abs() < 1e-5);
        assert_eq!(rec.primitive, Some(0));
        assert!(rec.uv.x >= 0.0 && rec.uv.y >= 0.0 && rec.uv.x + rec.uv.y <= 1.0);

        let miss = Ray::new(Vec3::new(2.0, 2.0, -1.0), Vec3::Z);
        assert!(!bvh.intersect(&miss).happened);
        assert!(!bvh.intersect_p(&miss));
    }

    #[test]
    fn test_bvh_two_disjoint_triangles() {
        let a = test_scenes::unit_triangle();
        let b = Triangle::new(
            Vec3::new(100.0, 100.0, 100.0),
            Vec3::new(101.0, 100.0, 100.0),
            Vec3::new(100.0, 101.0, 100.0),
        );
        let tris = [a, b];

        for method in [SplitMethod::Naive, SplitMethod::Sah] {
            let bvh = BvhAccel::new(tris.iter(), config(method, 1)).unwrap();
            assert_eq!(bvh.report().interior_nodes, 1);
            assert_eq!(bvh.report().leaf_nodes, 2);
            assert_eq!(bvh.nodes().len(), 3);

            let root = bvh.node(bvh.root().unwrap()).unwrap();
            assert!(!root.is_leaf());
            assert_eq!(root.bounds(), a.bounds().union(&b.bounds()));

            let far_hit = bvh.intersect(&Ray::new(Vec3::new(100.2, 100.2, 0.0), Vec3::Z));
            assert_eq!(far_hit.primitive, Some(1));
            assert!((far_hit.t - 100.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_bvh_node_bounds_are_tight() {
        let mut rng = StdRng::seed_from_u64(7);
        let tris = test_scenes::random_triangles(&mut rng, 500);

        for method in [SplitMethod::Naive, SplitMethod::Sah] {
            for max_prims in [1, 4] {
                let bvh = BvhAccel::new(tris.iter(), config(method, max_prims)).unwrap();
                let total = check_node_bounds(&bvh, bvh.root().unwrap());
                assert_eq!(total, bvh.world_bound());
            }
        }
    }

    #[test]
    fn test_bvh_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(42);
        let tris = test_scenes::random_triangles(&mut rng, 300);
        let reference: PrimitiveList<'_, Triangle> = tris.iter().collect();
        let mut rays = test_scenes::random_rays(&mut rng, 2000);
        rays.extend(test_scenes::edge_rays(&mut rng, &tris, 2000));

        for method in [SplitMethod::Naive, SplitMethod::Sah] {
            for max_prims in [1, 3] {
                let bvh = BvhAccel::new(tris.iter(), config(method, max_prims)).unwrap();
                let mut hits = 0;
                for ray in &rays {
                    let expected = reference.intersect(ray);
                    let actual = bvh.intersect(ray);
                    assert_same_hit(ray, &actual, &expected, &tris);
                    hits += actual.happened as usize;
                }
                // Make sure the comparison is not vacuous
                assert!(hits > 100, "only {hits} rays hit");
            }
        }
    }

    #[test]
    fn test_bvh_keeps_edge_and_vertex_hits() {
        // Edge hits accepted by the triangle test must not be culled by the
        // tight node bounds
        let mut rng = StdRng::seed_from_u64(2024);
        let tris = test_scenes::random_triangles(&mut rng, 300);
        let reference: PrimitiveList<'_, Triangle> = tris.iter().collect();
        let rays = test_scenes::edge_rays(&mut rng, &tris, 20_000);

        for method in [SplitMethod::Naive, SplitMethod::Sah] {
            for max_prims in [1, 4] {
                let bvh = BvhAccel::new(tris.iter(), config(method, max_prims)).unwrap();
                let mut hits = 0;
                for ray in &rays {
                    let expected = reference.intersect(ray);
                    let actual = bvh.intersect(ray);
                    assert_same_hit(ray, &actual, &expected, &tris);
                    assert_eq!(bvh.intersect_p(ray), expected.happened, "ray {ray:?}");
                    hits += actual.happened as usize;
                }
                assert!(hits > rays.len() / 5, "only {hits} edge rays hit");
            }
        }
    }

    #[test]
    fn test_bvh_vertex_shared_by_mesh_triangles() {
        // A fan of triangles around one vertex: a ray through the shared
        // vertex or along a shared edge must not slip through the cracks
        let center = Vec3::new(3.1, -2.7, 5.3);
        let rim: Vec<Vec3> = (0..8)
            .map(|i| {
                let angle = i as f32 * std::f32::consts::TAU / 8.0;
                center + Vec3::new(angle.cos(), angle.sin(), 0.1 * (i % 3) as f32)
            })
            .collect();
        let tris: Vec<Triangle> = (0..8)
            .map(|i| Triangle::new(center, rim[i], rim[(i + 1) % 8]))
            .collect();
        let reference: PrimitiveList<'_, Triangle> = tris.iter().collect();
        let bvh = BvhAccel::new(tris.iter(), BvhConfig::default()).unwrap();

        let origins = [
            Vec3::new(-7.3, 4.1, -6.2),
            Vec3::new(11.9, -9.4, 13.7),
            Vec3::new(2.2, 8.8, -14.1),
        ];
        for origin in origins {
            for target in std::iter::once(center).chain(rim.iter().map(|&r| center + (r - center) * 0.37)) {
                let ray = Ray::new(origin, target - origin);
                let expected = reference.intersect(&ray);
                assert_same_hit(&ray, &bvh.intersect(&ray), &expected, &tris);
            }
        }
    }

    #[test]
    fn test_node_lookup_outside_arena() {
        let tris = [test_scenes::unit_triangle()];
        let bvh = BvhAccel::new(tris.iter(), BvhConfig::default()).unwrap();
        assert!(bvh.node(NodeId::new(0)).is_some());
        assert!(bvh.node(NodeId::new(1)).is_none());

        // Ids are plain arena indices and never truncate
        assert_eq!(NodeId::new(usize::MAX).index(), usize::MAX);
    }

    #[test]
    fn test_sah_and_naive_agree() {
        let mut rng = StdRng::seed_from_u64(1234);
        let tris = test_scenes::random_triangles(&mut rng, 1000);
        let rays = test_scenes::random_rays(&mut rng, 10_000);

        let naive = BvhAccel::new(tris.iter(), config(SplitMethod::Naive, 1)).unwrap();
        let sah = BvhAccel::new(tris.iter(), config(SplitMethod::Sah, 4)).unwrap();

        let naive_hits = naive.intersect_batch(&rays);
        let sah_hits = sah.intersect_batch(&rays);
        for ((ray, a), b) in rays.iter().zip(&naive_hits).zip(&sah_hits) {
            assert_same_hit(ray, b, a, &tris);
        }
    }

    #[test]
    fn test_intersect_p_consistent_with_intersect() {
        let mut rng = StdRng::seed_from_u64(99);
        let tris = test_scenes::random_triangles(&mut rng, 400);
        let mut rays = test_scenes::random_rays(&mut rng, 3000);
        rays.extend(test_scenes::edge_rays(&mut rng, &tris, 3000));

        for method in [SplitMethod::Naive, SplitMethod::Sah] {
            let bvh = BvhAccel::new(tris.iter(), config(method, 2)).unwrap();
            for ray in &rays {
                assert_eq!(bvh.intersect_p(ray), bvh.intersect(ray).happened);
            }
        }
    }

    #[test]
    fn test_intersect_batch_preserves_order() {
        let mut rng = StdRng::seed_from_u64(5);
        let tris = test_scenes::random_triangles(&mut rng, 200);
        let rays = test_scenes::random_rays(&mut rng, 500);
        let bvh = BvhAccel::new(tris.iter(), BvhConfig::default()).unwrap();

        let batch = bvh.intersect_batch(&rays);
        assert_eq!(batch.len(), rays.len());
        for (ray, rec) in rays.iter().zip(&batch) {
            assert_eq!(*rec, bvh.intersect(ray));
        }
    }

    #[test]
    fn test_naive_depth_bound() {
        let mut rng = StdRng::seed_from_u64(3);
        let tris = test_scenes::random_triangles(&mut rng, 1000);
        let bvh = BvhAccel::new(tris.iter(), config(SplitMethod::Naive, 1)).unwrap();
        // ceil(log2(1000)) = 10
        assert!(bvh.depth() <= 10, "depth {}", bvh.depth());
        assert_eq!(bvh.report().leaf_nodes, 1000);
    }

    #[test]
    fn test_duplicate_triangles_terminate() {
        let tris = vec![test_scenes::unit_triangle(); 64];
        let bvh = BvhAccel::new(tris.iter(), config(SplitMethod::Sah, 1)).unwrap();
        assert!(bvh.depth() <= 64);
        assert_eq!(bvh.report().leaf_nodes, 64);

        let rec = bvh.intersect(&Ray::new(Vec3::new(0.2, 0.2, -1.0), Vec3::Z));
        assert!(rec.happened);
        assert!((rec.t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_equal_distance_prefers_left_child() {
        // Two coplanar, overlapping triangles whose bounds share a centroid:
        // the split falls on z and every ray through the overlap hits both
        // at exactly the same t
        let small = test_scenes::unit_triangle();
        let big = Triangle::new(
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(1.5, -0.5, 0.0),
            Vec3::new(-0.5, 1.5, 0.0),
        );
        let tris = [small, big];
        let bvh = BvhAccel::new(tris.iter(), BvhConfig::default()).unwrap();

        let root = bvh.node(bvh.root().unwrap()).unwrap();
        let BvhNode::Interior {
            left, split_axis, ..
        } = *root
        else {
            panic!("expected interior root");
        };
        assert_eq!(split_axis, 2);
        let left_index = bvh.leaf_primitives(bvh.node(left).unwrap())[0];

        // From both sides, so the left child is the near child once and the far child once
        for dir in [Vec3::Z, -Vec3::Z] {
            let origin = Vec3::new(0.2, 0.2, 0.0) - dir;
            let rec = bvh.intersect(&Ray::new(origin, dir));
            assert!(rec.happened);
            assert_eq!(rec.t, 1.0);
            assert_eq!(rec.primitive, Some(left_index), "direction {dir}");
        }
    }

    #[test]
    fn test_bvh_parallel_rays() {
        // Axis-aligned triangle in the z = 0 plane
        let tris = [test_scenes::unit_triangle()];
        let bvh = BvhAccel::new(tris.iter(), BvhConfig::default()).unwrap();

        // Parallel to the flat box, inside the plane
        assert!(!bvh.intersect(&Ray::new(Vec3::new(-1.0, 0.2, 0.0), Vec3::X)).happened);
        // Parallel, outside the slab
        assert!(!bvh.intersect(&Ray::new(Vec3::new(-1.0, 0.2, 0.5), Vec3::X)).happened);
        assert!(!bvh.intersect_p(&Ray::new(Vec3::new(-1.0, 0.2, 0.5), Vec3::X)));
    }

    #[test]
    fn test_bvh_nests_as_primitive() {
        let mut rng = StdRng::seed_from_u64(11);
        let near = test_scenes::random_triangles(&mut rng, 50);
        let inner = BvhAccel::new(near.iter(), BvhConfig::default()).unwrap();
        let far = test_scenes::unit_triangle();

        let objects: Vec<&dyn Primitive> = vec![&inner, &far];
        let outer = BvhAccel::new(objects, BvhConfig::default()).unwrap();
        assert_eq!(outer.len(), 2);
        assert_eq!(outer.world_bound(), inner.world_bound().union(&far.bounds()));

        let rays = test_scenes::random_rays(&mut rng, 200);
        for ray in &rays {
            let expected = inner.intersect(ray).nearer(far.intersect(ray));
            assert_eq!(outer.intersect(ray).happened, expected.happened);
        }
    }
}
