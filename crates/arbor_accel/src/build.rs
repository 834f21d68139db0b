//! Recursive BVH construction.
//!
//! The builder only sees primitive bounds. It partitions a working list of
//! primitive indices in place and emits nodes into an arena, children before
//! their parent. Leaves refer to contiguous runs of the partitioned index
//! list.

use crate::{
    bvh::{BvhNode, NodeId},
    BvhConfig, SplitMethod,
};
use arbor_math::{Bounds3, Vec3};
use std::{cmp::Ordering, time::Duration};

/// Estimated cost of visiting an interior node, relative to one primitive test.
const TRAVERSAL_COST: f32 = 0.125;

/// Summary of a finished build.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuildReport {
    pub primitives: usize,
    pub interior_nodes: usize,
    pub leaf_nodes: usize,
    /// Edges on the longest root-to-leaf path; 0 for a single leaf
    pub max_depth: usize,
    pub build_time: Duration,
}

impl BuildReport {
    pub fn total_nodes(&self) -> usize {
        self.interior_nodes + self.leaf_nodes
    }
}

/// Build output handed back to the accelerator.
pub(crate) struct BuiltTree {
    pub nodes: Vec<BvhNode>,
    pub ordered: Vec<usize>,
    pub root: Option<NodeId>,
    pub report: BuildReport,
}

/// Per-primitive data the build works on.
#[derive(Debug, Clone, Copy)]
struct PrimitiveInfo {
    index: usize,
    bounds: Bounds3,
    centroid: Vec3,
}

impl PrimitiveInfo {
    /// Order along `axis`, ties broken by original index so builds are reproducible.
    fn cmp_along(&self, other: &Self, axis: usize) -> Ordering {
        self.centroid[axis]
            .total_cmp(&other.centroid[axis])
            .then(self.index.cmp(&other.index))
    }
}

/// One SAH cell along the split axis.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    bounds: Bounds3,
    count: usize,
}

impl Default for Bucket {
    fn default() -> Self {
        Self {
            bounds: Bounds3::EMPTY,
            count: 0,
        }
    }
}

struct Builder<'c> {
    config: &'c BvhConfig,
    nodes: Vec<BvhNode>,
    ordered: Vec<usize>,
    report: BuildReport,
}

/// Build a tree over primitives with the given bounds.
///
/// `bounds[i]` is the bounding box of primitive `i`. Empty input gives an
/// empty tree.
pub(crate) fn build(bounds: &[Bounds3], config: &BvhConfig) -> BuiltTree {
    let mut infos: Vec<PrimitiveInfo> = bounds
        .iter()
        .enumerate()
        .map(|(index, b)| PrimitiveInfo {
            index,
            bounds: *b,
            centroid: b.centroid(),
        })
        .collect();

    let mut builder = Builder {
        config,
        // A binary tree with n single-primitive leaves has 2n - 1 nodes
        nodes: Vec::with_capacity((2 * infos.len()).saturating_sub(1)),
        ordered: Vec::with_capacity(infos.len()),
        report: BuildReport {
            primitives: infos.len(),
            ..BuildReport::default()
        },
    };

    let root = if infos.is_empty() {
        None
    } else {
        Some(builder.recursive_build(&mut infos, 0))
    };

    BuiltTree {
        nodes: builder.nodes,
        ordered: builder.ordered,
        root,
        report: builder.report,
    }
}

impl<'c> Builder<'c> {
    fn push(&mut self, node: BvhNode) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn leaf(&mut self, infos: &[PrimitiveInfo], depth: usize) -> NodeId {
        let bounds: Bounds3 = infos.iter().map(|p| p.bounds).collect();
        let first = self.ordered.len();
        self.ordered.extend(infos.iter().map(|p| p.index));

        self.report.leaf_nodes += 1;
        self.report.max_depth = self.report.max_depth.max(depth);

        self.push(BvhNode::Leaf {
            bounds,
            first,
            count: infos.len(),
        })
    }

    fn interior(&mut self, left: NodeId, right: NodeId, split_axis: usize) -> NodeId {
        let bounds = self.nodes[left.index()]
            .bounds()
            .union(&self.nodes[right.index()].bounds());

        self.report.interior_nodes += 1;

        self.push(BvhNode::Interior {
            bounds,
            left,
            right,
            split_axis,
        })
    }

    fn recursive_build(&mut self, infos: &mut [PrimitiveInfo], depth: usize) -> NodeId {
        let n = infos.len();

        if n == 1 {
            return self.leaf(infos, depth);
        }

        let centroid_bounds = infos
            .iter()
            .fold(Bounds3::EMPTY, |acc, p| acc.union_point(p.centroid));
        let axis = centroid_bounds.max_extent();

        // Two primitives always become two leaves; no partition search needed
        if n == 2 {
            infos.sort_by(|a, b| a.cmp_along(b, axis));
            let left = self.leaf(&infos[..1], depth + 1);
            let right = self.leaf(&infos[1..], depth + 1);
            return self.interior(left, right, axis);
        }

        let split = match self.config.split_method {
            SplitMethod::Naive => {
                if n <= self.config.max_prims_in_node {
                    None
                } else {
                    Some(median_split(infos, axis))
                }
            }
            SplitMethod::Sah => self.sah_split(infos, axis, &centroid_bounds),
        };

        let Some(mid) = split else {
            return self.leaf(infos, depth);
        };

        let (left_infos, right_infos) = infos.split_at_mut(mid);
        let left = self.recursive_build(left_infos, depth + 1);
        let right = self.recursive_build(right_infos, depth + 1);
        self.interior(left, right, axis)
    }

    /// Bucketed SAH partition along `axis`.
    ///
    /// Returns the split index into `infos` after partitioning, or `None`
    /// when a leaf is cheaper and allowed.
    fn sah_split(
        &self,
        infos: &mut [PrimitiveInfo],
        axis: usize,
        centroid_bounds: &Bounds3,
    ) -> Option<usize> {
        let n = infos.len();
        let may_be_leaf = n <= self.config.max_prims_in_node;

        // All centroids coincide: buckets cannot separate anything
        if centroid_bounds.p_max[axis] <= centroid_bounds.p_min[axis] {
            if may_be_leaf {
                return None;
            }
            log::debug!("SAH: {n} primitives share a centroid, forcing median split");
            return Some(median_split(infos, axis));
        }

        let bucket_count = self.config.sah_buckets;
        let bucket_of = |p: &PrimitiveInfo| -> usize {
            let offset = centroid_bounds.offset(p.centroid)[axis];
            ((bucket_count as f32 * offset) as usize).min(bucket_count - 1)
        };

        let mut buckets = vec![Bucket::default(); bucket_count];
        for p in infos.iter() {
            let b = &mut buckets[bucket_of(p)];
            b.count += 1;
            b.bounds = b.bounds.union(&p.bounds);
        }

        // costs[i] is the cost of splitting after bucket i
        let splits = bucket_count - 1;
        let mut costs = vec![0.0f32; splits];
        let mut counts_below = vec![0usize; splits];

        let mut count_below = 0;
        let mut bound_below = Bounds3::EMPTY;
        for i in 0..splits {
            bound_below = bound_below.union(&buckets[i].bounds);
            count_below += buckets[i].count;
            counts_below[i] = count_below;
            costs[i] += count_below as f32 * bound_below.surface_area();
        }

        let mut count_above = 0;
        let mut bound_above = Bounds3::EMPTY;
        for i in (1..=splits).rev() {
            bound_above = bound_above.union(&buckets[i].bounds);
            count_above += buckets[i].count;
            costs[i - 1] += count_above as f32 * bound_above.surface_area();
        }

        let best = (0..splits)
            .filter(|&i| counts_below[i] > 0 && counts_below[i] < n)
            .min_by(|&a, &b| costs[a].total_cmp(&costs[b]));

        let Some(best) = best else {
            return if may_be_leaf {
                None
            } else {
                Some(median_split(infos, axis))
            };
        };

        let node_area = infos
            .iter()
            .fold(Bounds3::EMPTY, |acc, p| acc.union(&p.bounds))
            .surface_area();
        let split_cost = if node_area > 0.0 {
            TRAVERSAL_COST + costs[best] / node_area
        } else {
            costs[best]
        };
        let leaf_cost = n as f32;

        if split_cost >= leaf_cost && may_be_leaf {
            log::debug!("SAH: leaf of {n} (split cost {split_cost:.3} >= {leaf_cost})");
            return None;
        }

        let mid = partition(infos, |p| bucket_of(p) <= best);
        if mid == 0 || mid == n {
            Some(median_split(infos, axis))
        } else {
            Some(mid)
        }
    }
}

/// Order `infos` around their median along `axis` and return the split index.
fn median_split(infos: &mut [PrimitiveInfo], axis: usize) -> usize {
    let mid = infos.len() / 2;
    infos.select_nth_unstable_by(mid, |a, b| a.cmp_along(b, axis));
    mid
}

/// Move every element satisfying `pred` to the front; returns how many did.
fn partition<F>(infos: &mut [PrimitiveInfo], pred: F) -> usize
where
    F: Fn(&PrimitiveInfo) -> bool,
{
    let mut mid = 0;
    for i in 0..infos.len() {
        if pred(&infos[i]) {
            infos.swap(i, mid);
            mid += 1;
        }
    }
    mid
}
