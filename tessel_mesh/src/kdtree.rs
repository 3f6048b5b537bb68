use glam::Vec3;

const LEAF_SIZE: usize = 8;

enum KdNode {
    Leaf { start: usize, count: usize },
    // the left child always directly follows its parent
    Split { axis: usize, split: f32, right: usize },
}

/// Static kd-tree over points, used to find the closest remaining triangle
/// once a meshlet runs out of connected neighbours.
pub(crate) struct KdTree {
    nodes: Vec<KdNode>,
    items: Vec<u32>,
}

impl KdTree {
    pub fn build(points: &[Vec3]) -> Self {
        let mut items: Vec<u32> = (0..points.len() as u32).collect();
        let mut nodes = Vec::new();
        if !items.is_empty() {
            build_node(&mut nodes, points, &mut items, 0);
        }
        Self { nodes, items }
    }

    /// Closest point to `position` for which `skip` returns false.
    pub fn nearest(
        &self,
        points: &[Vec3],
        position: Vec3,
        skip: impl Fn(u32) -> bool,
    ) -> Option<u32> {
        let mut best = None;
        let mut best_distance = f32::MAX;
        if !self.nodes.is_empty() {
            self.nearest_node(0, points, position, &skip, &mut best, &mut best_distance);
        }
        best
    }

    fn nearest_node(
        &self,
        node: usize,
        points: &[Vec3],
        position: Vec3,
        skip: &impl Fn(u32) -> bool,
        best: &mut Option<u32>,
        best_distance: &mut f32,
    ) {
        match self.nodes[node] {
            KdNode::Leaf { start, count } => {
                for &item in &self.items[start..start + count] {
                    if skip(item) {
                        continue;
                    }
                    let distance = points[item as usize].distance_squared(position);
                    // infinite or NaN distances still yield a result
                    if best.is_none() || distance < *best_distance {
                        *best = Some(item);
                        *best_distance = distance;
                    }
                }
            }
            KdNode::Split { axis, split, right } => {
                let delta = position[axis] - split;
                let (first, second) = if delta <= 0.0 {
                    (node + 1, right)
                } else {
                    (right, node + 1)
                };
                self.nearest_node(first, points, position, skip, best, best_distance);
                if best.is_none() || delta * delta <= *best_distance {
                    self.nearest_node(second, points, position, skip, best, best_distance);
                }
            }
        }
    }
}

fn build_node(nodes: &mut Vec<KdNode>, points: &[Vec3], items: &mut [u32], offset: usize) {
    let index = nodes.len();
    if items.len() <= LEAF_SIZE {
        nodes.push(KdNode::Leaf {
            start: offset,
            count: items.len(),
        });
        return;
    }

    // split at the mean of the axis with the largest variance
    let count = items.len() as f32;
    let mean = items.iter().map(|&i| points[i as usize]).sum::<Vec3>() / count;
    let variance = items
        .iter()
        .map(|&i| {
            let d = points[i as usize] - mean;
            d * d
        })
        .sum::<Vec3>();
    let axis = if variance.x >= variance.y && variance.x >= variance.z {
        0
    } else if variance.y >= variance.z {
        1
    } else {
        2
    };
    let split = mean[axis];

    let mut middle = 0;
    for i in 0..items.len() {
        if points[items[i] as usize][axis] < split {
            items.swap(i, middle);
            middle += 1;
        }
    }

    // coincident points cannot be separated
    if middle == 0 || middle == items.len() {
        nodes.push(KdNode::Leaf {
            start: offset,
            count: items.len(),
        });
        return;
    }

    nodes.push(KdNode::Split {
        axis,
        split,
        right: 0,
    });
    let (left, right) = items.split_at_mut(middle);
    build_node(nodes, points, left, offset);
    let right_index = nodes.len();
    if let KdNode::Split { right, .. } = &mut nodes[index] {
        *right = right_index;
    }
    build_node(nodes, points, right, offset + middle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_matches_linear_scan() {
        let points: Vec<Vec3> = (0..200)
            .map(|i| {
                let i = i as f32;
                Vec3::new((i * 7.3) % 13.0, (i * 3.1) % 5.0, (i * 1.7) % 11.0)
            })
            .collect();
        let tree = KdTree::build(&points);

        for query in [Vec3::ZERO, Vec3::new(6.0, 2.5, 5.0), Vec3::splat(20.0)] {
            let skip = |i: u32| i % 3 == 0;
            let expected = (0..points.len() as u32)
                .filter(|&i| !skip(i))
                .min_by(|&a, &b| {
                    let da = points[a as usize].distance_squared(query);
                    let db = points[b as usize].distance_squared(query);
                    da.total_cmp(&db)
                })
                .unwrap();
            let found = tree.nearest(&points, query, skip).unwrap();
            assert_eq!(
                points[found as usize].distance_squared(query),
                points[expected as usize].distance_squared(query)
            );
        }
    }

    #[test]
    fn test_unbounded_distances() {
        let points: Vec<Vec3> = (0..20).map(|i| Vec3::splat(i as f32 * 1e19)).collect();
        let tree = KdTree::build(&points);
        // squared distances overflow to infinity
        assert!(tree.nearest(&points, Vec3::splat(-1e30), |_| false).is_some());
        assert!(tree.nearest(&points, Vec3::NAN, |i| i != 7).is_some());
    }

    #[test]
    fn test_everything_skipped() {
        let points = vec![Vec3::ZERO; 20];
        let tree = KdTree::build(&points);
        assert_eq!(tree.nearest(&points, Vec3::ONE, |_| true), None);
        assert!(tree.nearest(&points, Vec3::ONE, |_| false).is_some());
    }
}
