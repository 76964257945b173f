use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 12;
const MAX_DEPTH: usize = 10;

#[derive(Clone, Copy)]
struct CellBounds {
    center: Vec2,
    half_extent: f32,
}

impl CellBounds {
    fn from_points(positions: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for point in positions {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        let center = (min + max) * 0.5;
        let span_x = (max.x - min.x).max(0.001);
        let span_y = (max.y - min.y).max(0.001);

        Some(Self {
            center,
            half_extent: (span_x.max(span_y) * 0.5) + 0.001,
        })
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let offset = match quadrant {
            0 => vec2(-quarter, -quarter),
            1 => vec2(quarter, -quarter),
            2 => vec2(-quarter, quarter),
            _ => vec2(quarter, quarter),
        };

        Self {
            center: self.center + offset,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, point: Vec2) -> usize {
        let right = point.x >= self.center.x;
        let lower = point.y >= self.center.y;
        match (right, lower) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    fn distance_sq_to(self, other: Self) -> f32 {
        let dx = (self.center.x - other.center.x).abs() - (self.half_extent + other.half_extent);
        let dy = (self.center.y - other.center.y).abs() - (self.half_extent + other.half_extent);
        let dx = dx.max(0.0);
        let dy = dy.max(0.0);
        (dx * dx) + (dy * dy)
    }
}

struct CollideNode {
    bounds: CellBounds,
    indices: Vec<usize>,
    children: [Option<Box<CollideNode>>; 4],
}

impl CollideNode {
    fn build(positions: &[Vec2]) -> Option<Self> {
        let bounds = CellBounds::from_points(positions)?;
        let indices = (0..positions.len()).collect::<Vec<_>>();
        Some(Self::build_node(bounds, indices, positions, 0))
    }

    fn build_node(
        bounds: CellBounds,
        indices: Vec<usize>,
        positions: &[Vec2],
        depth: usize,
    ) -> Self {
        let mut node = Self {
            bounds,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= MAX_DEPTH || node.indices.len() <= LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            buckets[bounds.quadrant_for(positions[index])].push(index);
        }

        let non_empty = buckets.iter().filter(|bucket| !bucket.is_empty()).count();
        if non_empty <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            node.children[quadrant] = Some(Box::new(Self::build_node(
                bounds.child(quadrant),
                bucket,
                positions,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}

#[derive(Clone, Copy)]
struct PushParams {
    strength: f32,
    max_pair_distance_sq: f32,
}

pub(super) fn accumulate_collisions(
    positions: &[Vec2],
    radii: &[f32],
    strength: f32,
    pushes: &mut [Vec2],
) {
    let Some(tree) = CollideNode::build(positions) else {
        return;
    };

    let max_radius = radii.iter().copied().fold(0.0_f32, f32::max);
    let max_pair_distance = max_radius * 2.0;
    if max_pair_distance <= 0.0 {
        return;
    }

    let params = PushParams {
        strength,
        max_pair_distance_sq: max_pair_distance * max_pair_distance,
    };
    accumulate_pairs(&tree, &tree, true, positions, radii, params, pushes);
}

fn push_pair(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    params: PushParams,
    pushes: &mut [Vec2],
) {
    let delta = positions[from] - positions[to];
    let distance_sq = delta.length_sq();
    let min_distance = radii[from] + radii[to];
    if distance_sq >= min_distance * min_distance {
        return;
    }

    let distance = distance_sq.sqrt();
    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        let angle =
            ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
        vec2(angle.cos(), angle.sin())
    };

    let overlap_push = (min_distance - distance) * params.strength * 0.5;
    pushes[from] += direction * overlap_push;
    pushes[to] -= direction * overlap_push;
}

fn accumulate_pairs(
    node_a: &CollideNode,
    node_b: &CollideNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: PushParams,
    pushes: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_pair_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for i in 0..node_a.indices.len() {
                for j in (i + 1)..node_a.indices.len() {
                    push_pair(
                        node_a.indices[i],
                        node_a.indices[j],
                        positions,
                        radii,
                        params,
                        pushes,
                    );
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    push_pair(from, to, positions, radii, params, pushes);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_pairs(child_a, child_a, true, positions, radii, params, pushes);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_pairs(child_a, child_b, false, positions, radii, params, pushes);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_pairs(child, node_b, false, positions, radii, params, pushes);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_pairs(node_a, child, false, positions, radii, params, pushes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_pair_pushes_apart() {
        let positions = vec![vec2(0.0, 0.0), vec2(0.5, 0.0)];
        let radii = vec![1.0, 1.0];
        let mut pushes = vec![Vec2::ZERO; 2];

        accumulate_collisions(&positions, &radii, 1.0, &mut pushes);

        assert!(pushes[0].x < 0.0);
        assert!(pushes[1].x > 0.0);
        assert!((pushes[0].x + pushes[1].x).abs() < 1e-5);
    }

    #[test]
    fn separated_pair_is_untouched() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let radii = vec![1.0, 1.0];
        let mut pushes = vec![Vec2::ZERO; 2];

        accumulate_collisions(&positions, &radii, 1.0, &mut pushes);

        assert_eq!(pushes[0], Vec2::ZERO);
        assert_eq!(pushes[1], Vec2::ZERO);
    }

    #[test]
    fn coincident_points_get_a_deterministic_direction() {
        let positions = vec![vec2(1.0, 1.0); 2];
        let radii = vec![0.5, 0.5];
        let mut pushes = vec![Vec2::ZERO; 2];

        accumulate_collisions(&positions, &radii, 1.0, &mut pushes);

        assert!(pushes[0].length() > 0.0);
        assert!(pushes[1].length() > 0.0);
    }

    #[test]
    fn dense_cluster_all_points_receive_pushes() {
        let positions = (0..64)
            .map(|i| vec2((i % 8) as f32 * 0.1, (i / 8) as f32 * 0.1))
            .collect::<Vec<_>>();
        let radii = vec![0.2; 64];
        let mut pushes = vec![Vec2::ZERO; 64];

        accumulate_collisions(&positions, &radii, 1.0, &mut pushes);

        let moved = pushes.iter().filter(|push| push.length() > 0.0).count();
        assert!(moved > 60);
    }
}
