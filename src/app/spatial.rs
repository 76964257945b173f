use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 12;
const MAX_DEPTH: usize = 12;

#[derive(Clone, Copy)]
pub(in crate::app) struct QuadBounds {
    pub(in crate::app) center: Vec2,
    pub(in crate::app) half_extent: f32,
}

impl QuadBounds {
    fn from_extent(min: Vec2, max: Vec2) -> Option<Self> {
        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        let center = (min + max) * 0.5;
        let span_x = (max.x - min.x).max(1.0);
        let span_y = (max.y - min.y).max(1.0);

        Some(Self {
            center,
            half_extent: (span_x.max(span_y) * 0.5) + 1.0,
        })
    }

    pub(in crate::app) fn contains(self, point: Vec2) -> bool {
        let min = self.center - vec2(self.half_extent, self.half_extent);
        let max = self.center + vec2(self.half_extent, self.half_extent);
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
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

    fn distance_sq_to_point(self, point: Vec2) -> f32 {
        let dx = ((point.x - self.center.x).abs() - self.half_extent).max(0.0);
        let dy = ((point.y - self.center.y).abs() - self.half_extent).max(0.0);
        (dx * dx) + (dy * dy)
    }
}

struct QuadNode {
    bounds: QuadBounds,
    entries: Vec<(u32, Vec2)>,
    children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    fn new(bounds: QuadBounds) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: std::array::from_fn(|_| None),
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }

    fn insert(&mut self, id: u32, pos: Vec2, depth: usize) {
        if self.is_leaf() {
            if self.entries.len() < LEAF_CAPACITY || depth >= MAX_DEPTH {
                self.entries.push((id, pos));
                return;
            }

            let entries = std::mem::take(&mut self.entries);
            for (entry_id, entry_pos) in entries {
                self.insert_into_child(entry_id, entry_pos, depth);
            }
        }

        self.insert_into_child(id, pos, depth);
    }

    fn insert_into_child(&mut self, id: u32, pos: Vec2, depth: usize) {
        let quadrant = self.bounds.quadrant_for(pos);
        let child = self.children[quadrant]
            .get_or_insert_with(|| Box::new(Self::new(self.bounds.child(quadrant))));
        child.insert(id, pos, depth + 1);
    }

    fn nearest<F: Fn(u32) -> bool>(&self, target: Vec2, best: &mut Option<NearestHit>, accept: &F) {
        for &(id, pos) in &self.entries {
            if !accept(id) {
                continue;
            }

            let distance_sq = (pos - target).length_sq();
            if best
                .as_ref()
                .is_none_or(|hit| distance_sq < hit.distance_sq)
            {
                *best = Some(NearestHit {
                    id,
                    pos,
                    distance_sq,
                });
            }
        }

        let mut order = [0usize, 1, 2, 3];
        order.sort_by(|&a, &b| {
            let da = self.children[a]
                .as_ref()
                .map_or(f32::INFINITY, |child| {
                    child.bounds.distance_sq_to_point(target)
                });
            let db = self.children[b]
                .as_ref()
                .map_or(f32::INFINITY, |child| {
                    child.bounds.distance_sq_to_point(target)
                });
            da.total_cmp(&db)
        });

        for quadrant in order {
            let Some(child) = self.children[quadrant].as_ref() else {
                continue;
            };

            if best
                .as_ref()
                .is_some_and(|hit| child.bounds.distance_sq_to_point(target) > hit.distance_sq)
            {
                continue;
            }

            child.nearest(target, best, accept);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NearestHit {
    pub id: u32,
    pub pos: Vec2,
    distance_sq: f32,
}

pub(in crate::app) struct IndexCell {
    pub center: Vec2,
    pub half_extent: f32,
    pub depth: usize,
    pub is_leaf: bool,
}

pub struct SpatialIndex {
    root: Option<QuadNode>,
    len: usize,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    pub fn with_bounds(x_range: [f32; 2], y_range: [f32; 2]) -> Self {
        let bounds = QuadBounds::from_extent(
            vec2(x_range[0], y_range[0]),
            vec2(x_range[1], y_range[1]),
        );

        Self {
            root: bounds.map(QuadNode::new),
            len: 0,
        }
    }

    pub fn rebuild(entries: impl Iterator<Item = (u32, Vec2)> + Clone) -> Self {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for (_, pos) in entries.clone() {
            min.x = min.x.min(pos.x);
            min.y = min.y.min(pos.y);
            max.x = max.x.max(pos.x);
            max.y = max.y.max(pos.y);
        }

        let Some(bounds) = QuadBounds::from_extent(min, max) else {
            return Self::new();
        };

        let mut index = Self {
            root: Some(QuadNode::new(bounds)),
            len: 0,
        };
        for (id, pos) in entries {
            index.insert(id, pos);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, id: u32, pos: Vec2) {
        if !pos.x.is_finite() || !pos.y.is_finite() {
            return;
        }

        match self.root.as_mut() {
            None => {
                let mut node = QuadNode::new(QuadBounds {
                    center: pos,
                    half_extent: 1.0,
                });
                node.insert(id, pos, 0);
                self.root = Some(node);
            }
            Some(_) => {
                self.expand_to_cover(pos);
                if let Some(root) = self.root.as_mut() {
                    root.insert(id, pos, 0);
                }
            }
        }

        self.len += 1;
    }

    fn expand_to_cover(&mut self, pos: Vec2) {
        loop {
            let Some(old) = self.root.take() else {
                return;
            };
            if old.bounds.contains(pos) {
                self.root = Some(old);
                return;
            }

            let grow_right = pos.x >= old.bounds.center.x;
            let grow_down = pos.y >= old.bounds.center.y;
            let shift = vec2(
                if grow_right {
                    old.bounds.half_extent
                } else {
                    -old.bounds.half_extent
                },
                if grow_down {
                    old.bounds.half_extent
                } else {
                    -old.bounds.half_extent
                },
            );

            let parent_bounds = QuadBounds {
                center: old.bounds.center + shift,
                half_extent: old.bounds.half_extent * 2.0,
            };
            let mut parent = QuadNode::new(parent_bounds);
            let quadrant = parent_bounds.quadrant_for(old.bounds.center);
            parent.children[quadrant] = Some(Box::new(old));
            self.root = Some(parent);
        }
    }

    pub fn nearest(&self, target: Vec2) -> Option<NearestHit> {
        self.nearest_where(target, |_| true)
    }

    pub fn nearest_where(&self, target: Vec2, accept: impl Fn(u32) -> bool) -> Option<NearestHit> {
        let root = self.root.as_ref()?;
        if self.len == 0 {
            return None;
        }

        let mut best = None;
        root.nearest(target, &mut best, &accept);
        best
    }

    pub(in crate::app) fn cells(&self, out: &mut Vec<IndexCell>) {
        out.clear();
        if let Some(root) = self.root.as_ref() {
            collect_cells(root, 0, out);
        }
    }
}

fn collect_cells(node: &QuadNode, depth: usize, out: &mut Vec<IndexCell>) {
    out.push(IndexCell {
        center: node.bounds.center,
        half_extent: node.bounds.half_extent,
        depth,
        is_leaf: node.is_leaf(),
    });

    for child in node.children.iter().flatten() {
        collect_cells(child, depth + 1, out);
    }
}
