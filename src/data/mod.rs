mod grid;
mod record;

use eframe::egui::{Vec2, vec2};

pub use grid::{DensityGrid, GridData, TopicMarker, fetch_grid_data, parse_grid_json};
pub use record::{FALLBACK_IMAGE_URL, parse_record};

#[derive(Clone, Debug)]
pub struct Point {
    pub id: u32,
    pub pos: Vec2,
    pub raw: Vec2,
    pub name: String,
    pub interests: String,
    pub time: String,
    pub group: String,
    pub image_url: String,
    pub summary: String,
    pub citations: u32,
    pub scholar_url: String,
    pub keywords: String,
    pub affiliation: String,
    pub homepage: String,
    pub embedding: Vec<f32>,
}

pub const WORLD_SPAN: f32 = 1000.0;

#[derive(Clone, Copy, Debug)]
pub struct DataScales {
    pub x_domain: [f32; 2],
    pub y_domain: [f32; 2],
    pub world_per_data: f32,
    center: Vec2,
}

impl DataScales {
    pub fn from_ranges(x_domain: [f32; 2], y_domain: [f32; 2]) -> Self {
        let span_x = (x_domain[1] - x_domain[0]).max(f32::EPSILON);
        let span_y = (y_domain[1] - y_domain[0]).max(f32::EPSILON);

        Self {
            x_domain,
            y_domain,
            world_per_data: WORLD_SPAN / span_x.max(span_y),
            center: vec2(
                (x_domain[0] + x_domain[1]) * 0.5,
                (y_domain[0] + y_domain[1]) * 0.5,
            ),
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for point in points {
            min.x = min.x.min(point.raw.x);
            min.y = min.y.min(point.raw.y);
            max.x = max.x.max(point.raw.x);
            max.y = max.y.max(point.raw.y);
        }

        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        Some(Self::from_ranges([min.x, max.x], [min.y, max.y]))
    }

    pub fn to_world(&self, data: Vec2) -> Vec2 {
        let offset = (data - self.center) * self.world_per_data;
        vec2(offset.x, -offset.y)
    }

    pub fn from_world(&self, world: Vec2) -> Vec2 {
        self.center + vec2(world.x, -world.y) / self.world_per_data
    }
}
