use eframe::egui::{Color32, Pos2, Rect, Vec2};

pub(crate) const DEFAULT_K_MIN: f32 = 0.1;
pub(crate) const DEFAULT_K_MAX: f32 = 40.0;

pub(super) const BASE_RADIUS_MIN: f32 = 0.4;
pub(super) const BASE_RADIUS_MAX: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct ZoomTransform {
    pub k: f32,
    pub translate: Vec2,
}

impl ZoomTransform {
    pub(super) fn identity() -> Self {
        Self {
            k: 1.0,
            translate: Vec2::ZERO,
        }
    }

    pub(super) fn with_scale(self, k: f32, k_min: f32, k_max: f32) -> Self {
        Self {
            k: k.clamp(k_min, k_max),
            translate: self.translate,
        }
    }

    pub(super) fn apply(self, rect: Rect, world: Vec2) -> Pos2 {
        rect.center() + self.translate + world * self.k
    }

    pub(super) fn invert(self, rect: Rect, screen: Pos2) -> Vec2 {
        (screen - rect.center() - self.translate) / self.k
    }
}

pub(super) fn base_point_radius(point_count: usize, viewport: Vec2) -> f32 {
    let count = point_count.max(2) as f32;
    let extent = viewport.x.min(viewport.y).max(1.0);
    ((extent * 0.03) / count.ln()).clamp(BASE_RADIUS_MIN, BASE_RADIUS_MAX)
}

pub(super) fn citation_radius(base_radius: f32, citations: u32, max_citations: u32) -> f32 {
    if max_citations == 0 {
        return base_radius;
    }

    let t = ((citations.max(1) as f32).ln() / (max_citations.max(2) as f32).ln()).clamp(0.0, 1.0);
    base_radius * (0.75 + t * 0.75)
}

pub(super) fn stroke_width(k: f32) -> f32 {
    (1.0 / k.max(f32::EPSILON)).clamp(0.1, 2.0)
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

const GROUP_PALETTE: [Color32; 8] = [
    Color32::from_rgb(102, 170, 235),
    Color32::from_rgb(240, 147, 94),
    Color32::from_rgb(120, 200, 130),
    Color32::from_rgb(214, 120, 200),
    Color32::from_rgb(236, 200, 95),
    Color32::from_rgb(110, 210, 205),
    Color32::from_rgb(180, 140, 240),
    Color32::from_rgb(225, 110, 120),
];

pub(super) fn group_color(group_index: usize) -> Color32 {
    GROUP_PALETTE[group_index % GROUP_PALETTE.len()]
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}
