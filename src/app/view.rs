use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{self, Align2, Color32, FontId, Rect, Sense, Stroke, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::data::{DataScales, GridData};

use super::render_utils::{
    base_point_radius, blend_color, circle_visible, citation_radius, dim_color, group_color,
    stroke_width,
};
use super::{DensityCell, RedrawPhase, SETTLE_DELAY_SECS, SearchMatchCache, ViewModel};

const BACKGROUND: Color32 = Color32::from_rgb(19, 23, 29);
const DENSITY_CELL_TARGET: usize = 96;
const DENSITY_FLOOR: f32 = 0.35;

pub(super) fn choose_topic_level(levels: &[u32], k: f32, k_min: f32, k_max: f32) -> Option<u32> {
    if levels.is_empty() {
        return None;
    }
    if levels.len() == 1 {
        return Some(levels[0]);
    }

    let k = k.clamp(k_min, k_max);
    let t = (k.ln() - k_min.ln()) / (k_max.ln() - k_min.ln());
    let index = (t * (levels.len() - 1) as f32).round() as usize;
    Some(levels[index.min(levels.len() - 1)])
}

pub(super) fn build_density_cells(grid: &GridData, scales: &DataScales) -> Vec<DensityCell> {
    let rows = grid.grid.len();
    if rows == 0 {
        return Vec::new();
    }
    let cols = grid.grid[0].len();
    if cols == 0 {
        return Vec::new();
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for row in &grid.grid {
        for &value in row {
            if value.is_finite() {
                min = min.min(value);
                max = max.max(value);
            }
        }
    }
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f32::EPSILON {
        return Vec::new();
    }

    let stride = (rows.max(cols)).div_ceil(DENSITY_CELL_TARGET).max(1);
    let span_x = grid.x_range[1] - grid.x_range[0];
    let span_y = grid.y_range[1] - grid.y_range[0];
    let cell_data_x = span_x * stride as f32 / cols as f32;
    let cell_data_y = span_y * stride as f32 / rows as f32;
    let world_half = vec2(
        cell_data_x * scales.world_per_data * 0.5,
        cell_data_y * scales.world_per_data * 0.5,
    );

    let mut cells = Vec::new();
    for row in (0..rows).step_by(stride) {
        for col in (0..cols).step_by(stride) {
            let value = grid.grid[row][col];
            if !value.is_finite() {
                continue;
            }

            let t = (value - min) / (max - min);
            if t < DENSITY_FLOOR {
                continue;
            }

            let strength = (t - DENSITY_FLOOR) / (1.0 - DENSITY_FLOOR);
            let alpha = (14.0 + strength * 66.0) as u8;
            let data_center = vec2(
                grid.x_range[0] + (col as f32 + 0.5) * span_x / cols as f32,
                grid.y_range[0] + (row as f32 + 0.5) * span_y / rows as f32,
            );

            cells.push(DensityCell {
                world_center: scales.to_world(data_center),
                world_half,
                color: Color32::from_rgba_unmultiplied(74, 112, 156, alpha),
            });
        }
    }

    cells
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl ViewModel {
    pub(super) fn rebuild_density_cells(&mut self) {
        self.density_cells = match (&self.grid, &self.scales) {
            (Some(grid), Some(scales)) => build_density_cells(grid, scales),
            _ => Vec::new(),
        };
    }

    fn update_screen_space(&mut self) {
        let count = self.points.len();
        let base = base_point_radius(count, self.last_rect.size());
        let k_growth = self.transform.k.powf(0.4);

        self.view_scratch.screen_positions.clear();
        self.view_scratch.screen_radii.clear();
        self.view_scratch.visible_indices.clear();
        self.view_scratch.visible_mask.clear();
        self.view_scratch.visible_mask.resize(count, false);

        let Some(scales) = self.scales else {
            self.visible_point_count = 0;
            return;
        };

        for (index, point) in self.points.iter().enumerate() {
            let screen = self.transform.apply(self.last_rect, scales.to_world(point.pos));
            let radius = (citation_radius(base, point.citations, self.max_citations) * k_growth)
                .clamp(base * 0.5, 46.0);
            self.view_scratch.screen_positions.push(screen);
            self.view_scratch.screen_radii.push(radius);

            if self.point_passes_filters(point) && circle_visible(self.last_rect, screen, radius) {
                self.view_scratch.visible_indices.push(index);
                self.view_scratch.visible_mask[index] = true;
            }
        }

        self.visible_point_count = self.view_scratch.visible_indices.len();
    }

    fn cached_search_matches(&mut self) -> Option<Arc<HashSet<u32>>> {
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(cached) = &self.search_match_cache
            && cached.point_revision == self.point_revision
            && cached.query == query
        {
            return Some(Arc::clone(&cached.matches));
        }

        let matcher = SkimMatcherV2::default();
        let matches = self
            .points
            .iter()
            .filter_map(|point| {
                let matched = fuzzy_match_score(&matcher, &point.name, query).is_some()
                    || fuzzy_match_score(&matcher, &point.interests, query).is_some()
                    || fuzzy_match_score(&matcher, &point.keywords, query).is_some();
                matched.then_some(point.id)
            })
            .collect::<HashSet<_>>();
        let matches = Arc::new(matches);

        self.search_match_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            point_revision: self.point_revision,
            matches: Arc::clone(&matches),
        });

        Some(matches)
    }

    pub(super) fn zoom_ended(&mut self, now: f64) {
        self.redraw_phase = RedrawPhase::Idle;
        self.run_detail_pass(now);
    }

    pub(super) fn run_detail_pass(&mut self, now: f64) {
        self.topic_level_current = self.grid.as_ref().and_then(|grid| {
            choose_topic_level(
                &grid.topic_levels(),
                self.transform.k,
                self.config.k_min,
                self.config.k_max,
            )
        });

        for index in [self.hovered, self.selected].into_iter().flatten() {
            if let Some(point) = self.points.get(index) {
                let url = point.image_url.clone();
                self.image_ratios.request(&url, &self.image_tx);
            }
        }

        self.update_hover(now);
        self.detail_dirty = false;
    }

    fn advance_redraw_phase(&mut self, gesture_active: bool, gesture_stopped: bool, now: f64) {
        match self.redraw_phase {
            RedrawPhase::Idle => {
                if gesture_active {
                    self.redraw_phase = RedrawPhase::Zooming;
                }
            }
            RedrawPhase::Zooming => {
                if gesture_stopped {
                    self.zoom_ended(now);
                } else if !gesture_active {
                    self.redraw_phase = RedrawPhase::Settling {
                        deadline: now + SETTLE_DELAY_SECS,
                    };
                }
            }
            RedrawPhase::Settling { deadline } => {
                if gesture_active {
                    self.redraw_phase = RedrawPhase::Zooming;
                } else if now >= deadline {
                    self.zoom_ended(now);
                }
            }
        }
    }

    pub(super) fn draw_map(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        let now = ui.ctx().input(|input| input.time);

        self.last_rect = rect;
        self.last_pointer = response.hover_pos();

        painter.rect_filled(rect, 0.0, BACKGROUND);

        let zoomed = self.handle_map_zoom(ui, rect, &response);
        let panned = self.handle_map_pan(&response);
        self.advance_redraw_phase(zoomed || panned, response.drag_stopped(), now);

        if self.show_density {
            for cell in &self.density_cells {
                let center = self.transform.apply(rect, cell.world_center);
                let half = cell.world_half * self.transform.k;
                let cell_rect = Rect::from_center_size(center, half * 2.0);
                if cell_rect.intersects(rect) {
                    painter.rect_filled(cell_rect, 0.0, cell.color);
                }
            }
        }

        let mut animating = false;
        if let Some(animation) = &self.animation {
            let sampled = animation.sampled_positions(now);
            let finished = animation.progress(now) >= 1.0;
            for (point, pos) in self.points.iter_mut().zip(&sampled) {
                point.pos = *pos;
            }
            if finished {
                self.finalize_animation();
            } else {
                animating = true;
            }
        }

        if self.detail_dirty && self.redraw_phase == RedrawPhase::Idle {
            self.run_detail_pass(now);
        }

        self.update_screen_space();
        self.update_hover(now);

        if response.clicked_by(egui::PointerButton::Primary) {
            self.handle_click(self.hovered);
        }

        let matches = self.cached_search_matches();
        let matches_active = matches.as_ref().is_some_and(|matches| !matches.is_empty());
        let line_width = stroke_width(self.transform.k) * self.transform.k;
        let mut selection_animating = false;

        for &index in &self.view_scratch.visible_indices {
            let point = &self.points[index];
            let position = self.view_scratch.screen_positions[index];
            let radius = self.view_scratch.screen_radii[index];

            let is_match = matches
                .as_ref()
                .is_some_and(|matches| matches.contains(&point.id));
            let base_color = group_color(self.group_index(point));
            let color = if is_match {
                blend_color(base_color, Color32::from_rgb(103, 196, 255), 0.68)
            } else if matches_active {
                dim_color(base_color, 0.38)
            } else {
                base_color
            };

            painter.circle_filled(position, radius, color);
            if radius > 1.5 {
                painter.circle_stroke(
                    position,
                    radius,
                    Stroke::new(line_width, Color32::from_rgba_unmultiplied(15, 15, 15, 190)),
                );
            }

            let is_selected = self.selected == Some(index);
            let is_hovered = self.hovered == Some(index);

            let selection_mix = ui
                .ctx()
                .animate_bool(ui.make_persistent_id(("point-selection", point.id)), is_selected);
            if selection_mix > 0.0 && selection_mix < 1.0 {
                selection_animating = true;
            }
            if selection_mix > 0.0 {
                painter.circle_stroke(
                    position,
                    radius + 2.0 + ((1.0 - selection_mix) * 5.0),
                    Stroke::new(
                        1.0 + selection_mix * 1.4,
                        Color32::from_rgba_unmultiplied(245, 206, 93, (60.0 + selection_mix * 180.0) as u8),
                    ),
                );
            }

            let hover_mix = ui
                .ctx()
                .animate_bool(ui.make_persistent_id(("point-hover", point.id)), is_hovered);
            if hover_mix > 0.0 && hover_mix < 1.0 {
                selection_animating = true;
            }
            if hover_mix > 0.0 {
                painter.circle_stroke(
                    position,
                    radius + 1.5,
                    Stroke::new(
                        1.0 + hover_mix,
                        Color32::from_rgba_unmultiplied(255, 164, 101, (hover_mix * 235.0) as u8),
                    ),
                );
            }
        }

        if self.show_topics
            && let (Some(grid), Some(scales), Some(level)) =
                (&self.grid, &self.scales, self.topic_level_current)
        {
            let font_size = (10.0 + self.transform.k.ln().max(0.0) * 1.5).clamp(10.0, 19.0);
            for marker in grid.topic_markers(level) {
                let world = scales.to_world(vec2(marker.0, marker.1));
                let screen = self.transform.apply(rect, world);
                if rect.contains(screen) {
                    painter.text(
                        screen,
                        Align2::CENTER_CENTER,
                        &marker.2,
                        FontId::proportional(font_size),
                        Color32::from_rgba_unmultiplied(222, 228, 235, 200),
                    );
                }
            }
        }

        if self.show_index_overlay {
            let mut cells = std::mem::take(&mut self.view_scratch.index_cells);
            self.spatial.cells(&mut cells);
            if let Some(scales) = self.scales {
                for cell in &cells {
                    let min = cell.center - vec2(cell.half_extent, cell.half_extent);
                    let max = cell.center + vec2(cell.half_extent, cell.half_extent);
                    let corners = [
                        vec2(min.x, min.y),
                        vec2(max.x, min.y),
                        vec2(max.x, max.y),
                        vec2(min.x, max.y),
                    ]
                    .map(|corner| self.transform.apply(rect, scales.to_world(corner)));

                    let alpha = if cell.is_leaf { 110 } else { 55 };
                    let width = (1.4_f32 - (cell.depth as f32 * 0.09_f32)).clamp(0.45_f32, 1.4_f32);
                    let stroke =
                        Stroke::new(width, Color32::from_rgba_unmultiplied(106, 198, 255, alpha));
                    painter.line_segment([corners[0], corners[1]], stroke);
                    painter.line_segment([corners[1], corners[2]], stroke);
                    painter.line_segment([corners[2], corners[3]], stroke);
                    painter.line_segment([corners[3], corners[0]], stroke);
                }
            }
            self.view_scratch.index_cells = cells;
        }

        if let Some(hovered) = self.hovered
            && self
                .view_scratch
                .visible_mask
                .get(hovered)
                .copied()
                .unwrap_or(false)
            && let Some(point) = self.points.get(hovered)
        {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });

            let anchor = self.view_scratch.screen_positions[hovered]
                + vec2(self.view_scratch.screen_radii[hovered] + 8.0, 0.0);
            let mut lines = vec![point.name.clone()];
            if !point.affiliation.is_empty() {
                lines.push(point.affiliation.clone());
            }
            if point.citations > 0 {
                lines.push(format!(
                    "{} citations",
                    crate::util::format_count(point.citations as usize)
                ));
            }

            let card_width = 200.0;
            let card_height = 8.0 + lines.len() as f32 * 16.0;
            let card = Rect::from_min_size(anchor, vec2(card_width, card_height));
            painter.rect_filled(card, 4.0, Color32::from_rgba_unmultiplied(30, 36, 44, 235));
            for (line_index, line) in lines.iter().enumerate() {
                painter.text(
                    card.left_top() + vec2(8.0, 5.0 + line_index as f32 * 16.0),
                    Align2::LEFT_TOP,
                    line,
                    FontId::proportional(12.5),
                    Color32::from_gray(235),
                );
            }
        }

        let repaint_needed = animating
            || !self.streaming_done
            || self.layout_running
            || selection_animating
            || self.hover_clear_deadline.is_some()
            || !matches!(self.redraw_phase, RedrawPhase::Idle);
        if repaint_needed {
            ui.ctx().request_repaint();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::data::parse_grid_json;

    use super::*;

    #[test]
    fn topic_level_tracks_zoom_scale() {
        let levels = vec![1, 2, 3, 4];
        assert_eq!(choose_topic_level(&levels, 0.1, 0.1, 40.0), Some(1));
        assert_eq!(choose_topic_level(&levels, 40.0, 0.1, 40.0), Some(4));
        assert_eq!(choose_topic_level(&levels, 1000.0, 0.1, 40.0), Some(4));
        assert!(choose_topic_level(&[], 1.0, 0.1, 40.0).is_none());
        assert_eq!(choose_topic_level(&[7], 1.0, 0.1, 40.0), Some(7));
    }

    #[test]
    fn density_cells_skip_sparse_regions() {
        let raw = r#"{
            "xRange": [0.0, 2.0],
            "yRange": [0.0, 2.0],
            "grid": [[-30.0, -30.0], [-30.0, 5.0]]
        }"#;
        let grid = parse_grid_json(raw).expect("grid parses");
        let scales = grid.scales();

        let cells = build_density_cells(&grid, &scales);
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn flat_density_grid_yields_no_cells() {
        let raw = r#"{
            "xRange": [0.0, 1.0],
            "yRange": [0.0, 1.0],
            "grid": [[1.0, 1.0], [1.0, 1.0]]
        }"#;
        let grid = parse_grid_json(raw).expect("grid parses");
        let scales = grid.scales();
        assert!(build_density_cells(&grid, &scales).is_empty());
    }

    #[test]
    fn empty_grid_yields_no_cells() {
        let raw = r#"{"xRange": [0.0, 1.0], "yRange": [0.0, 1.0]}"#;
        let grid = parse_grid_json(raw).expect("grid parses");
        let scales = grid.scales();
        assert!(build_density_cells(&grid, &scales).is_empty());
    }
}
