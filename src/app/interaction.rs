use eframe::egui::{self, Pos2, Rect, Ui};

use super::render_utils::{ZoomTransform, base_point_radius, citation_radius};
use super::{HOVER_CLEAR_DELAY_SECS, IndexerCommand, ViewModel};
use eframe::egui::Vec2;

const FIXED_MIN_HOVER_PX: f32 = 6.0;
const MAX_SCREEN_RADIUS: f32 = 46.0;

pub(super) fn zoomed(
    transform: ZoomTransform,
    rect: Rect,
    pointer: Pos2,
    zoom_factor: f32,
    k_min: f32,
    k_max: f32,
) -> ZoomTransform {
    let world_before = transform.invert(rect, pointer);
    let next = transform.with_scale(transform.k * zoom_factor, k_min, k_max);

    ZoomTransform {
        k: next.k,
        translate: pointer - rect.center() - world_before * next.k,
    }
}

pub(super) fn hover_threshold(point_radius: f32) -> f32 {
    FIXED_MIN_HOVER_PX.max(point_radius * 2.0)
}

pub(super) fn within_hover_threshold(distance: f32, point_radius: f32) -> bool {
    distance <= hover_threshold(point_radius)
}

impl ViewModel {
    pub(super) fn handle_map_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) -> bool {
        if !response.hovered() {
            return false;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return false;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.transform = zoomed(
            self.transform,
            rect,
            pointer,
            zoom_factor,
            self.config.k_min,
            self.config.k_max,
        );
        true
    }

    pub(super) fn handle_map_pan(&mut self, response: &egui::Response) -> bool {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.transform.translate += response.drag_delta();
            response.drag_delta() != Vec2::ZERO
        } else {
            false
        }
    }

    pub(super) fn point_screen_radius(&self, index: usize) -> f32 {
        let base = base_point_radius(self.points.len(), self.last_rect.size());
        let point = &self.points[index];
        (citation_radius(base, point.citations, self.max_citations)
            * self.transform.k.powf(0.4))
        .clamp(base * 0.5, MAX_SCREEN_RADIUS)
    }

    pub(super) fn update_hover(&mut self, now: f64) {
        let Some(pointer) = self.last_pointer else {
            self.apply_hover_result(None, now);
            return;
        };
        let Some(scales) = self.scales else {
            return;
        };

        let data = scales.from_world(self.transform.invert(self.last_rect, pointer));

        if !self.streaming_done {
            if !self.pending_indexer_search
                && self
                    .indexer_tx
                    .send(IndexerCommand::StartQuadtreeSearch {
                        x: data.x,
                        y: data.y,
                        time: self.time_filter.clone(),
                        group: self.group_filter.clone(),
                    })
                    .is_ok()
            {
                self.pending_indexer_search = true;
            }
            return;
        }

        let hit = self.spatial.nearest(data).map(|hit| (hit.id, hit.pos));
        self.resolve_hover_candidate(hit, now);
    }

    pub(super) fn resolve_hover_candidate(&mut self, hit: Option<(u32, Vec2)>, now: f64) {
        let accepted = hit.and_then(|(id, pos)| {
            let index = id as usize;
            if index >= self.points.len() || self.points[index].id != id {
                return None;
            }
            if !self.point_passes_filters(&self.points[index]) {
                return None;
            }

            let pointer = self.last_pointer?;
            let scales = self.scales?;
            let screen = self.transform.apply(self.last_rect, scales.to_world(pos));
            let distance = screen.distance(pointer);
            within_hover_threshold(distance, self.point_screen_radius(index)).then_some(index)
        });

        self.apply_hover_result(accepted, now);
    }

    fn apply_hover_result(&mut self, hit: Option<usize>, now: f64) {
        match hit {
            Some(index) => {
                self.hovered = Some(index);
                self.hover_clear_deadline = None;
            }
            None => {
                if self.hovered.is_none() {
                    self.hover_clear_deadline = None;
                    return;
                }

                let deadline = *self
                    .hover_clear_deadline
                    .get_or_insert(now + HOVER_CLEAR_DELAY_SECS);
                if now >= deadline {
                    self.hovered = None;
                    self.hover_clear_deadline = None;
                }
            }
        }
    }

    pub(super) fn handle_click(&mut self, clicked_index: Option<usize>) {
        let Some(index) = clicked_index else {
            return;
        };

        if self.selected == Some(index) {
            self.set_selected(None);
        } else {
            self.set_selected(Some(index));
        }
    }
}
