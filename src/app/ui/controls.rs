use eframe::egui::{self, Ui};

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Map Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Search (name, interests or keywords)");
        ui.text_edit_singleline(&mut self.search)
            .on_hover_text("Matching points light up; everything else dims.");

        ui.separator();

        let mut filters_changed = false;

        let times = self.times.clone();
        egui::ComboBox::from_label("Time slice")
            .selected_text(self.time_filter.as_deref().unwrap_or("all"))
            .show_ui(ui, |ui| {
                filters_changed |= ui
                    .selectable_value(&mut self.time_filter, None, "all")
                    .changed();
                for time in &times {
                    filters_changed |= ui
                        .selectable_value(&mut self.time_filter, Some(time.clone()), time)
                        .changed();
                }
            });

        let mut groups = self
            .group_index_by_name
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        groups.sort();
        egui::ComboBox::from_label("Group")
            .selected_text(self.group_filter.as_deref().unwrap_or("all"))
            .show_ui(ui, |ui| {
                filters_changed |= ui
                    .selectable_value(&mut self.group_filter, None, "all")
                    .changed();
                for group in &groups {
                    filters_changed |= ui
                        .selectable_value(&mut self.group_filter, Some(group.clone()), group)
                        .changed();
                }
            });

        if filters_changed {
            self.apply_filter_change();
        }

        ui.separator();

        ui.checkbox(&mut self.show_density, "Density shading");
        ui.checkbox(&mut self.show_topics, "Topic labels");
        ui.checkbox(&mut self.show_index_overlay, "Spatial index overlay");
        ui.checkbox(&mut self.show_fps_bar, "FPS readout");

        ui.separator();
        ui.label("Layout");

        ui.add(
            egui::Slider::new(&mut self.collide_strength, 0.0..=0.15)
                .text("collision strength"),
        );
        ui.add(
            egui::Slider::new(&mut self.origin_strength, 0.0..=0.5).text("origin pull"),
        );

        ui.horizontal(|ui| {
            let relax = ui
                .add_enabled(!self.points.is_empty(), egui::Button::new("Relax layout"))
                .on_hover_text("Re-run the overlap-removal pass with the sliders above.");
            if relax.clicked() {
                self.start_layout();
            }

            if ui
                .add_enabled(self.selected.is_some(), egui::Button::new("Clear selection"))
                .clicked()
            {
                self.set_selected(None);
            }
        });

        if self.layout_running {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("layout running...");
            });
        }
    }

    fn apply_filter_change(&mut self) {
        if let Some(index) = self.hovered
            && !self
                .points
                .get(index)
                .is_some_and(|point| self.point_passes_filters(point))
        {
            self.hovered = None;
            self.hover_clear_deadline = None;
        }

        if let Some(index) = self.selected
            && !self
                .points
                .get(index)
                .is_some_and(|point| self.point_passes_filters(point))
        {
            self.set_selected(None);
        }

        self.rebuild_spatial();
        self.detail_dirty = true;
    }
}
