use eframe::egui::{self, Align, Context, Layout};

use crate::util::format_count;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        self.update_fps_counter(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("embedmap");
                    ui.separator();
                    if let Some(name) = self.grid.as_ref().and_then(|grid| grid.embedding_name.as_deref())
                    {
                        ui.label(name);
                    }
                    ui.label(format!("points: {}", format_count(self.points.len())));
                    if let Some(total) = self
                        .grid
                        .as_ref()
                        .and_then(|grid| grid.total_point_size)
                        .filter(|_| !self.streaming_done)
                    {
                        ui.label(format!("of {}", format_count(total as usize)));
                    }
                    if !self.streaming_done {
                        ui.spinner();
                        ui.label(format!("streaming batch {}", self.batches_received + 1));
                    }
                    if let Some(error) = &self.load_error {
                        ui.colored_label(
                            egui::Color32::from_rgb(235, 110, 110),
                            format!("load stopped: {error}"),
                        );
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(format!("visible: {}", format_count(self.visible_point_count)));
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(330.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_map(ui));
    }
}
