use eframe::egui::{self, Align2, Color32, FontId, RichText, Sense, Ui, vec2};

use crate::util::format_count;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let Some(index) = self.selected else {
            ui.label("Click a point on the map to inspect it.");
            return;
        };
        let Some(point) = self.points.get(index) else {
            ui.label("Selected point no longer exists.");
            return;
        };

        let name = point.name.clone();
        let affiliation = point.affiliation.clone();
        let interests = point.interests.clone();
        let time = point.time.clone();
        let group = point.group.clone();
        let citations = point.citations;
        let keywords = point.keywords.clone();
        let summary = point.summary.clone();
        let scholar_url = point.scholar_url.clone();
        let homepage = point.homepage.clone();
        let image_url = point.image_url.clone();

        let ratio = self.image_ratios.request(&image_url, &self.image_tx);
        if let Some(ratio) = ratio {
            let width = ui.available_width().min(200.0);
            let height = (width / ratio.max(0.2)).min(240.0);
            let (rect, _) = ui.allocate_exact_size(vec2(width, height), Sense::hover());
            ui.painter()
                .rect_filled(rect, 4.0, Color32::from_gray(45));
            ui.painter().text(
                rect.center(),
                Align2::CENTER_CENTER,
                "portrait",
                FontId::proportional(12.0),
                Color32::from_gray(140),
            );
            ui.add_space(6.0);
        }

        ui.label(RichText::new(name).strong());
        if !affiliation.is_empty() {
            ui.small(affiliation);
        }
        ui.add_space(6.0);

        if !interests.is_empty() {
            ui.label(format!("Interests: {interests}"));
        }
        if !time.is_empty() {
            ui.label(format!("Active since: {time}"));
        }
        if !group.is_empty() {
            ui.label(format!("Group: {group}"));
        }
        ui.label(format!("Citations: {}", format_count(citations as usize)));
        if !keywords.is_empty() {
            ui.label(format!("Keywords: {keywords}"));
        }

        if !summary.is_empty() {
            ui.separator();
            ui.label(RichText::new("Summary").strong());
            egui::ScrollArea::vertical()
                .id_salt("summary_scroll")
                .max_height(200.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    ui.label(summary);
                });
        }

        ui.separator();
        if !scholar_url.is_empty() {
            ui.hyperlink_to("Scholar profile", scholar_url);
        }
        if !homepage.is_empty() {
            ui.hyperlink_to("Homepage", homepage);
        }
    }
}
