use crate::domain::prediction::PredictionRecord;
use crate::interfaces::design_system::DesignSystem;
use crate::interfaces::view_models::DashboardViewModel;
use eframe::egui;

pub fn render_history(ui: &mut egui::Ui, records: &[PredictionRecord]) {
    if records.is_empty() {
        ui.label(egui::RichText::new("No predictions yet").color(DesignSystem::TEXT_MUTED));
        return;
    }

    egui::ScrollArea::vertical()
        .id_salt("history_scroll")
        .max_height(260.0)
        .show(ui, |ui| {
            egui::Grid::new("history_grid")
                .num_columns(5)
                .striped(true)
                .spacing([DesignSystem::SPACING_MEDIUM, 6.0])
                .show(ui, |ui| {
                    for header in ["ID", "Symbol", "Predicted", "Confidence", "Status"] {
                        ui.label(egui::RichText::new(header).strong().color(DesignSystem::TEXT_SECONDARY));
                    }
                    ui.end_row();

                    for record in records {
                        let badge = DashboardViewModel::status_badge(&record.status);
                        ui.label(egui::RichText::new(record.id.to_string()).monospace());
                        ui.label(record.symbol.as_str());
                        ui.label(DashboardViewModel::price(record.predicted_price));
                        ui.label(DashboardViewModel::confidence(record.confidence_score));
                        ui.label(egui::RichText::new(badge.label).strong().color(badge.color));
                        ui.end_row();
                    }
                });
        });
}
