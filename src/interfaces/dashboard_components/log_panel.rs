use crate::interfaces::design_system::DesignSystem;
use eframe::egui;
use std::collections::VecDeque;

pub fn render_log_panel(ctx: &egui::Context, logs: &VecDeque<String>, open: bool) {
    egui::TopBottomPanel::bottom("logs_panel")
        .resizable(true)
        .default_height(160.0)
        .min_height(40.0)
        .show_animated(ctx, open, |ui| {
            ui.label(egui::RichText::new("Logs").size(13.0).color(DesignSystem::TEXT_SECONDARY));
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for line in logs {
                        ui.label(
                            egui::RichText::new(line)
                                .monospace()
                                .size(11.0)
                                .color(log_color(line)),
                        );
                    }
                });
        });
}

fn log_color(line: &str) -> egui::Color32 {
    if line.contains("ERROR") {
        DesignSystem::DANGER
    } else if line.contains("WARN") {
        DesignSystem::WARNING
    } else {
        DesignSystem::TEXT_SECONDARY
    }
}
