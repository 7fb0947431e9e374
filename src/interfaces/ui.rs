use crate::application::dashboard::DashboardController;
use crate::application::system::SystemHandle;
use crate::interfaces::components::Section;
use crate::interfaces::dashboard_components::{
    chart_panel, history_table, log_panel, prediction_form,
};
use crate::interfaces::design_system::DesignSystem;
use chrono::Utc;
use crossbeam_channel::Receiver;
use eframe::egui;
use std::collections::VecDeque;
use std::time::Duration;

const MAX_LOG_LINES: usize = 500;
/// Snapshots change off the UI thread, so the UI polls at this interval.
const REPAINT_INTERVAL: Duration = Duration::from_millis(100);

pub struct DashboardApp {
    system: SystemHandle,
    dashboard: DashboardController,
    log_rx: Option<Receiver<String>>,
    logs: VecDeque<String>,
    logs_open: bool,
}

impl DashboardApp {
    pub fn new(cc: &eframe::CreationContext<'_>, system: SystemHandle, log_rx: Option<Receiver<String>>) -> Self {
        cc.egui_ctx.set_visuals(DesignSystem::theme());
        let dashboard = system.dashboard();
        Self {
            system,
            dashboard,
            log_rx,
            logs: VecDeque::with_capacity(MAX_LOG_LINES),
            logs_open: false,
        }
    }

    fn drain_logs(&mut self) {
        let Some(rx) = &self.log_rx else {
            return;
        };
        while let Ok(line) = rx.try_recv() {
            if self.logs.len() == MAX_LOG_LINES {
                self.logs.pop_front();
            }
            self.logs.push_back(line);
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_logs();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Prediction Dashboard");
                ui.separator();
                ui.label(format!("{:?} mode", self.system.config.mode));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(format!("UTC {}", Utc::now().format("%H:%M:%S")))
                            .color(DesignSystem::TEXT_SECONDARY),
                    );
                    ui.toggle_value(&mut self.logs_open, "Logs");
                });
            });
        });

        log_panel::render_log_panel(ctx, &self.logs, self.logs_open);

        egui::SidePanel::right("prediction_panel")
            .default_width(360.0)
            .min_width(300.0)
            .resizable(true)
            .show(ctx, |ui| {
                ui.add_space(DesignSystem::SPACING_SMALL);
                Section::new("Make a prediction").show(ui, |ui| {
                    prediction_form::render_prediction_form(ui, &mut self.dashboard);
                });
                ui.add_space(DesignSystem::SPACING_MEDIUM);

                let history = self.dashboard.history_view();
                Section::new("Prediction history").show_view(ui, &history, |ui, records| {
                    history_table::render_history(ui, records);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            prediction_form::render_selectors(ui, &mut self.dashboard);
            ui.add_space(DesignSystem::SPACING_SMALL);

            let chart = self.dashboard.chart_view();
            let id_salt = self.dashboard.chart_key().to_string();
            egui::ScrollArea::vertical().show(ui, |ui| {
                Section::new("Chart")
                    .min_height(300.0)
                    .show_view(ui, &chart, |ui, figure| {
                        chart_panel::render_figure(ui, &id_salt, figure);
                    });
            });
        });

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

impl Drop for DashboardApp {
    fn drop(&mut self) {
        self.system.shutdown();
    }
}
