use crate::application::dashboard::DashboardController;
use crate::domain::prediction::{MIN_STAKE, STAKE_STEP};
use crate::domain::query_key::ChartType;
use crate::interfaces::design_system::DesignSystem;
use crate::interfaces::view_models::{DashboardViewModel, SubmissionView};
use eframe::egui;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

const MAX_STAKE: f64 = 1_000.0;

/// Symbol/chart selectors plus the stake form.
pub fn render_selectors(ui: &mut egui::Ui, dashboard: &mut DashboardController) {
    let mut symbol = dashboard.selection().symbol.clone();
    let mut chart_type = dashboard.selection().chart_type;

    ui.horizontal(|ui| {
        ui.label(egui::RichText::new("Symbol").color(DesignSystem::TEXT_SECONDARY));
        egui::ComboBox::from_id_salt("symbol_select")
            .selected_text(symbol.clone())
            .show_ui(ui, |ui| {
                for candidate in dashboard.symbols() {
                    ui.selectable_value(&mut symbol, candidate.clone(), candidate.as_str());
                }
            });

        ui.add_space(DesignSystem::SPACING_SMALL);
        ui.label(egui::RichText::new("Chart").color(DesignSystem::TEXT_SECONDARY));
        egui::ComboBox::from_id_salt("chart_type_select")
            .selected_text(chart_type.label())
            .show_ui(ui, |ui| {
                for candidate in ChartType::ALL {
                    ui.selectable_value(&mut chart_type, candidate, candidate.label());
                }
            });

        if ui.button("⟳ Refresh").clicked() {
            dashboard.refresh();
        }
    });

    dashboard.set_symbol(symbol);
    dashboard.set_chart_type(chart_type);
}

pub fn render_prediction_form(ui: &mut egui::Ui, dashboard: &mut DashboardController) {
    let submission = dashboard.submission_state();
    let pending = submission.is_pending();

    ui.horizontal(|ui| {
        ui.label(
            egui::RichText::new(format!("Predict {}", dashboard.selection().symbol))
                .color(DesignSystem::TEXT_PRIMARY),
        );
    });

    let mut stake = dashboard.selection().stake_amount.to_f64().unwrap_or(0.0);
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new("Stake").color(DesignSystem::TEXT_SECONDARY));
        ui.add_enabled(
            !pending,
            egui::DragValue::new(&mut stake)
                .speed(STAKE_STEP.to_f64().unwrap_or(0.1))
                .range(MIN_STAKE.to_f64().unwrap_or(0.1)..=MAX_STAKE)
                .fixed_decimals(1),
        );
    });
    if let Some(amount) = Decimal::from_f64(stake) {
        dashboard.set_stake_amount(amount.round_dp(1));
    }

    ui.add_space(DesignSystem::SPACING_SMALL);
    ui.horizontal(|ui| {
        let label = if pending { "Submitting..." } else { "Submit prediction" };
        let submit = egui::Button::new(egui::RichText::new(label).color(egui::Color32::WHITE))
            .fill(DesignSystem::ACCENT_PRIMARY);
        if ui.add_enabled(!pending, submit).clicked() {
            // Outcome is observed through the submission state.
            drop(dashboard.submit_in_background());
        }
        if ui.add_enabled(!pending, egui::Button::new("Reset")).clicked() {
            dashboard.reset_form();
        }
        if pending {
            ui.add(egui::Spinner::new().size(14.0));
        }
    });

    match DashboardViewModel::submission(&submission) {
        SubmissionView::Idle | SubmissionView::Pending => {}
        SubmissionView::Accepted(summary) => {
            ui.label(egui::RichText::new(summary).color(DesignSystem::SUCCESS));
            if let Some(hash) = submission.result.as_ref().and_then(|r| r.transaction_hash.as_ref()) {
                ui.label(
                    egui::RichText::new(format!("tx {}", hash))
                        .monospace()
                        .small()
                        .color(DesignSystem::TEXT_MUTED),
                );
            }
        }
        SubmissionView::Failed(message) => {
            let detail = submission
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();
            ui.label(egui::RichText::new(message).color(DesignSystem::DANGER))
                .on_hover_text(detail);
        }
    }
}
