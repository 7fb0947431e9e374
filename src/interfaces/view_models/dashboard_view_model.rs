use crate::application::mutation::{MutationState, MutationStatus};
use crate::domain::chart::Series;
use crate::domain::prediction::{PredictionReceipt, PredictionStatus};
use crate::interfaces::design_system::DesignSystem;
use eframe::egui;

/// Palette for traces that carry no color of their own.
const SERIES_PALETTE: [egui::Color32; 5] = [
    egui::Color32::from_rgb(88, 166, 255),
    egui::Color32::from_rgb(255, 165, 0),
    egui::Color32::from_rgb(186, 104, 200),
    egui::Color32::from_rgb(0, 200, 170),
    egui::Color32::from_rgb(240, 98, 146),
];

pub struct StatusBadge {
    pub label: String,
    pub color: egui::Color32,
}

/// Form footer after the latest submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionView {
    Idle,
    Pending,
    Accepted(String),
    Failed(String),
}

pub struct DashboardViewModel;

impl DashboardViewModel {
    pub fn status_badge(status: &PredictionStatus) -> StatusBadge {
        let color = match status {
            PredictionStatus::Pending => DesignSystem::WARNING,
            PredictionStatus::Won => DesignSystem::SUCCESS,
            PredictionStatus::Lost => DesignSystem::DANGER,
            PredictionStatus::Void | PredictionStatus::Unknown(_) => DesignSystem::TEXT_MUTED,
        };
        StatusBadge {
            label: status.as_str().to_uppercase(),
            color,
        }
    }

    pub fn price(value: f64) -> String {
        format!("${:.2}", value)
    }

    /// Scores arrive either as a fraction (0.82) or a percentage (82.0).
    pub fn confidence(score: f64) -> String {
        let pct = if score <= 1.0 { score * 100.0 } else { score };
        format!("{:.1}%", pct)
    }

    pub fn submission(state: &MutationState<PredictionReceipt>) -> SubmissionView {
        match state.status {
            MutationStatus::Idle => SubmissionView::Idle,
            MutationStatus::Pending => SubmissionView::Pending,
            MutationStatus::Success => match &state.result {
                Some(receipt) => {
                    let change = receipt
                        .predicted_change_percent
                        .map(|c| format!(" ({:+.2}%)", c))
                        .unwrap_or_default();
                    SubmissionView::Accepted(format!(
                        "{} predicted at {}{}, confidence {}",
                        receipt.symbol,
                        Self::price(receipt.predicted_price),
                        change,
                        Self::confidence(receipt.confidence_score)
                    ))
                }
                None => SubmissionView::Accepted("Prediction submitted".to_string()),
            },
            MutationStatus::Error => SubmissionView::Failed(
                state
                    .error
                    .as_ref()
                    .map(|e| e.user_message().to_string())
                    .unwrap_or_else(|| "Submission failed".to_string()),
            ),
        }
    }

    pub fn series_color(series: &Series, index: usize) -> egui::Color32 {
        series
            .color
            .as_deref()
            .and_then(parse_color)
            .unwrap_or(SERIES_PALETTE[index % SERIES_PALETTE.len()])
    }
}

/// `#rrggbb`, `rgb(r,g,b)` or a handful of CSS names.
fn parse_color(raw: &str) -> Option<egui::Color32> {
    let raw = raw.trim().to_lowercase();
    if let Some(hex) = raw.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(egui::Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?));
    }
    if let Some(body) = raw.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
        let parts: Vec<u8> = body
            .split(',')
            .filter_map(|p| p.trim().parse().ok())
            .collect();
        return match parts.as_slice() {
            [r, g, b] => Some(egui::Color32::from_rgb(*r, *g, *b)),
            _ => None,
        };
    }
    match raw.as_str() {
        "red" => Some(DesignSystem::DANGER),
        "green" => Some(DesignSystem::SUCCESS),
        "blue" => Some(DesignSystem::ACCENT_PRIMARY),
        "orange" => Some(DesignSystem::WARNING),
        "white" => Some(egui::Color32::WHITE),
        "gray" | "grey" => Some(egui::Color32::GRAY),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::{LineDash, TraceKind};
    use crate::domain::errors::DashboardError;

    fn series(color: Option<&str>) -> Series {
        Series {
            name: "s".into(),
            kind: TraceKind::Scatter,
            panel: 0,
            points: vec![],
            candles: None,
            color: color.map(str::to_string),
            dash: LineDash::Solid,
            show_markers: false,
        }
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!(parse_color("#ff0000"), Some(egui::Color32::from_rgb(255, 0, 0)));
        assert_eq!(parse_color("rgb(1, 2, 3)"), Some(egui::Color32::from_rgb(1, 2, 3)));
        assert_eq!(parse_color("Red"), Some(DesignSystem::DANGER));
        assert_eq!(parse_color("#fff"), None);
        assert_eq!(parse_color("mauve"), None);
    }

    #[test]
    fn test_series_color_falls_back_to_palette() {
        assert_eq!(DashboardViewModel::series_color(&series(Some("red")), 0), DesignSystem::DANGER);
        assert_eq!(DashboardViewModel::series_color(&series(None), 1), SERIES_PALETTE[1]);
        assert_eq!(DashboardViewModel::series_color(&series(Some("??")), 6), SERIES_PALETTE[1]);
    }

    #[test]
    fn test_confidence_formatting() {
        assert_eq!(DashboardViewModel::confidence(0.825), "82.5%");
        assert_eq!(DashboardViewModel::confidence(67.0), "67.0%");
    }

    #[test]
    fn test_status_badges() {
        let won = DashboardViewModel::status_badge(&PredictionStatus::Won);
        assert_eq!(won.label, "WON");
        assert_eq!(won.color, DesignSystem::SUCCESS);
        let odd = DashboardViewModel::status_badge(&PredictionStatus::Unknown("expired".into()));
        assert_eq!(odd.label, "EXPIRED");
    }

    #[test]
    fn test_submission_view_uses_user_message() {
        let mut state = MutationState::<PredictionReceipt>::default();
        assert_eq!(DashboardViewModel::submission(&state), SubmissionView::Idle);

        state.status = MutationStatus::Error;
        state.error = Some(DashboardError::network("connection refused"));
        assert_eq!(
            DashboardViewModel::submission(&state),
            SubmissionView::Failed("Service unreachable".into())
        );
    }
}
