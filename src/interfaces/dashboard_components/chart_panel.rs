use crate::domain::chart::{ChartFigure, LineDash, Series, TraceKind};
use crate::interfaces::design_system::DesignSystem;
use crate::interfaces::view_models::DashboardViewModel;
use chrono::{TimeZone, Utc};
use eframe::egui;
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, Legend, Line, LineStyle, Plot, PlotUi, Points,
};

const DEFAULT_FIGURE_HEIGHT: f32 = 600.0;
/// Share of the figure height given to the first panel when there are several.
const MAIN_PANEL_SHARE: f32 = 0.55;

/// Draw a figure as vertically stacked plots, one per panel, with linked x axes.
pub fn render_figure(ui: &mut egui::Ui, id_salt: &str, figure: &ChartFigure) {
    if let Some(title) = &figure.layout.title {
        ui.label(
            egui::RichText::new(title)
                .strong()
                .size(14.0)
                .color(DesignSystem::TEXT_PRIMARY),
        );
    }

    if figure.series.is_empty() {
        ui.label(egui::RichText::new("No data for this chart").color(DesignSystem::TEXT_MUTED));
        return;
    }

    let panels = figure.layout.panel_count.max(1);
    let total = figure
        .layout
        .height
        .unwrap_or(DEFAULT_FIGURE_HEIGHT)
        .min(ui.available_height().max(300.0));
    let time_axis = figure.layout.time_axis;
    let link_group = egui::Id::new(("figure_x", id_salt));

    for panel in 0..panels {
        let height = panel_height(total, panels, panel);

        if let Some(title) = figure.layout.panel_title(panel) {
            ui.label(egui::RichText::new(title).size(11.0).color(DesignSystem::TEXT_SECONDARY));
        }

        Plot::new(format!("{}_panel_{}", id_salt, panel))
            .height(height)
            .show_grid([true, true])
            .legend(Legend::default())
            .link_axis(link_group, [true, false])
            .x_axis_formatter(move |mark, _range| format_x(mark.value, time_axis))
            .show(ui, |plot_ui| {
                for (index, series) in figure.series.iter().enumerate() {
                    if series.panel == panel {
                        draw_series(plot_ui, series, index);
                    }
                }
            });
    }
}

fn panel_height(total: f32, panels: usize, panel: usize) -> f32 {
    if panels == 1 {
        return total;
    }
    let rest = (total * (1.0 - MAIN_PANEL_SHARE)) / (panels - 1) as f32;
    if panel == 0 {
        total * MAIN_PANEL_SHARE
    } else {
        rest.max(80.0)
    }
}

fn format_x(value: f64, time_axis: bool) -> String {
    if !time_axis {
        return format!("{}", value);
    }
    Utc.timestamp_opt(value as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Bar or candle width: 70% of the typical spacing between x values.
fn slot_width(points: &[[f64; 2]]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1][0] - w[0][0]).abs())
        .filter(|d| *d > 0.0)
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
        .map(|d| d * 0.7)
        .unwrap_or(0.7)
}

fn draw_series(plot_ui: &mut PlotUi, series: &Series, index: usize) {
    match &series.kind {
        TraceKind::Candlestick => draw_candles(plot_ui, series),
        TraceKind::Bar => {
            let width = slot_width(&series.points);
            let color = series
                .color
                .as_ref()
                .map(|_| DashboardViewModel::series_color(series, index))
                .unwrap_or(DesignSystem::VOLUME);
            let bars = series
                .points
                .iter()
                .map(|[x, y]| Bar::new(*x, *y).width(width))
                .collect();
            plot_ui.bar_chart(BarChart::new(series.name.clone(), bars).color(color));
        }
        TraceKind::Scatter => {
            let color = DashboardViewModel::series_color(series, index);
            let style = match series.dash {
                LineDash::Solid => LineStyle::Solid,
                LineDash::Dot => LineStyle::dotted_dense(),
                LineDash::Dash => LineStyle::dashed_dense(),
            };
            if series.show_markers {
                plot_ui.points(
                    Points::new(series.name.clone(), series.points.clone())
                        .radius(4.0)
                        .color(color),
                );
            } else {
                plot_ui.line(
                    Line::new(series.name.clone(), series.points.clone())
                        .color(color)
                        .style(style),
                );
            }
        }
        TraceKind::Other(_) => {}
    }
}

fn draw_candles(plot_ui: &mut PlotUi, series: &Series) {
    let Some(candles) = &series.candles else {
        return;
    };
    let width = slot_width(&series.points);

    let elems = series
        .points
        .iter()
        .zip(candles)
        .map(|([x, _], c)| {
            let color = if c.close >= c.open {
                DesignSystem::BULLISH
            } else {
                DesignSystem::BEARISH
            };
            let min_oc = c.open.min(c.close);
            let max_oc = c.open.max(c.close);
            BoxElem::new(
                *x,
                BoxSpread::new(c.low, min_oc, (c.open + c.close) / 2.0, max_oc, c.high),
            )
            .fill(color)
            .stroke(egui::Stroke::new(1.0, color))
            .box_width(width)
        })
        .collect();

    plot_ui.box_plot(BoxPlot::new(series.name.clone(), elems));
}
