pub mod chart_panel;
pub mod history_table;
pub mod log_panel;
pub mod prediction_form;
