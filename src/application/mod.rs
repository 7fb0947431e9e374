// Keyed query cache and its worker
pub mod query;

// One-shot writes (prediction submission)
pub mod mutation;

// Figure payload -> ChartFigure
pub mod chart_adapter;

// Page session state
pub mod dashboard;

// Bootstrap
pub mod system;
