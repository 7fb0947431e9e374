// Figure description for the rendering surface
pub mod chart;

// Domain-specific error types
pub mod errors;

// Port interfaces
pub mod ports;

// Prediction records and requests
pub mod prediction;

// Cache identities
pub mod query_key;
