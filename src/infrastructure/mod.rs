pub mod core;
pub mod credentials;
pub mod mock;
pub mod remote_client;

pub use credentials::StaticCredentials;
pub use mock::{MockEndpoint, MockPredictionService, MockScript, MockSettings};
pub use remote_client::HttpPredictionService;
