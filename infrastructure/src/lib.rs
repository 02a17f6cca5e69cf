mod infra;
mod tracing;

pub mod app;
pub mod health;

pub use infra::*;
pub use tracing::LogFormat;

