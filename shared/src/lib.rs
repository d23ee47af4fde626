//! Process wiring: configuration, tracing, and the application state that
//! hands every manager its store, cache and collaborator handles.

pub mod config;
pub mod state;
pub mod telemetry;

pub use config::{AppConfig, ConfigError, LogFormat};
pub use state::AppState;
