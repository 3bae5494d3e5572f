pub mod config;
pub mod models;
pub mod service;

pub use config::{ConfigError, LogFormat, ServiceConfig};
pub use models::*;
pub use service::{AppState, build_router, create_app};
