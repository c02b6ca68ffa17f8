//! HTTP API: command ingress, routing, and process configuration.

pub mod app;
pub mod config;
pub mod errors;
pub mod ingress;
pub mod middleware;

pub use config::{ApiConfig, ConfigError};
pub use errors::{ErrorClass, IngressError};
pub use ingress::{CommandIngress, IngressOptions};
