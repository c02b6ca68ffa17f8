//! HTTP application wiring (Axum router + registries + demo handler).
//!
//! - `demo.rs`: the demo command, its event, the journal and the handler
//! - `routes/`: HTTP routes that are not command ingress endpoints

use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;

use eventwire_core::ContextCodec;
use eventwire_events::{BsonEventCodec, CommandRegistry, EventDataRegistry, RegistryError};

use crate::config::ApiConfig;
use crate::middleware;

pub mod demo;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &ApiConfig) -> Result<Router, RegistryError> {
    let journal = build_journal(config)?;
    build_router(config, journal)
}

/// The demo journal, with its codec configured from `config`.
pub fn build_journal(config: &ApiConfig) -> Result<Arc<demo::Journal>, RegistryError> {
    let mut events = EventDataRegistry::new();
    events.register::<demo::NoteRecorded>()?;

    let codec = BsonEventCodec::new(Arc::new(events), Arc::new(ContextCodec::default()))
        .with_strict_aggregate_id(config.strict_aggregate_id);
    Ok(Arc::new(demo::Journal::new(Arc::new(codec))))
}

fn build_router(config: &ApiConfig, journal: Arc<demo::Journal>) -> Result<Router, RegistryError> {
    let mut commands = CommandRegistry::new();
    commands.register::<demo::RecordNote>()?;

    tracing::debug!(
        commands = ?commands.type_names(),
        "command registry ready"
    );

    let app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(
            Arc::new(commands),
            config.ingress_options(),
            journal,
        ))
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::log_request)));

    Ok(app)
}
