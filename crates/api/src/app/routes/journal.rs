//! Read-only view of the demo journal, decoded back through the event codec.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::value::RawValue;

use eventwire_core::{AggregateId, Context};
use eventwire_events::{Event, Metadata};

use crate::app::demo::Journal;
use crate::errors::json_error;

#[derive(Debug, Serialize)]
pub struct JournalEntry {
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,
    pub metadata: Metadata,
    pub namespace: String,
}

impl JournalEntry {
    fn from_decoded(event: &Event, ctx: &Context) -> serde_json::Result<Self> {
        let data = event.data().map(|data| data.encode_json()).transpose()?;
        Ok(Self {
            event_type: event.event_type().to_string(),
            aggregate_type: event.aggregate_type().to_string(),
            aggregate_id: event.aggregate_id(),
            version: event.version(),
            timestamp: event.timestamp(),
            data,
            metadata: event.metadata().clone(),
            namespace: ctx.namespace().to_string(),
        })
    }
}

pub async fn list(Extension(journal): Extension<Arc<Journal>>) -> Response {
    let events = match journal.events().await {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "journal entry could not be decoded");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "server_fault", e.to_string());
        }
    };

    let entries: Result<Vec<_>, _> = events
        .iter()
        .map(|(event, ctx)| JournalEntry::from_decoded(event, ctx))
        .collect();

    match entries {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "server_fault", e.to_string()),
    }
}
