//! Demo write path: a note command, its event, and an in-memory journal of
//! encoded events.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use eventwire_core::{AggregateId, Context};
use eventwire_events::{
    Command, CommandHandler, CommandHandlerWithReply, CommandPayload, DecodeError, EncodeError,
    Event, EventCodec, EventPayload, HandlerError, Metadata, Reply, reply,
};

pub const NOTE_AGGREGATE: &str = "Note";

/// Namespace the demo handler records its events under.
pub const NOTES_NAMESPACE: &str = "notes";

/// Record a note, on a new aggregate unless `aggregate_id` is given.
#[derive(Debug, Default, Deserialize)]
pub struct RecordNote {
    #[serde(default)]
    pub aggregate_id: Option<AggregateId>,
    pub text: String,
}

impl CommandPayload for RecordNote {
    const COMMAND_TYPE: &'static str = "RecordNote";
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecorded {
    pub text: String,
}

impl EventPayload for NoteRecorded {
    const EVENT_TYPE: &'static str = "NoteRecorded";
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Recorded {
    pub aggregate_id: AggregateId,
    pub version: u64,
}

#[derive(Default)]
struct JournalState {
    entries: Vec<Vec<u8>>,
    versions: HashMap<AggregateId, u64>,
}

/// Append-only list of encoded events.
pub struct Journal {
    codec: Arc<dyn EventCodec>,
    state: Mutex<JournalState>,
}

impl Journal {
    pub fn new(codec: Arc<dyn EventCodec>) -> Self {
        Self {
            codec,
            state: Mutex::new(JournalState::default()),
        }
    }

    /// Encode `payload` as the next event of `aggregate_id` and append it.
    ///
    /// The timestamp is truncated to milliseconds, the precision of a BSON
    /// datetime, so the returned event equals its decoded entry.
    pub async fn append<T: EventPayload>(
        &self,
        ctx: &Context,
        aggregate_type: &str,
        aggregate_id: AggregateId,
        payload: T,
        metadata: Metadata,
    ) -> Result<Event, EncodeError> {
        let mut state = self.state.lock().await;
        let version = state.versions.get(&aggregate_id).copied().unwrap_or(0) + 1;

        let event = Event::from_payload(payload, Utc::now().trunc_subsecs(3))
            .for_aggregate(aggregate_type, aggregate_id, version)
            .with_metadata(metadata);
        let bytes = self.codec.marshal_event(ctx, &event)?;

        state.entries.push(bytes);
        state.versions.insert(aggregate_id, version);

        tracing::info!(%event, %aggregate_id, "event appended");
        Ok(event)
    }

    #[cfg(test)]
    pub(crate) async fn push_encoded(&self, bytes: Vec<u8>) {
        self.state.lock().await.entries.push(bytes);
    }

    /// Decode every entry, oldest first.
    pub async fn events(&self) -> Result<Vec<(Event, Context)>, DecodeError> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .map(|bytes| self.codec.unmarshal_event(Context::background(), bytes))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Handles [`RecordNote`] by appending a [`NoteRecorded`] to the journal.
pub struct NoteRecorder {
    journal: Arc<Journal>,
}

impl NoteRecorder {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self { journal }
    }

    async fn record(&self, ctx: Context, command: Box<dyn Command>) -> Result<Recorded, HandlerError> {
        let command_type = command.command_type().to_string();
        let note = command
            .downcast::<RecordNote>()
            .ok_or_else(|| HandlerError::internal(format!("unexpected command {command_type}")))?;

        let text = note.text.trim();
        if text.is_empty() {
            return Err(HandlerError::rejected("note text must not be empty"));
        }

        let aggregate_id = note.aggregate_id.unwrap_or_else(AggregateId::new);
        if aggregate_id.is_nil() {
            return Err(HandlerError::rejected("aggregate_id must not be nil"));
        }

        let ctx = ctx.with_namespace(NOTES_NAMESPACE);
        let metadata = Metadata::from([("source".to_string(), json!("http"))]);

        let event = self
            .journal
            .append(
                &ctx,
                NOTE_AGGREGATE,
                aggregate_id,
                NoteRecorded {
                    text: text.to_string(),
                },
                metadata,
            )
            .await
            .map_err(|e| HandlerError::Internal(anyhow::Error::new(e)))?;

        Ok(Recorded {
            aggregate_id: event.aggregate_id(),
            version: event.version(),
        })
    }
}

#[async_trait]
impl CommandHandler for NoteRecorder {
    async fn handle_command(&self, ctx: Context, command: Box<dyn Command>) -> Result<(), HandlerError> {
        self.record(ctx, command).await.map(|_| ())
    }
}

#[async_trait]
impl CommandHandlerWithReply for NoteRecorder {
    async fn handle_command_with_reply(
        &self,
        ctx: Context,
        command: Box<dyn Command>,
    ) -> Result<Option<Box<dyn Reply>>, HandlerError> {
        let recorded = self.record(ctx, command).await?;
        Ok(reply(recorded))
    }
}
