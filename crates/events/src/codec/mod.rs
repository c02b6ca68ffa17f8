//! Event codecs: `Event` <-> self-describing bytes.
//!
//! ## Wire shape
//!
//! Every codec writes one document per event:
//!
//! | field            | contents                                            |
//! |------------------|-----------------------------------------------------|
//! | `_id`            | aggregate id, canonical UUID string                 |
//! | `aggregate_type` | string                                              |
//! | `event_type`     | string, selects the payload type in the registry    |
//! | `version`        | integer                                             |
//! | `timestamp`      | point in time                                       |
//! | `metadata`       | string-keyed map (always present)                   |
//! | `context`        | context snapshot (always present)                   |
//! | `data`           | payload as an embedded raw document; **absent** when the event has no payload |
//!
//! The payload is encoded separately and embedded raw, so the envelope can be
//! decoded before the payload type is known.
//!
//! ## Aggregate ids
//!
//! By default an `_id` that is not a valid UUID decodes to the nil id (logged
//! at `warn`). `with_strict_aggregate_id(true)` turns that into
//! [`DecodeError::InvalidAggregateId`].
//!
//! Codecs hold only read-only collaborators and are safe to share across
//! threads.

pub mod bson;
pub mod json;

use std::sync::Arc;

use thiserror::Error;

use eventwire_core::{AggregateId, Context, ContextCodec};

use crate::event::{Event, EventData};
use crate::registry::{EventDataRegistry, RegistryError};

pub use self::bson::BsonEventCodec;
pub use self::json::JsonEventCodec;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Marshals and unmarshals events.
pub trait EventCodec: Send + Sync {
    /// Encode `event`, capturing a snapshot of `ctx`.
    fn marshal_event(&self, ctx: &Context, event: &Event) -> Result<Vec<u8>, EncodeError>;

    /// Decode an event and rebuild its context on top of `ctx`.
    ///
    /// The event and the context are returned separately; callers combine
    /// the context with their own scope as they see fit.
    fn unmarshal_event(&self, ctx: Context, bytes: &[u8]) -> Result<(Event, Context), DecodeError>;
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("could not marshal event data: {0}")]
    Data(#[source] BoxError),

    #[error("could not marshal event: {0}")]
    Envelope(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("could not unmarshal event: {0}")]
    Envelope(#[source] BoxError),

    #[error("could not create event data: {0}")]
    UnregisteredType(#[source] RegistryError),

    #[error("could not unmarshal event data: {0}")]
    Data(#[source] BoxError),

    #[error("invalid aggregate id: {0:?}")]
    InvalidAggregateId(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Envelope or payload bytes could not be decoded.
    Malformed,
    /// `event_type` has no registered payload type.
    UnregisteredType,
    /// `_id` is not a UUID (strict mode only).
    InvalidAggregateId,
}

impl DecodeError {
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::Envelope(_) | DecodeError::Data(_) => DecodeErrorKind::Malformed,
            DecodeError::UnregisteredType(_) => DecodeErrorKind::UnregisteredType,
            DecodeError::InvalidAggregateId(_) => DecodeErrorKind::InvalidAggregateId,
        }
    }
}

/// Collaborators and options shared by the concrete codecs.
#[derive(Debug, Clone)]
struct CodecParts {
    registry: Arc<EventDataRegistry>,
    context_codec: Arc<ContextCodec>,
    strict_aggregate_id: bool,
}

impl CodecParts {
    fn new(registry: Arc<EventDataRegistry>, context_codec: Arc<ContextCodec>) -> Self {
        Self {
            registry,
            context_codec,
            strict_aggregate_id: false,
        }
    }

    fn create_data(&self, event_type: &str) -> Result<Box<dyn EventData>, DecodeError> {
        self.registry
            .create(event_type)
            .map_err(DecodeError::UnregisteredType)
    }

    fn aggregate_id(&self, raw: &str) -> Result<AggregateId, DecodeError> {
        match raw.parse::<AggregateId>() {
            Ok(id) => Ok(id),
            Err(_) if self.strict_aggregate_id => Err(DecodeError::InvalidAggregateId(raw.to_string())),
            Err(e) => {
                tracing::warn!(aggregate_id = raw, error = %e, "substituting nil aggregate id");
                Ok(AggregateId::nil())
            }
        }
    }
}
