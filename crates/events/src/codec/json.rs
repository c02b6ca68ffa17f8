//! JSON event codec.
//!
//! Same envelope as the BSON codec; the payload is embedded as a raw JSON
//! value and timestamps are RFC 3339 strings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use eventwire_core::{Context, ContextCodec, ContextSnapshot};

use super::{CodecParts, DecodeError, EncodeError, EventCodec};
use crate::event::{Event, Metadata};
use crate::registry::EventDataRegistry;

#[derive(Debug, Clone)]
pub struct JsonEventCodec {
    parts: CodecParts,
}

impl JsonEventCodec {
    pub fn new(registry: Arc<EventDataRegistry>, context_codec: Arc<ContextCodec>) -> Self {
        Self {
            parts: CodecParts::new(registry, context_codec),
        }
    }

    pub fn with_strict_aggregate_id(mut self, strict: bool) -> Self {
        self.parts.strict_aggregate_id = strict;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireEvent {
    event_type: String,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    raw_data: Option<Box<RawValue>>,
    timestamp: DateTime<Utc>,
    aggregate_type: String,
    #[serde(rename = "_id")]
    aggregate_id: String,
    version: u64,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    context: ContextSnapshot,
}

impl EventCodec for JsonEventCodec {
    fn marshal_event(&self, ctx: &Context, event: &Event) -> Result<Vec<u8>, EncodeError> {
        let raw_data = event
            .data()
            .map(|data| data.encode_json())
            .transpose()
            .map_err(|e| EncodeError::Data(e.into()))?;

        let wire = WireEvent {
            event_type: event.event_type().to_string(),
            raw_data,
            timestamp: event.timestamp(),
            aggregate_type: event.aggregate_type().to_string(),
            aggregate_id: event.aggregate_id().to_string(),
            version: event.version(),
            metadata: event.metadata().clone(),
            context: self.parts.context_codec.snapshot(ctx),
        };

        let bytes = serde_json::to_vec(&wire).map_err(|e| EncodeError::Envelope(e.into()))?;
        tracing::debug!(event = %event, len = bytes.len(), "marshaled event (json)");
        Ok(bytes)
    }

    fn unmarshal_event(&self, ctx: Context, bytes: &[u8]) -> Result<(Event, Context), DecodeError> {
        let wire: WireEvent =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Envelope(e.into()))?;

        // A literal `null` payload deserializes to `None` and is treated as absent.
        let data = match &wire.raw_data {
            Some(raw) => {
                let mut data = self.parts.create_data(&wire.event_type)?;
                data.decode_json(raw.get())
                    .map_err(|e| DecodeError::Data(e.into()))?;
                Some(data)
            }
            None => None,
        };

        let aggregate_id = self.parts.aggregate_id(&wire.aggregate_id)?;
        let event = Event::new(wire.event_type, data, wire.timestamp)
            .for_aggregate(wire.aggregate_type, aggregate_id, wire.version)
            .with_metadata(wire.metadata);

        let ctx = self.parts.context_codec.restore(ctx, &wire.context);
        tracing::debug!(event = %event, "unmarshaled event (json)");
        Ok((event, ctx))
    }
}
