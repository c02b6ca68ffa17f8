//! BSON event codec.
//!
//! Timestamps are stored as BSON datetimes, so they round-trip with
//! millisecond precision.

use std::sync::Arc;

use ::bson::RawDocumentBuf;
use ::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eventwire_core::{Context, ContextCodec, ContextSnapshot};

use super::{CodecParts, DecodeError, EncodeError, EventCodec};
use crate::event::{Event, Metadata};
use crate::registry::EventDataRegistry;

#[derive(Debug, Clone)]
pub struct BsonEventCodec {
    parts: CodecParts,
}

impl BsonEventCodec {
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

/// The event as stored on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct WireEvent {
    event_type: String,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    raw_data: Option<RawDocumentBuf>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
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

impl EventCodec for BsonEventCodec {
    fn marshal_event(&self, ctx: &Context, event: &Event) -> Result<Vec<u8>, EncodeError> {
        let raw_data = match event.data() {
            Some(data) => {
                let bytes = data
                    .encode_bson()
                    .map_err(|e| EncodeError::Data(e.into()))?;
                Some(RawDocumentBuf::from_bytes(bytes).map_err(|e| EncodeError::Data(e.into()))?)
            }
            None => None,
        };

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

        let bytes = ::bson::to_vec(&wire).map_err(|e| EncodeError::Envelope(e.into()))?;
        tracing::debug!(event = %event, len = bytes.len(), "marshaled event (bson)");
        Ok(bytes)
    }

    fn unmarshal_event(&self, ctx: Context, bytes: &[u8]) -> Result<(Event, Context), DecodeError> {
        let wire: WireEvent =
            ::bson::from_slice(bytes).map_err(|e| DecodeError::Envelope(e.into()))?;

        let data = match &wire.raw_data {
            Some(raw) => {
                let mut data = self.parts.create_data(&wire.event_type)?;
                data.decode_bson(raw.as_bytes())
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
        tracing::debug!(event = %event, "unmarshaled event (bson)");
        Ok((event, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DecodeErrorKind;
    use crate::event::EventPayload;
    use ::bson::{Bson, Document, doc};
    use chrono::TimeZone;
    use eventwire_core::{AggregateId, ContextValue};
    use proptest::prelude::*;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct ItemAdded {
        sku: String,
        quantity: i64,
        tags: Vec<String>,
        note: Option<String>,
    }

    impl EventPayload for ItemAdded {
        const EVENT_TYPE: &'static str = "cart.item_added";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TraceId(String);

    impl ContextValue for TraceId {
        const KEY: &'static str = "trace_id";
    }

    fn codec() -> BsonEventCodec {
        let mut registry = EventDataRegistry::new();
        registry.register::<ItemAdded>().unwrap();
        let context_codec = ContextCodec::default().with::<TraceId>();
        BsonEventCodec::new(Arc::new(registry), Arc::new(context_codec))
    }

    fn timestamp() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    fn sample_event() -> Event {
        let mut metadata = Metadata::new();
        metadata.insert("num".into(), json!(42));
        metadata.insert("nested".into(), json!({"list": [1, "two", 3.5], "flag": false}));

        Event::from_payload(
            ItemAdded {
                sku: "SKU-1".into(),
                quantity: 3,
                tags: vec!["gift".into()],
                note: Some("wrap it".into()),
            },
            timestamp(),
        )
        .for_aggregate("cart", AggregateId::new(), 7)
        .with_metadata(metadata)
    }

    fn document(bytes: &[u8]) -> Document {
        ::bson::from_slice(bytes).unwrap()
    }

    fn encode(doc: Document) -> Vec<u8> {
        ::bson::to_vec(&doc).unwrap()
    }

    #[test]
    fn round_trip_with_payload() {
        let codec = codec();
        let event = sample_event();

        let bytes = codec.marshal_event(&Context::background(), &event).unwrap();
        let (decoded, _) = codec.unmarshal_event(Context::background(), &bytes).unwrap();

        assert_eq!(decoded, event);
        assert_eq!(decoded.data_as::<ItemAdded>().unwrap().note.as_deref(), Some("wrap it"));
    }

    #[test]
    fn wire_document_has_expected_fields() {
        let event = sample_event();
        let bytes = codec().marshal_event(&Context::background(), &event).unwrap();
        let doc = document(&bytes);

        assert_eq!(doc.get_str("_id").unwrap(), event.aggregate_id().to_string());
        assert_eq!(doc.get_str("aggregate_type").unwrap(), "cart");
        assert_eq!(doc.get_str("event_type").unwrap(), "cart.item_added");
        assert!(matches!(doc.get("version"), Some(Bson::Int64(7)) | Some(Bson::Int32(7))));
        assert_eq!(
            doc.get_datetime("timestamp").unwrap().timestamp_millis(),
            1_700_000_000_123
        );
        assert!(doc.get_document("context").unwrap().is_empty());
        assert_eq!(doc.get_document("data").unwrap().get_str("sku").unwrap(), "SKU-1");
    }

    #[test]
    fn round_trip_without_payload_omits_data_field() {
        let codec = codec();
        let event = Event::new("cart.emptied", None, timestamp()).for_aggregate("cart", AggregateId::new(), 2);

        let bytes = codec.marshal_event(&Context::background(), &event).unwrap();
        let doc = document(&bytes);
        assert!(!doc.contains_key("data"));
        assert!(doc.get_document("metadata").unwrap().is_empty());
        assert!(doc.get_document("context").unwrap().is_empty());

        // No payload means no registry lookup, even for an unregistered type.
        let (decoded, _) = codec.unmarshal_event(Context::background(), &bytes).unwrap();
        assert!(decoded.data().is_none());
        assert_eq!(decoded, event);
    }

    #[test]
    fn unregistered_event_type_fails_decode() {
        let bytes = encode(doc! {
            "_id": AggregateId::new().to_string(),
            "aggregate_type": "cart",
            "event_type": "cart.unknown",
            "version": 1_i64,
            "timestamp": ::bson::DateTime::from_millis(1_700_000_000_000),
            "metadata": {},
            "context": {},
            "data": { "sku": "x" },
        });

        let err = codec()
            .unmarshal_event(Context::background(), &bytes)
            .unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnregisteredType);
        assert!(err.to_string().contains("cart.unknown"));
    }

    #[test]
    fn malformed_envelope_fails_decode() {
        let err = codec()
            .unmarshal_event(Context::background(), b"definitely not bson")
            .unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::Malformed);
        assert!(matches!(err, DecodeError::Envelope(_)));
    }

    #[test]
    fn malformed_payload_fails_decode() {
        let bytes = encode(doc! {
            "_id": AggregateId::new().to_string(),
            "aggregate_type": "cart",
            "event_type": "cart.item_added",
            "version": 1_i64,
            "timestamp": ::bson::DateTime::from_millis(0),
            "metadata": {},
            "context": {},
            "data": { "sku": 12, "quantity": "three" },
        });

        let err = codec()
            .unmarshal_event(Context::background(), &bytes)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Data(_)));
        assert_eq!(err.kind(), DecodeErrorKind::Malformed);
    }

    #[test]
    fn unparsable_aggregate_id_is_nil_unless_strict() {
        let bytes = encode(doc! {
            "_id": "not-a-uuid",
            "aggregate_type": "cart",
            "event_type": "cart.emptied",
            "version": 3_i64,
            "timestamp": ::bson::DateTime::from_millis(0),
            "metadata": {},
            "context": {},
        });

        let (event, _) = codec()
            .unmarshal_event(Context::background(), &bytes)
            .unwrap();
        assert!(event.aggregate_id().is_nil());
        assert_eq!(event.version(), 3);

        let err = codec()
            .with_strict_aggregate_id(true)
            .unmarshal_event(Context::background(), &bytes)
            .unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::InvalidAggregateId);
    }

    #[test]
    fn context_round_trips_recognized_values() {
        let codec = codec();
        let ctx = Context::background()
            .with_namespace("tenant-a")
            .with_value(TraceId("t-123".into()));

        let bytes = codec.marshal_event(&ctx, &sample_event()).unwrap();
        let (_, restored) = codec.unmarshal_event(Context::background(), &bytes).unwrap();

        assert_eq!(restored.namespace(), "tenant-a");
        assert_eq!(restored.value::<TraceId>(), Some(&TraceId("t-123".into())));
    }

    #[test]
    fn unmarshal_keeps_the_callers_scope() {
        let codec = codec();
        let bytes = codec.marshal_event(&Context::background(), &sample_event()).unwrap();

        let base = Context::background();
        let (_, restored) = codec.unmarshal_event(base.child(), &bytes).unwrap();
        base.cancel();
        assert!(restored.is_cancelled());
    }

    #[test]
    fn non_document_payload_fails_encode() {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        struct Bare(i32);

        impl EventPayload for Bare {
            const EVENT_TYPE: &'static str = "bare";
        }

        let event = Event::from_payload(Bare(1), timestamp());
        let err = codec()
            .marshal_event(&Context::background(), &event)
            .unwrap_err();
        assert!(matches!(err, EncodeError::Data(_)));
    }

    #[test]
    fn codec_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BsonEventCodec>();

        let codec = Arc::new(codec());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let codec = Arc::clone(&codec);
                std::thread::spawn(move || {
                    let event = sample_event().with_metadata(Metadata::from([("worker".to_string(), json!(i))]));
                    let bytes = codec.marshal_event(&Context::background(), &event).unwrap();
                    let (decoded, _) = codec.unmarshal_event(Context::background(), &bytes).unwrap();
                    assert_eq!(decoded, event);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    proptest! {
        #[test]
        fn envelope_round_trips(
            aggregate_type in "[a-z_.]{0,16}",
            version in 0u64..=i64::MAX as u64,
            millis in 0i64..4_102_444_800_000,
            sku in "[a-zA-Z0-9 _-]{0,24}",
            quantity in any::<i64>(),
            meta in proptest::collection::hash_map("[a-z]{1,8}", any::<i64>(), 0..4),
        ) {
            let codec = codec();
            let metadata: Metadata = meta.into_iter().map(|(k, v)| (k, json!(v))).collect();
            let event = Event::from_payload(
                ItemAdded { sku, quantity, ..Default::default() },
                Utc.timestamp_millis_opt(millis).unwrap(),
            )
            .for_aggregate(aggregate_type, AggregateId::new(), version)
            .with_metadata(metadata);

            let bytes = codec.marshal_event(&Context::background(), &event).unwrap();
            let (decoded, _) = codec.unmarshal_event(Context::background(), &bytes).unwrap();
            prop_assert_eq!(decoded, event);
        }
    }
}
