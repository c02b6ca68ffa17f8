use std::any::Any;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use serde_json::value::RawValue;

use eventwire_core::AggregateId;

/// Free-form, string-keyed event metadata. Opaque to the codecs.
pub type Metadata = HashMap<String, JsonValue>;

/// Type-erased event payload.
///
/// The registry hands out fresh, empty values of this trait; a codec then
/// decodes the raw payload *into* that value. Implement [`EventPayload`]
/// instead of this trait directly.
pub trait EventData: Any + core::fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn clone_box(&self) -> Box<dyn EventData>;

    /// Deep equality against another (possibly differently typed) payload.
    fn eq_data(&self, other: &dyn EventData) -> bool;

    fn encode_bson(&self) -> Result<Vec<u8>, bson::ser::Error>;

    fn decode_bson(&mut self, bytes: &[u8]) -> Result<(), bson::de::Error>;

    fn encode_json(&self) -> serde_json::Result<Box<RawValue>>;

    fn decode_json(&mut self, json: &str) -> serde_json::Result<()>;
}

/// A concrete event payload shape, registered under `EVENT_TYPE`.
///
/// As with commands, decoding replaces the instance created by the registry
/// rather than filling it in. Missing fields are errors unless the container
/// carries `#[serde(default)]`.
pub trait EventPayload:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + core::fmt::Debug + Send + Sync + 'static
{
    const EVENT_TYPE: &'static str;
}

impl<T: EventPayload> EventData for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn EventData> {
        Box::new(self.clone())
    }

    fn eq_data(&self, other: &dyn EventData) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| o == self)
    }

    fn encode_bson(&self) -> Result<Vec<u8>, bson::ser::Error> {
        bson::to_vec(self)
    }

    fn decode_bson(&mut self, bytes: &[u8]) -> Result<(), bson::de::Error> {
        *self = bson::from_slice(bytes)?;
        Ok(())
    }

    fn encode_json(&self) -> serde_json::Result<Box<RawValue>> {
        serde_json::value::to_raw_value(self)
    }

    fn decode_json(&mut self, json: &str) -> serde_json::Result<()> {
        *self = serde_json::from_str(json)?;
        Ok(())
    }
}

impl dyn EventData {
    pub fn is<T: EventData>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: EventData>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl Clone for Box<dyn EventData> {
    fn clone(&self) -> Self {
        (**self).clone_box()
    }
}

/// An immutable fact about an aggregate.
///
/// Built once by domain code and never mutated afterwards; the builder
/// methods consume `self`.
#[derive(Debug, Clone)]
pub struct Event {
    event_type: String,
    data: Option<Box<dyn EventData>>,
    timestamp: DateTime<Utc>,
    aggregate_type: String,
    aggregate_id: AggregateId,
    version: u64,
    metadata: Metadata,
}

impl Event {
    /// An event not yet bound to an aggregate (nil id, empty type, version 0).
    pub fn new(
        event_type: impl Into<String>,
        data: Option<Box<dyn EventData>>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp,
            aggregate_type: String::new(),
            aggregate_id: AggregateId::nil(),
            version: 0,
            metadata: Metadata::new(),
        }
    }

    /// An event carrying `payload`, typed by `T::EVENT_TYPE`.
    pub fn from_payload<T: EventPayload>(payload: T, timestamp: DateTime<Utc>) -> Self {
        Self::new(T::EVENT_TYPE, Some(Box::new(payload)), timestamp)
    }

    pub fn for_aggregate(
        mut self,
        aggregate_type: impl Into<String>,
        aggregate_id: AggregateId,
        version: u64,
    ) -> Self {
        self.aggregate_type = aggregate_type.into();
        self.aggregate_id = aggregate_id;
        self.version = version;
        self
    }

    /// Merge `metadata` into the event's metadata. Later keys win.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> Option<&dyn EventData> {
        self.data.as_deref()
    }

    /// The payload, if present and of type `T`.
    pub fn data_as<T: EventData>(&self) -> Option<&T> {
        self.data()?.downcast_ref::<T>()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        let same_data = match (self.data(), other.data()) {
            (Some(a), Some(b)) => a.eq_data(b),
            (None, None) => true,
            _ => false,
        };

        same_data
            && self.event_type == other.event_type
            && self.timestamp == other.timestamp
            && self.aggregate_type == other.aggregate_type
            && self.aggregate_id == other.aggregate_id
            && self.version == other.version
            && self.metadata == other.metadata
    }
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.event_type, self.version)
    }
}
