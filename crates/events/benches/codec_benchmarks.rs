use std::sync::Arc;

use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde::{Deserialize, Serialize};
use serde_json::json;

use eventwire_core::{AggregateId, Context, ContextCodec};
use eventwire_events::{
    BsonEventCodec, Event, EventCodec, EventDataRegistry, EventPayload, JsonEventCodec, Metadata,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct LineAdded {
    sku: String,
    quantity: i64,
    unit_price_cents: i64,
}

impl EventPayload for LineAdded {
    const EVENT_TYPE: &'static str = "order.line_added";
}

fn sample_event() -> Event {
    Event::from_payload(
        LineAdded {
            sku: "SKU-0042".into(),
            quantity: 3,
            unit_price_cents: 1_999,
        },
        Utc::now(),
    )
    .for_aggregate("order", AggregateId::new(), 12)
    .with_metadata(Metadata::from([("source".to_string(), json!("bench"))]))
}

fn codec_benchmarks(c: &mut Criterion) {
    let mut registry = EventDataRegistry::new();
    registry.register::<LineAdded>().expect("register payload");
    let registry = Arc::new(registry);
    let context_codec = Arc::new(ContextCodec::default());

    let bson = BsonEventCodec::new(Arc::clone(&registry), Arc::clone(&context_codec));
    let json = JsonEventCodec::new(registry, context_codec);

    let ctx = Context::background().with_namespace("bench");
    let event = sample_event();
    let bson_bytes = bson.marshal_event(&ctx, &event).expect("marshal bson");
    let json_bytes = json.marshal_event(&ctx, &event).expect("marshal json");

    c.bench_function("bson_marshal", |b| {
        b.iter(|| bson.marshal_event(black_box(&ctx), black_box(&event)))
    });
    c.bench_function("bson_unmarshal", |b| {
        b.iter(|| bson.unmarshal_event(Context::background(), black_box(&bson_bytes)))
    });
    c.bench_function("json_marshal", |b| {
        b.iter(|| json.marshal_event(black_box(&ctx), black_box(&event)))
    });
    c.bench_function("json_unmarshal", |b| {
        b.iter(|| json.unmarshal_event(Context::background(), black_box(&json_bytes)))
    });
}

criterion_group!(benches, codec_benchmarks);
criterion_main!(benches);
