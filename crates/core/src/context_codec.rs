//! Portable snapshots of a [`Context`].
//!
//! Only *recognized* keys survive a snapshot. A key becomes recognized by
//! registering its [`ContextValue`] type with a [`ContextCodec`]. Cancellation
//! and deadlines are never captured: they belong to the local scope.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde_json::Value as JsonValue;

use crate::context::{Context, ContextValue, Namespace};

/// Ordered key/value capture of a context's recognized values.
pub type ContextSnapshot = BTreeMap<String, JsonValue>;

trait ContextMarshaler: Send + Sync {
    fn key(&self) -> &'static str;

    fn snapshot(&self, ctx: &Context) -> Option<JsonValue>;

    fn restore(&self, ctx: Context, value: &JsonValue) -> Context;
}

struct TypedMarshaler<T>(PhantomData<fn() -> T>);

impl<T: ContextValue> ContextMarshaler for TypedMarshaler<T> {
    fn key(&self) -> &'static str {
        T::KEY
    }

    fn snapshot(&self, ctx: &Context) -> Option<JsonValue> {
        let value = ctx.value::<T>()?;
        match serde_json::to_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key = T::KEY, error = %e, "skipping unserializable context value");
                None
            }
        }
    }

    fn restore(&self, ctx: Context, value: &JsonValue) -> Context {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(v) => ctx.with_value(v),
            Err(e) => {
                tracing::warn!(key = T::KEY, error = %e, "ignoring malformed context value");
                ctx
            }
        }
    }
}

/// Converts between a [`Context`] and a [`ContextSnapshot`].
///
/// Holds no per-call state; share it behind an `Arc` once registration is done.
pub struct ContextCodec {
    marshalers: Vec<Box<dyn ContextMarshaler>>,
}

impl ContextCodec {
    /// A codec that recognizes no keys.
    pub fn empty() -> Self {
        Self {
            marshalers: Vec::new(),
        }
    }

    /// Recognize `T::KEY`. Registering a key twice replaces the earlier type.
    pub fn register<T: ContextValue>(&mut self) -> &mut Self {
        self.marshalers.retain(|m| m.key() != T::KEY);
        self.marshalers.push(Box::new(TypedMarshaler::<T>(PhantomData)));
        self
    }

    pub fn with<T: ContextValue>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn recognizes(&self, key: &str) -> bool {
        self.marshalers.iter().any(|m| m.key() == key)
    }

    /// Capture the recognized values present in `ctx`.
    pub fn snapshot(&self, ctx: &Context) -> ContextSnapshot {
        self.marshalers
            .iter()
            .filter_map(|m| m.snapshot(ctx).map(|v| (m.key().to_string(), v)))
            .collect()
    }

    /// Merge the recognized entries of `snapshot` into `base`.
    ///
    /// `base` keeps its own cancellation scope and deadline; unknown keys are ignored.
    pub fn restore(&self, base: Context, snapshot: &ContextSnapshot) -> Context {
        self.marshalers.iter().fold(base, |ctx, m| match snapshot.get(m.key()) {
            Some(value) => m.restore(ctx, value),
            None => ctx,
        })
    }
}

impl Default for ContextCodec {
    /// Recognizes [`Namespace`].
    fn default() -> Self {
        Self::empty().with::<Namespace>()
    }
}

impl core::fmt::Debug for ContextCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.marshalers.iter().map(|m| m.key()))
            .finish()
    }
}
