//! Request-scoped context passed explicitly through handlers and codecs.
//!
//! A [`Context`] bundles three things:
//! - a cancellation scope ([`CancellationToken`])
//! - an optional deadline
//! - a small typed value map (namespace, correlation ids, ...)
//!
//! Contexts are cheap to clone. Values are copy-on-write: `with_value` on a
//! clone never affects the original.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Namespace used when a context carries none.
pub const DEFAULT_NAMESPACE: &str = "default";

type ValueMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<ValueMap>,
}

impl Context {
    /// A fresh root scope: not cancelled, no deadline, no values.
    ///
    /// Nothing outside the returned value can cancel it.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            values: Arc::default(),
        }
    }

    /// Derive a scope that is cancelled whenever `self` is.
    ///
    /// Cancelling the child does not cancel the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        }
    }

    /// Attach a deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Resolves once this scope is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Return a context carrying `value`, replacing any previous value of the same type.
    pub fn with_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.values).insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| (**v).downcast_ref::<T>())
    }

    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        self.with_value(Namespace::new(namespace))
    }

    /// The namespace carried by this context, or [`DEFAULT_NAMESPACE`].
    pub fn namespace(&self) -> &str {
        self.value::<Namespace>()
            .map(Namespace::as_str)
            .unwrap_or(DEFAULT_NAMESPACE)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("values", &self.values.len())
            .finish()
    }
}

/// A context value that can cross a process boundary.
///
/// `KEY` is the entry name used in a [`ContextSnapshot`](crate::ContextSnapshot)
/// and must be stable across releases.
pub trait ContextValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KEY: &'static str;
}

/// Logical partition of data (tenant, environment, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self(namespace.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ContextValue for Namespace {
    const KEY: &'static str = "namespace";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct RequestId(u32);

    #[test]
    fn background_scopes_are_independent() {
        let a = Context::background();
        let b = Context::background();
        a.cancel();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
    }

    #[test]
    fn child_follows_parent_but_not_the_reverse() {
        let parent = Context::background();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn values_are_copy_on_write() {
        let base = Context::background().with_value(RequestId(1));
        let derived = base.clone().with_value(RequestId(2));

        assert_eq!(base.value::<RequestId>(), Some(&RequestId(1)));
        assert_eq!(derived.value::<RequestId>(), Some(&RequestId(2)));
        assert_eq!(Context::background().value::<RequestId>(), None);
    }

    #[test]
    fn namespace_defaults_when_absent() {
        assert_eq!(Context::background().namespace(), DEFAULT_NAMESPACE);
        assert_eq!(Context::background().with_namespace("tenant-a").namespace(), "tenant-a");
    }

    #[test]
    fn earliest_deadline_wins() {
        let now = Instant::now();
        let soon = now + Duration::from_secs(1);
        let later = now + Duration::from_secs(60);

        let ctx = Context::background().with_deadline(soon).with_deadline(later);
        assert_eq!(ctx.deadline(), Some(soon));
        assert!(!ctx.is_expired());

        let expired = Context::background().with_deadline(now);
        assert!(expired.is_expired());
        assert!(expired.is_done());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_on_cancel() {
        let ctx = Context::background();
        let waiter = ctx.child();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        ctx.cancel();
        handle.await.unwrap();
    }
}
