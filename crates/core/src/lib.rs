//! `eventwire-core`: primitives shared by the codecs and the command ingress.
//!
//! No transport or encoding concerns live here.

pub mod context;
pub mod context_codec;
pub mod error;
pub mod id;

pub use context::{Context, ContextValue, DEFAULT_NAMESPACE, Namespace};
pub use context_codec::{ContextCodec, ContextSnapshot};
pub use error::{CoreError, CoreResult};
pub use id::AggregateId;
