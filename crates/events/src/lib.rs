//! Commands, events and their polymorphic wire encoding.
//!
//! - [`Command`] / [`EventData`]: type-erased payloads, created empty by a
//!   [`Registry`] and filled by a decoder
//! - [`CommandHandler`] / [`CommandHandlerWithReply`]: the capabilities a
//!   transport drives
//! - [`codec`]: `Event` <-> bytes (BSON, JSON)

pub mod codec;
pub mod command;
pub mod event;
pub mod handler;
pub mod registry;

pub use codec::{
    BsonEventCodec, DecodeError, DecodeErrorKind, EncodeError, EventCodec, JsonEventCodec,
};
pub use command::{Command, CommandPayload};
pub use event::{Event, EventData, EventPayload, Metadata};
pub use handler::{CommandHandler, CommandHandlerWithReply, HandlerError, Reply, reply};
pub use registry::{CommandRegistry, EventDataRegistry, Registry, RegistryError};
