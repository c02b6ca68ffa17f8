use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use eventwire_core::Context;

use crate::command::Command;

/// Failure reported by a command handler.
///
/// `Rejected` is the default classification (`?` on an `anyhow::Error`
/// produces it). `Internal` lets a handler flag a genuine server-side fault;
/// whether transports treat it differently is their configuration.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Rejected(#[from] anyhow::Error),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl HandlerError {
    pub fn rejected(msg: impl core::fmt::Display + core::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Rejected(anyhow::Error::msg(msg))
    }

    pub fn internal(msg: impl core::fmt::Display + core::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Internal(anyhow::Error::msg(msg))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// A structured reply value, rendered as JSON by the transport.
pub trait Reply: Send + Sync {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T: Serialize + Send + Sync> Reply for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Box `value` as a present reply.
pub fn reply<T: Serialize + Send + Sync + 'static>(value: T) -> Option<Box<dyn Reply>> {
    Some(Box::new(value))
}

/// Handles a command without producing a value.
///
/// `ctx` is the scope the handler runs in; it is owned by the caller that
/// built it and is not tied to any transport connection.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle_command(&self, ctx: Context, command: Box<dyn Command>) -> Result<(), HandlerError>;
}

/// Handles a command and optionally returns a reply value.
#[async_trait]
pub trait CommandHandlerWithReply: Send + Sync {
    async fn handle_command_with_reply(
        &self,
        ctx: Context,
        command: Box<dyn Command>,
    ) -> Result<Option<Box<dyn Reply>>, HandlerError>;
}
