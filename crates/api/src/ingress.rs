//! HTTP command ingress.
//!
//! One endpoint per command type. Per request:
//!
//! ```text
//! POST body
//!   ↓
//! 1. Method gate (POST only)                          → 405
//!   ↓
//! 2. Fresh, empty command from the registry           → 400 if unregistered
//!   ↓
//! 3. Read body (bounded)                              → 400
//!   ↓
//! 4. Decode JSON body into the command                → 400
//!   ↓
//! 5. Run the handler on its own task, own Context     → 400 (or 500, see below)
//!   ↓
//! 6. 200, empty body or JSON reply                    → 500 if the reply can't be encoded
//! ```
//!
//! ## Handler scope
//!
//! The handler always runs under `Context::background()` on a spawned task.
//! Its scope is never derived from the inbound request: a client that
//! disconnects, or a server that times the request out, drops only the
//! response future. Work the handler started (and anything it triggers
//! downstream) runs to completion.
//!
//! ## Handler errors
//!
//! Every handler error is a client error (400) unless
//! [`IngressOptions::separate_server_faults`] is set, in which case errors
//! built with [`HandlerError::Internal`] become 500.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, any};
use tokio::task::JoinError;

use eventwire_core::Context;
use eventwire_events::{Command, CommandHandler, CommandHandlerWithReply, CommandRegistry, HandlerError};

use crate::errors::IngressError;

/// Default request body limit (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IngressOptions {
    /// Bodies larger than this are rejected as unreadable.
    pub max_body_bytes: usize,
    /// Map `HandlerError::Internal` to 500 instead of 400.
    pub separate_server_faults: bool,
}

impl Default for IngressOptions {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            separate_server_faults: false,
        }
    }
}

/// Ingress endpoint for a single command type.
#[derive(Debug, Clone)]
pub struct CommandIngress {
    registry: Arc<CommandRegistry>,
    command_type: Arc<str>,
    options: IngressOptions,
}

impl CommandIngress {
    pub fn new(registry: Arc<CommandRegistry>, command_type: impl Into<String>) -> Self {
        Self {
            registry,
            command_type: Arc::from(command_type.into()),
            options: IngressOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IngressOptions) -> Self {
        self.options = options;
        self
    }

    pub fn command_type(&self) -> &str {
        &self.command_type
    }

    /// Route that dispatches to `handler` and answers with an empty 200.
    pub fn handler(self, handler: Arc<dyn CommandHandler>) -> MethodRouter {
        any(dispatch).with_state(Dispatch {
            ingress: self,
            handler,
        })
    }

    /// Route that dispatches to `handler` and answers with its JSON reply, if any.
    pub fn handler_with_reply(self, handler: Arc<dyn CommandHandlerWithReply>) -> MethodRouter {
        any(dispatch_with_reply).with_state(DispatchWithReply {
            ingress: self,
            handler,
        })
    }

    /// Steps 1-4: method gate, fresh command, body, decode.
    async fn decode(&self, req: Request) -> Result<Box<dyn Command>, IngressError> {
        if req.method() != Method::POST {
            return Err(IngressError::MethodNotAllowed(req.method().clone()));
        }

        let mut command = self.registry.create(&self.command_type)?;

        let body = axum::body::to_bytes(req.into_body(), self.options.max_body_bytes)
            .await
            .map_err(IngressError::ReadBody)?;

        command
            .decode_json(&body)
            .map_err(IngressError::DecodeCommand)?;

        Ok(command)
    }

    fn handler_failure(&self, err: HandlerError) -> IngressError {
        if self.options.separate_server_faults && err.is_internal() {
            IngressError::HandlerFault(err)
        } else {
            IngressError::Rejected(err)
        }
    }

    fn reject(&self, err: IngressError) -> Response {
        let class = err.class();
        tracing::warn!(
            command_type = %self.command_type,
            status = class.status().as_u16(),
            error = %err,
            "command rejected"
        );
        err.into_response()
    }
}

#[derive(Clone)]
struct Dispatch {
    ingress: CommandIngress,
    handler: Arc<dyn CommandHandler>,
}

#[derive(Clone)]
struct DispatchWithReply {
    ingress: CommandIngress,
    handler: Arc<dyn CommandHandlerWithReply>,
}

/// Run `fut` on its own task. Dropping the returned future does not cancel it.
async fn detached<F>(fut: F) -> Result<F::Output, JoinError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(fut).await
}

async fn dispatch(State(state): State<Dispatch>, req: Request) -> Response {
    let ingress = &state.ingress;
    let command = match ingress.decode(req).await {
        Ok(command) => command,
        Err(e) => return ingress.reject(e),
    };

    let handler = Arc::clone(&state.handler);
    let outcome = detached(async move { handler.handle_command(Context::background(), command).await }).await;

    match outcome {
        Ok(Ok(())) => {
            tracing::debug!(command_type = %ingress.command_type, "command handled");
            StatusCode::OK.into_response()
        }
        Ok(Err(e)) => ingress.reject(ingress.handler_failure(e)),
        Err(e) => ingress.reject(IngressError::HandlerAborted(e)),
    }
}

async fn dispatch_with_reply(State(state): State<DispatchWithReply>, req: Request) -> Response {
    let ingress = &state.ingress;
    let command = match ingress.decode(req).await {
        Ok(command) => command,
        Err(e) => return ingress.reject(e),
    };

    let handler = Arc::clone(&state.handler);
    let outcome = detached(async move {
        handler
            .handle_command_with_reply(Context::background(), command)
            .await
    })
    .await;

    let reply = match outcome {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => return ingress.reject(ingress.handler_failure(e)),
        Err(e) => return ingress.reject(IngressError::HandlerAborted(e)),
    };

    tracing::debug!(
        command_type = %ingress.command_type,
        has_reply = reply.is_some(),
        "command handled"
    );

    let Some(reply) = reply else {
        return StatusCode::OK.into_response();
    };

    match reply.to_json() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => ingress.reject(IngressError::EncodeReply(e)),
    }
}
