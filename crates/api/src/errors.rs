//! Error responses.
//!
//! Every failure is rendered as `{"error": <code>, "message": <text>}` with a
//! status from one of three classes.

use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinError;

use eventwire_events::{HandlerError, RegistryError};

/// Status class of a failed ingress request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    MethodNotAllowed,
    ClientRequestInvalid,
    ServerFault,
}

impl ErrorClass {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorClass::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorClass::ClientRequestInvalid => StatusCode::BAD_REQUEST,
            ErrorClass::ServerFault => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorClass::MethodNotAllowed => "method_not_allowed",
            ErrorClass::ClientRequestInvalid => "invalid_request",
            ErrorClass::ServerFault => "server_fault",
        }
    }
}

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("unsupported method: {0}")]
    MethodNotAllowed(Method),

    #[error("could not create command: {0}")]
    CreateCommand(#[from] RegistryError),

    #[error("could not read command: {0}")]
    ReadBody(#[source] axum::Error),

    #[error("could not decode command: {0}")]
    DecodeCommand(#[source] serde_json::Error),

    /// Handler failure reported as a client error (the default for every handler error).
    #[error("could not handle command: {0}")]
    Rejected(#[source] HandlerError),

    /// Handler failure flagged internal, with server-fault separation enabled.
    #[error("could not handle command: {0}")]
    HandlerFault(#[source] HandlerError),

    #[error("could not encode reply: {0}")]
    EncodeReply(#[source] serde_json::Error),

    #[error("command handler terminated abnormally: {0}")]
    HandlerAborted(#[source] JoinError),
}

impl IngressError {
    pub fn class(&self) -> ErrorClass {
        match self {
            IngressError::MethodNotAllowed(_) => ErrorClass::MethodNotAllowed,
            IngressError::CreateCommand(_)
            | IngressError::ReadBody(_)
            | IngressError::DecodeCommand(_)
            | IngressError::Rejected(_) => ErrorClass::ClientRequestInvalid,
            IngressError::HandlerFault(_)
            | IngressError::EncodeReply(_)
            | IngressError::HandlerAborted(_) => ErrorClass::ServerFault,
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let class = self.class();
        let mut response = json_error(class.status(), class.code(), self.to_string());
        if class == ErrorClass::MethodNotAllowed {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
