use std::convert::Infallible;
use std::num::ParseIntError;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors raised while reading logger or server settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown log level `{0}`")]
    UnknownLevel(String),

    #[error("invalid time limit `{value}`: {source}")]
    InvalidTimeLimit {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid port `{value}`: {source}")]
    InvalidPort {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid boolean `{0}`, expected true/false")]
    InvalidFlag(String),

    #[error("unknown log format `{0}`, expected `text` or `json`")]
    UnknownFormat(String),
}

/// An error carrying the HTTP status it should be reported with.
///
/// Handlers and services return this to fail a request with a specific status;
/// the request logger reads the status and message back when it records the
/// failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// What the request logger needs to know about an error raised downstream.
///
/// The error itself is never wrapped or replaced, only inspected.
pub trait DownstreamError {
    /// Status the error maps to, if it carries one.
    fn status(&self) -> Option<u16> {
        None
    }

    fn error_message(&self) -> String;
}

impl DownstreamError for HttpError {
    fn status(&self) -> Option<u16> {
        Some(self.status.as_u16())
    }

    fn error_message(&self) -> String {
        self.message.clone()
    }
}

impl DownstreamError for Infallible {
    fn error_message(&self) -> String {
        match *self {}
    }
}

impl DownstreamError for std::io::Error {
    fn error_message(&self) -> String {
        self.to_string()
    }
}

impl DownstreamError for axum::Error {
    fn error_message(&self) -> String {
        self.to_string()
    }
}

impl DownstreamError for Box<dyn std::error::Error + Send + Sync> {
    fn status(&self) -> Option<u16> {
        self.downcast_ref::<HttpError>()
            .map(|err| err.status.as_u16())
    }

    fn error_message(&self) -> String {
        self.to_string()
    }
}

impl<E: DownstreamError + ?Sized> DownstreamError for Arc<E> {
    fn status(&self) -> Option<u16> {
        (**self).status()
    }

    fn error_message(&self) -> String {
        (**self).error_message()
    }
}
