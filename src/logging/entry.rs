use serde::Serialize;
use serde_json::{Map, Value};

use crate::logging::context::RequestContext;

/// Structured fields handed to the logger with every message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEntry {
    Request(RequestEntry),
    Response(ResponseEntry),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestEntry {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestEntry {
    /// Entry for an incoming request. The request body is only attached when
    /// `with_body` is set.
    pub fn from_context(ctx: &RequestContext, with_body: bool) -> Self {
        Self {
            method: ctx.method().to_string(),
            url: ctx.original_url().to_string(),
            error: None,
            env: ctx.env().map(str::to_string),
            params: ctx.params().cloned(),
            body: if with_body { ctx.request_body().cloned() } else { None },
        }
    }

    /// Same as [`from_context`](Self::from_context), flagged as belonging to a
    /// failed request.
    pub fn failed(ctx: &RequestContext, with_body: bool) -> Self {
        Self {
            error: Some(true),
            ..Self::from_context(ctx, with_body)
        }
    }
}

impl ResponseEntry {
    /// Entry for a response that completed with a non-error status.
    pub fn completed(ctx: &RequestContext, duration: u64, slow: bool, with_body: bool) -> Self {
        let response = ctx.response();
        Self {
            duration: Some(duration),
            method: ctx.method().to_string(),
            url: ctx.original_url().to_string(),
            status: Some(response.status.as_u16()),
            slow: slow.then_some(true),
            message: response.message,
            env: ctx.env().map(str::to_string),
            body: if with_body { response.body } else { None },
            ..Default::default()
        }
    }

    /// Entry for a downstream failure. Carries the request body whenever one
    /// was captured, regardless of level.
    pub fn failed(ctx: &RequestContext, status: Option<u16>, error_message: String) -> Self {
        Self {
            method: ctx.method().to_string(),
            url: ctx.original_url().to_string(),
            status,
            error: Some(true),
            error_message: Some(error_message),
            env: ctx.env().map(str::to_string),
            params: ctx.params().cloned(),
            body: ctx.request_body().cloned(),
            ..Default::default()
        }
    }
}

impl LogEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            LogEntry::Request(_) => "request",
            LogEntry::Response(_) => "response",
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            LogEntry::Request(entry) => entry.body.as_ref(),
            LogEntry::Response(entry) => entry.body.as_ref(),
        }
    }
}

impl From<RequestEntry> for LogEntry {
    fn from(entry: RequestEntry) -> Self {
        LogEntry::Request(entry)
    }
}

impl From<ResponseEntry> for LogEntry {
    fn from(entry: ResponseEntry) -> Self {
        LogEntry::Response(entry)
    }
}
