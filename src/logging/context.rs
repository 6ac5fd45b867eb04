use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::http::{Method, StatusCode};
use serde_json::{Map, Value};

/// Environment tag the hosting application exposes to the request logger.
///
/// Install it as a request extension, e.g. `Extension(AppEnv::new("production"))`,
/// outside of the logging layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEnv(pub String);

impl AppEnv {
    pub fn new(env: impl Into<String>) -> Self {
        Self(env.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Response-side state, filled in as the downstream chain produces a response.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: StatusCode,
    pub message: Option<String>,
    pub body: Option<Value>,
}

impl Default for ResponseSnapshot {
    // Until something downstream answers, the request is unhandled.
    fn default() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: None,
            body: None,
        }
    }
}

/// Everything the request logger reads about one request.
///
/// The request half is fixed when the context is built; the response half is
/// shared with whoever drives the downstream chain and updated as the response
/// comes in.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    url: String,
    original_url: Option<String>,
    env: Option<String>,
    params: Option<Map<String, Value>>,
    request_body: Option<Value>,
    response: Mutex<ResponseSnapshot>,
}

impl RequestContext {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            original_url: None,
            env: None,
            params: None,
            request_body: None,
            response: Mutex::new(ResponseSnapshot::default()),
        }
    }

    pub fn with_original_url(mut self, url: impl Into<String>) -> Self {
        self.original_url = Some(url.into());
        self
    }

    /// Empty tags are treated as unset.
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        let env = env.into();
        self.env = (!env.is_empty()).then_some(env);
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_request_body(mut self, body: Value) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URL as seen by this link of the chain.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL before any rewriting or nesting; falls back to [`url`](Self::url).
    pub fn original_url(&self) -> &str {
        self.original_url.as_deref().unwrap_or(&self.url)
    }

    pub fn env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref()
    }

    pub fn request_body(&self) -> Option<&Value> {
        self.request_body.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.lock_response().status
    }

    pub fn response(&self) -> ResponseSnapshot {
        self.lock_response().clone()
    }

    pub fn set_status(&self, status: StatusCode) {
        self.lock_response().status = status;
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.lock_response().message = Some(message.into());
    }

    pub fn set_response_body(&self, body: Value) {
        self.lock_response().body = Some(body);
    }

    fn lock_response(&self) -> MutexGuard<'_, ResponseSnapshot> {
        self.response.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type Listener = Box<dyn FnOnce() + Send>;

/// Terminal events of one response.
///
/// `finish` fires when the response has been fully written. `close` fires when
/// the response is released, whether or not it finished first, so a request
/// that completes normally sees both. Each listener runs at most once.
#[derive(Default)]
pub struct ResponseLifecycle {
    on_finish: Option<Listener>,
    on_close: Option<Listener>,
    finished: bool,
}

impl ResponseLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the finish listener, replacing any earlier one.
    pub fn once_finish(&mut self, listener: impl FnOnce() + Send + 'static) {
        self.on_finish = Some(Box::new(listener));
    }

    /// Registers the close listener, replacing any earlier one.
    pub fn once_close(&mut self, listener: impl FnOnce() + Send + 'static) {
        self.on_close = Some(Box::new(listener));
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(listener) = self.on_finish.take() {
            listener();
        }
    }
}

impl Drop for ResponseLifecycle {
    fn drop(&mut self) {
        if let Some(listener) = self.on_close.take() {
            listener();
        }
    }
}

impl fmt::Debug for ResponseLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseLifecycle")
            .field("finish_registered", &self.on_finish.is_some())
            .field("close_registered", &self.on_close.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}
