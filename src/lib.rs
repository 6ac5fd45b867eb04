//! Request/response logging middleware for axum.
//!
//! [`RequestLogger`](logging::RequestLogger) writes a `request` entry when a
//! request comes in and a `response` entry once the response has been sent,
//! through any leveled [`Logger`](logging::Logger). The formatting and
//! transport of those entries stay with the logger.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use request_logger::logging::{Level, RequestLoggerConfig, RequestLoggerLayer, TracingLogger};
//!
//! let config = RequestLoggerConfig::default()
//!     .with_level(Level::Info)
//!     .with_time_limit(500);
//!
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .layer(RequestLoggerLayer::new(TracingLogger::new(), config));
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod router;
