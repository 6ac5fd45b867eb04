use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::DownstreamError;
use crate::logging::config::RequestLoggerConfig;
use crate::logging::context::{RequestContext, ResponseLifecycle};
use crate::logging::entry::{LogEntry, RequestEntry, ResponseEntry};
use crate::logging::level::Level;
use crate::logging::logger::Logger;

/// Logs a request when it comes in and its response when it goes out.
///
/// In `catch_errors` mode it stays quiet unless the downstream chain fails,
/// then logs both sides of the failed request at `error` and hands the error
/// back untouched.
pub struct RequestLogger<L> {
  logger: Arc<L>,
  config: Arc<RequestLoggerConfig>,
}

impl<L> Clone for RequestLogger<L> {
  fn clone(&self) -> Self {
    Self {
      logger: Arc::clone(&self.logger),
      config: Arc::clone(&self.config),
    }
  }
}

impl<L: Logger + 'static> RequestLogger<L> {
  pub fn new(logger: L, config: RequestLoggerConfig) -> Self {
    Self::from_shared(Arc::new(logger), config)
  }

  pub fn from_shared(logger: Arc<L>, config: RequestLoggerConfig) -> Self {
    Self {
      logger,
      config: Arc::new(config),
    }
  }

  pub fn config(&self) -> &RequestLoggerConfig {
    &self.config
  }

  pub fn logger(&self) -> &Arc<L> {
    &self.logger
  }

  /// Runs `next` for one request, logging around it.
  ///
  /// The response entry is produced by a completion handler registered on
  /// `lifecycle`, so it is written once the response finishes or is dropped,
  /// not when `next` resolves.
  pub async fn handle<F, T, E>(
    &self,
    ctx: Arc<RequestContext>,
    lifecycle: &mut ResponseLifecycle,
    next: F,
  ) -> Result<T, E>
  where
    F: Future<Output = Result<T, E>>,
    E: DownstreamError,
  {
    let start = Instant::now();

    if !self.config.catch_errors {
      let entry = RequestEntry::from_context(&ctx, self.config.logs_bodies());
      self.logger.log(
        self.config.level,
        &entry.into(),
        &format!("<-- {} {}", ctx.method(), ctx.url()),
      );
    }

    // Registered for both terminal events. The guard inside makes sure a
    // request that sees finish and then close only logs once.
    let completion = Arc::new(Completion {
      logger: Arc::clone(&self.logger),
      config: Arc::clone(&self.config),
      ctx: Arc::clone(&ctx),
      start,
      logged: AtomicBool::new(false),
    });
    let on_finish = Arc::clone(&completion);
    lifecycle.once_finish(move || on_finish.run());
    lifecycle.once_close(move || completion.run());

    match next.await {
      Ok(value) => Ok(value),
      Err(err) => {
        if self.config.catch_errors {
          self.log_failure(&ctx, start, &err);
        }
        Err(err)
      }
    }
  }

  /// Logs both sides of a failed request at `error`. An error without a status
  /// renders as `(-)` in the message and leaves `status` out of the entry.
  fn log_failure<E: DownstreamError>(&self, ctx: &RequestContext, start: Instant, err: &E) {
    let elapsed = elapsed_ms(start);

    let request = RequestEntry::failed(ctx, self.config.logs_bodies());
    self.logger.log(
      Level::Error,
      &request.into(),
      &format!("<-- {} {}", ctx.method(), ctx.url()),
    );

    let status = err.status();
    let response = ResponseEntry::failed(ctx, status, err.error_message());
    let status = status.map_or_else(|| "-".to_string(), |s| s.to_string());
    self.logger.log(
      Level::Error,
      &response.into(),
      &format!("xxx {} {} ({}) took {} ms", ctx.method(), ctx.url(), status, elapsed),
    );
  }
}

struct Completion<L> {
  logger: Arc<L>,
  config: Arc<RequestLoggerConfig>,
  ctx: Arc<RequestContext>,
  start: Instant,
  logged: AtomicBool,
}

impl<L: Logger> Completion<L> {
  fn run(&self) {
    if self.config.catch_errors {
      return;
    }
    if self.logged.swap(true, Ordering::AcqRel) {
      return;
    }

    let elapsed = elapsed_ms(self.start);
    let status = self.ctx.status();

    // error statuses are left to the failure path
    if status.as_u16() >= 400 {
      return;
    }

    let slow = self.config.is_slow(elapsed);
    let level = if slow { Level::Warn } else { self.config.level };

    let entry: LogEntry =
      ResponseEntry::completed(&self.ctx, elapsed, slow, self.config.logs_bodies()).into();
    self.logger.log(
      level,
      &entry,
      &format!(
        "--> {} {} ({}) took {} ms",
        self.ctx.method(),
        self.ctx.original_url(),
        status.as_u16(),
        elapsed
      ),
    );
  }
}

fn elapsed_ms(start: Instant) -> u64 {
  u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use axum::http::{Method, StatusCode};
  use serde_json::json;

  use super::*;
  use crate::error::HttpError;
  use crate::logging::logger::MemoryLogger;

  fn logger(config: RequestLoggerConfig) -> (Arc<MemoryLogger>, RequestLogger<MemoryLogger>) {
    let memory = Arc::new(MemoryLogger::new());
    (Arc::clone(&memory), RequestLogger::from_shared(memory, config))
  }

  fn context() -> Arc<RequestContext> {
    Arc::new(
      RequestContext::new(Method::GET, "/orders/5")
        .with_request_body(json!({ "note": "secret" })),
    )
  }

  #[tokio::test]
  async fn logs_request_then_response_on_finish() {
    let (memory, request_logger) = logger(RequestLoggerConfig::default());
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();

    let result: Result<&str, HttpError> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, async {
        ctx.set_status(StatusCode::OK);
        ctx.set_message("OK");
        Ok("done")
      })
      .await;
    assert_eq!(result.unwrap(), "done");
    assert_eq!(memory.len(), 1);

    lifecycle.finish();
    drop(lifecycle);

    let records = memory.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].level, Level::Info);
    assert_eq!(records[0].message, "<-- GET /orders/5");
    assert_eq!(
      records[0].entry,
      LogEntry::Request(RequestEntry {
        method: "GET".into(),
        url: "/orders/5".into(),
        ..Default::default()
      })
    );

    assert_eq!(records[1].level, Level::Info);
    match &records[1].entry {
      LogEntry::Response(entry) => {
        assert_eq!(entry.status, Some(200));
        assert_eq!(entry.message.as_deref(), Some("OK"));
        assert_eq!(entry.slow, None);
        assert_eq!(entry.body, None);
        let duration = entry.duration.unwrap();
        assert_eq!(
          records[1].message,
          format!("--> GET /orders/5 (200) took {duration} ms")
        );
      }
      other => panic!("expected a response entry, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn error_status_skips_response_entry() {
    let (memory, request_logger) = logger(RequestLoggerConfig::default());
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();

    let _: Result<(), HttpError> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, async {
        ctx.set_status(StatusCode::NOT_FOUND);
        Ok(())
      })
      .await;
    lifecycle.finish();
    drop(lifecycle);

    let records = memory.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entry.kind(), "request");
  }

  #[tokio::test]
  async fn close_without_finish_still_logs() {
    let (memory, request_logger) = logger(RequestLoggerConfig::default());
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();

    let _: Result<(), HttpError> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, async {
        ctx.set_status(StatusCode::OK);
        Ok(())
      })
      .await;
    drop(lifecycle);

    let records = memory.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].entry.kind(), "response");
  }

  #[tokio::test]
  async fn abandoned_request_stays_silent_on_default_status() {
    let (memory, request_logger) = logger(RequestLoggerConfig::default());
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();

    let _: Result<(), HttpError> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, async { Ok(()) })
      .await;
    drop(lifecycle);

    assert_eq!(memory.len(), 1);
  }

  #[tokio::test]
  async fn slow_responses_are_escalated_to_warn() {
    let config = RequestLoggerConfig::default()
      .with_level(Level::Debug)
      .with_time_limit(5);
    let (memory, request_logger) = logger(config);
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();

    let _: Result<(), HttpError> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        ctx.set_status(StatusCode::OK);
        ctx.set_response_body(json!({ "id": 5 }));
        Ok(())
      })
      .await;
    lifecycle.finish();

    let records = memory.records();
    assert_eq!(records[0].level, Level::Debug);
    assert_eq!(records[0].entry.body(), Some(&json!({ "note": "secret" })));
    assert_eq!(records[1].level, Level::Warn);
    match &records[1].entry {
      LogEntry::Response(entry) => {
        assert_eq!(entry.slow, Some(true));
        assert!(entry.duration.unwrap() > 5);
        assert_eq!(entry.body, Some(json!({ "id": 5 })));
      }
      other => panic!("expected a response entry, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn thrown_errors_pass_through_silently_by_default() {
    let (memory, request_logger) = logger(RequestLoggerConfig::default());
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();

    let result: Result<(), HttpError> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, async {
        Err(HttpError::internal("boom"))
      })
      .await;
    drop(lifecycle);

    assert_eq!(result.unwrap_err().message(), "boom");
    assert_eq!(memory.len(), 1);
  }

  #[tokio::test]
  async fn catch_errors_is_silent_on_success() {
    let (memory, request_logger) = logger(RequestLoggerConfig::default().with_catch_errors(true));
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();

    let _: Result<(), HttpError> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, async {
        ctx.set_status(StatusCode::OK);
        Ok(())
      })
      .await;
    lifecycle.finish();
    drop(lifecycle);

    assert!(memory.is_empty());
  }

  #[tokio::test]
  async fn catch_errors_logs_both_sides_and_returns_same_error() {
    let (memory, request_logger) = logger(RequestLoggerConfig::default().with_catch_errors(true));
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();
    let thrown = Arc::new(HttpError::internal("boom"));

    let result: Result<(), Arc<HttpError>> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, {
        let thrown = Arc::clone(&thrown);
        async move { Err(thrown) }
      })
      .await;
    drop(lifecycle);

    assert!(Arc::ptr_eq(&result.unwrap_err(), &thrown));

    let records = memory.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.level == Level::Error));

    match &records[0].entry {
      LogEntry::Request(entry) => {
        assert_eq!(entry.error, Some(true));
        assert_eq!(entry.body, None);
      }
      other => panic!("expected a request entry, got {other:?}"),
    }
    assert_eq!(records[0].message, "<-- GET /orders/5");

    match &records[1].entry {
      LogEntry::Response(entry) => {
        assert_eq!(entry.error, Some(true));
        assert_eq!(entry.status, Some(500));
        assert_eq!(entry.error_message.as_deref(), Some("boom"));
        assert_eq!(entry.body, Some(json!({ "note": "secret" })));
      }
      other => panic!("expected a response entry, got {other:?}"),
    }
    assert!(records[1].message.starts_with("xxx GET /orders/5 (500) took "));
    assert!(records[1].message.ends_with(" ms"));
  }

  #[tokio::test]
  async fn missing_error_status_is_rendered_as_dash() {
    let (memory, request_logger) = logger(RequestLoggerConfig::default().with_catch_errors(true));
    let ctx = context();
    let mut lifecycle = ResponseLifecycle::new();

    let _: Result<(), std::io::Error> = request_logger
      .handle(Arc::clone(&ctx), &mut lifecycle, async {
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
      })
      .await;

    let records = memory.records();
    assert!(records[1].message.starts_with("xxx GET /orders/5 (-) took "));
    match &records[1].entry {
      LogEntry::Response(entry) => assert_eq!(entry.status, None),
      other => panic!("expected a response entry, got {other:?}"),
    }
  }
}
