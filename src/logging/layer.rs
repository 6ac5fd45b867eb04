//! Tower integration for [`RequestLogger`].
//!
//! [`RequestLoggerLayer`] wraps an axum `Router` (or any service taking an
//! axum request) and feeds every request through [`RequestLogger::handle`].
//! The response body is wrapped so the completion handler runs when the body
//! has been fully sent or dropped.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{FromRequestParts, OriginalUri, RawPathParams};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, Response, Uri};
use futures::future::{self, BoxFuture};
use futures::stream::{self, Stream, StreamExt};
use http_body::{Frame, SizeHint};
use http_body_util::{BodyExt, BodyStream, StreamBody};
use hyper::ext::ReasonPhrase;
use pin_project_lite::pin_project;
use serde_json::{Map, Value};
use tower::{BoxError, Layer, Service};

use crate::error::DownstreamError;
use crate::logging::config::RequestLoggerConfig;
use crate::logging::context::{AppEnv, RequestContext, ResponseLifecycle};
use crate::logging::logger::Logger;
use crate::logging::middleware::RequestLogger;

/// Tower layer that runs every request through a [`RequestLogger`].
pub struct RequestLoggerLayer<L> {
    logger: RequestLogger<L>,
}

impl<L: Logger + 'static> RequestLoggerLayer<L> {
    pub fn new(logger: L, config: RequestLoggerConfig) -> Self {
        Self {
            logger: RequestLogger::new(logger, config),
        }
    }
}

impl<L> From<RequestLogger<L>> for RequestLoggerLayer<L> {
    fn from(logger: RequestLogger<L>) -> Self {
        Self { logger }
    }
}

impl<L> Clone for RequestLoggerLayer<L> {
    fn clone(&self) -> Self {
        Self {
            logger: self.logger.clone(),
        }
    }
}

impl<S, L> Layer<S> for RequestLoggerLayer<L> {
    type Service = RequestLoggerService<S, L>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLoggerService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Service produced by [`RequestLoggerLayer`].
pub struct RequestLoggerService<S, L> {
    inner: S,
    logger: RequestLogger<L>,
}

impl<S: Clone, L> Clone for RequestLoggerService<S, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<S, B, L> Service<Request<Body>> for RequestLoggerService<S, L>
where
    S: Service<Request<Body>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: DownstreamError + Send + 'static,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
    L: Logger + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let logger = self.logger.clone();

        Box::pin(async move {
            let config = logger.config().clone();
            let (mut parts, body) = req.into_parts();

            let mut ctx = context_from_parts(&mut parts).await;
            let body = if config.captures_request_body() {
                let (body, value) = capture_body(body, config.max_body_bytes).await;
                if let Some(value) = value {
                    ctx = ctx.with_request_body(value);
                }
                body
            } else {
                body
            };

            let ctx = Arc::new(ctx);
            let req = Request::from_parts(parts, body);
            let mut lifecycle = ResponseLifecycle::new();

            let downstream = {
                let ctx = Arc::clone(&ctx);
                async move {
                    let res = inner.call(req).await?;
                    ctx.set_status(res.status());
                    if let Some(reason) = res.extensions().get::<ReasonPhrase>() {
                        ctx.set_message(String::from_utf8_lossy(reason.as_bytes()));
                    }

                    let (parts, body) = res.into_parts();
                    let body = if config.logs_bodies() {
                        let (body, value) = capture_body(body, config.max_body_bytes).await;
                        if let Some(value) = value {
                            ctx.set_response_body(value);
                        }
                        body
                    } else {
                        Body::new(body)
                    };
                    Ok::<_, S::Error>(Response::from_parts(parts, body))
                }
            };

            let res = logger
                .handle(Arc::clone(&ctx), &mut lifecycle, downstream)
                .await?;
            Ok(res.map(|body| Body::new(LifecycleBody::new(body, lifecycle))))
        })
    }
}

async fn context_from_parts(parts: &mut Parts) -> RequestContext {
    let url = path_and_query(&parts.uri);
    let mut ctx = RequestContext::new(parts.method.clone(), url);

    if let Some(OriginalUri(original)) = parts.extensions.get::<OriginalUri>() {
        ctx = ctx.with_original_url(path_and_query(original));
    }
    if let Some(env) = parts.extensions.get::<AppEnv>() {
        ctx = ctx.with_env(env.as_str());
    }
    // Router::layer and route_layer both run after route matching. Only a layer
    // wrapped around the whole Router from outside sees no params.
    if let Ok(raw) = RawPathParams::from_request_parts(parts, &()).await {
        let params: Map<String, Value> = raw
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();
        ctx = ctx.with_params(params);
    }

    ctx
}

fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Buffers `body` when its size is known to fit in `limit`, returning a body
/// with the same frames and the bytes as a loggable value.
///
/// A body that fails or outgrows `limit` while being read is handed on as-is:
/// the frames read so far are replayed, followed by the error or the rest of
/// the stream. Nothing is logged for it.
async fn capture_body<B>(body: B, limit: usize) -> (Body, Option<Value>)
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|len| len <= limit as u64);
    if !fits {
        return (Body::new(body), None);
    }

    let mut body = Body::new(body);
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut trailers: Option<HeaderMap> = None;
    let mut len = 0;

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => match frame.into_data() {
                Ok(data) => {
                    len += data.len();
                    chunks.push(data);
                    // size hint was wrong
                    if len > limit {
                        return (replay(chunks, trailers, BodyStream::new(body)), None);
                    }
                }
                Err(frame) => {
                    if let Ok(map) = frame.into_trailers() {
                        trailers.get_or_insert_with(HeaderMap::new).extend(map);
                    }
                }
            },
            Err(err) => {
                tracing::debug!(error = %err, "body failed while buffering for request logging");
                let failed = stream::once(future::ready(Err(err)));
                return (replay(chunks, trailers, failed), None);
            }
        }
    }

    let bytes = chunks.concat();
    let value = body_value(&bytes);
    let body = match trailers {
        Some(trailers) => replay(vec![Bytes::from(bytes)], Some(trailers), stream::empty()),
        None => Body::from(bytes),
    };
    (body, value)
}

/// Rebuilds a body from frames already read off the wire, then `rest`.
fn replay<S>(chunks: Vec<Bytes>, trailers: Option<HeaderMap>, rest: S) -> Body
where
    S: Stream<Item = Result<Frame<Bytes>, axum::Error>> + Send + 'static,
{
    let frames = chunks
        .into_iter()
        .map(Frame::data)
        .chain(trailers.map(Frame::trailers))
        .map(Ok);
    Body::new(StreamBody::new(stream::iter(frames).chain(rest)))
}

/// JSON bodies are logged as JSON, other text as a string. Empty or binary
/// bodies are left out.
fn body_value(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_slice::<Value>(bytes) {
        return Some(json);
    }
    std::str::from_utf8(bytes)
        .ok()
        .map(|text| Value::String(text.to_string()))
}

pin_project! {
    /// Response body that reports to a [`ResponseLifecycle`]: `finish` once
    /// the last frame has been read, `close` when the body is dropped.
    pub struct LifecycleBody<B> {
        #[pin]
        inner: B,
        lifecycle: ResponseLifecycle,
    }
}

impl<B> LifecycleBody<B> {
    pub fn new(inner: B, lifecycle: ResponseLifecycle) -> Self {
        Self { inner, lifecycle }
    }
}

impl<B: HttpBody> HttpBody for LifecycleBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let frame = ready!(this.inner.poll_frame(cx));
        if frame.is_none() {
            this.lifecycle.finish();
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
