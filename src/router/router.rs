use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};

use crate::error::HttpError;
use crate::logging::{AppEnv, Logger, RequestLogger, RequestLoggerLayer};

use super::requests::{CreateOrderRequest, SlowQuery};
use super::responses::OrderResponse;
use super::store::OrderStore;

/// Slow route default when no `ms` query parameter is given.
const DEFAULT_SLOW_MS: u64 = 1500;

pub fn create_router<L: Logger + 'static>(
    store: Arc<OrderStore>,
    request_logger: RequestLogger<L>,
    env: AppEnv,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/slow", get(slow))
        .with_state(store)
        .layer(RequestLoggerLayer::from(request_logger))
        .layer(Extension(env))
}

async fn health() -> &'static str {
    "ok"
}

async fn create_order(
    State(store): State<Arc<OrderStore>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), HttpError> {
    if request.quantity == 0 {
        return Err(HttpError::new(StatusCode::UNPROCESSABLE_ENTITY, "quantity must be at least 1"));
    }

    let order = store.create(request).await;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(store): State<Arc<OrderStore>>,
    Path(id): Path<u64>,
) -> Result<Json<OrderResponse>, HttpError> {
    store
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| HttpError::not_found(format!("order {} not found", id)))
}

async fn slow(Query(query): Query<SlowQuery>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(query.ms.unwrap_or(DEFAULT_SLOW_MS))).await;
    "done"
}
