//! Order routes.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use relay_common::error::AppError;
use relay_common::types::{CreateOrderInput, ListOrdersResult, OrderSendResult};

use crate::extract::{JsonBody, ShopId};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/shops/{shop_id}/orders",
        post(create_order).get(list_orders),
    )
}

/// Pagination query; out-of-range values are clamped by the service.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /shops/:shop_id/orders — Create an order and dispatch its notification.
///
/// Always 201 once the order is stored; delivery happens in the background.
async fn create_order(
    State(state): State<AppState>,
    ShopId(shop_id): ShopId,
    JsonBody(input): JsonBody<CreateOrderInput>,
) -> Result<(StatusCode, Json<OrderSendResult>), AppError> {
    let result = state.service.create_order(shop_id, input).await?;

    tracing::info!(
        shop_id,
        order_id = result.order.id,
        send_status = %result.send_status,
        "Order created"
    );

    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /shops/:shop_id/orders — Page through orders with their send status.
async fn list_orders(
    State(state): State<AppState>,
    ShopId(shop_id): ShopId,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<ListOrdersResult>, AppError> {
    let Query(params) = params.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let page = state
        .service
        .list_orders(shop_id, params.limit.unwrap_or(0), params.offset.unwrap_or(0))
        .await?;
    Ok(Json(page))
}
