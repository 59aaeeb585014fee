//! Telegram integration routes.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use relay_common::error::AppError;
use relay_common::types::{ConnectTelegramInput, Integration, TelegramStatus};

use crate::extract::{JsonBody, ShopId};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shops/{shop_id}/telegram/connect", post(connect_telegram))
        .route("/shops/{shop_id}/telegram/status", get(telegram_status))
}

/// POST /shops/:shop_id/telegram/connect — Register or replace the shop's bot.
async fn connect_telegram(
    State(state): State<AppState>,
    ShopId(shop_id): ShopId,
    JsonBody(input): JsonBody<ConnectTelegramInput>,
) -> Result<Json<Integration>, AppError> {
    let integration = state.service.connect_telegram(shop_id, input).await?;
    Ok(Json(integration))
}

/// GET /shops/:shop_id/telegram/status — Integration state and weekly delivery counters.
async fn telegram_status(
    State(state): State<AppState>,
    ShopId(shop_id): ShopId,
) -> Result<Json<TelegramStatus>, AppError> {
    let status = state.service.telegram_status(shop_id).await?;
    Ok(Json(status))
}
