//! Request extractors that reject with [`AppError`] so every failure shares
//! the `{"error": ...}` body.

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use relay_common::error::AppError;

/// The `{shop_id}` path segment, validated as a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopId(pub i64);

impl ShopId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.parse::<i64>() {
            Ok(id) if id > 0 => Ok(ShopId(id)),
            _ => Err(AppError::Validation("invalid shopId".to_string())),
        }
    }
}

impl<S> FromRequestParts<S> for ShopId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Validation("invalid shopId".to_string()))?;
        ShopId::parse(&raw)
    }
}

/// JSON body whose parse failures (missing fields, wrong types, bad syntax)
/// become 400 validation errors.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}
