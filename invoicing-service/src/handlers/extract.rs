//! Request extractors that report rejections in the service's error format.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::InvoiceError;

/// JSON body; a parse failure becomes `malformed_request`.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = InvoiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            InvoiceError::MalformedRequest(format!("Invalid JSON body: {}", e.body_text()))
        })?;
        Ok(JsonBody(value))
    }
}

/// Query string; a parse failure becomes `malformed_request`.
pub struct QueryParams<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = InvoiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await.map_err(|e| {
            InvoiceError::MalformedRequest(format!("Invalid query: {}", e.body_text()))
        })?;
        Ok(QueryParams(value))
    }
}

/// Path parameters; an unparseable id becomes `malformed_request`.
pub struct PathParam<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = InvoiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await.map_err(|e| {
            InvoiceError::MalformedRequest(format!("Invalid path: {}", e.body_text()))
        })?;
        Ok(PathParam(value))
    }
}
