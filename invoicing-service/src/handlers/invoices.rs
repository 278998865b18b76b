//! Invoice handlers.
//!
//! Every route here sits behind the bearer middleware; the principal it
//! attaches is passed on to the lifecycle service with each call.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use service_core::middleware::auth::AuthUser;
use uuid::Uuid;

use crate::error::InvoiceError;
use crate::handlers::extract::{JsonBody, PathParam, QueryParams};
use crate::models::{
    CreateInvoice, InvoiceDetail, InvoiceStatus, ListInvoicesFilter, ReplaceInvoice,
    UpdateInvoice,
};
use crate::services::InvoicePage;
use crate::startup::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

impl From<ListInvoicesQuery> for ListInvoicesFilter {
    fn from(query: ListInvoicesQuery) -> Self {
        Self {
            status: query.status,
            page_size: query.page_size.unwrap_or_default(),
            page_token: query.page_token,
        }
    }
}

pub async fn create_invoice(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody<CreateInvoice>,
) -> Result<(StatusCode, Json<InvoiceDetail>), InvoiceError> {
    let detail = state.invoices.create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    QueryParams(query): QueryParams<ListInvoicesQuery>,
) -> Result<Json<InvoicePage>, InvoiceError> {
    let page = state.invoices.list(&principal, query.into()).await?;
    Ok(Json(page))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(invoice_id): PathParam<Uuid>,
) -> Result<Json<InvoiceDetail>, InvoiceError> {
    Ok(Json(state.invoices.get(&principal, invoice_id).await?))
}

/// Full update: name and items are required.
pub async fn replace_invoice(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(invoice_id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<ReplaceInvoice>,
) -> Result<Json<InvoiceDetail>, InvoiceError> {
    let detail = state
        .invoices
        .update(&principal, invoice_id, payload.into())
        .await?;
    Ok(Json(detail))
}

pub async fn patch_invoice(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(invoice_id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateInvoice>,
) -> Result<Json<InvoiceDetail>, InvoiceError> {
    let detail = state.invoices.update(&principal, invoice_id, payload).await?;
    Ok(Json(detail))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(invoice_id): PathParam<Uuid>,
) -> Result<StatusCode, InvoiceError> {
    state.invoices.delete(&principal, invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pay_invoice(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(invoice_id): PathParam<Uuid>,
) -> Result<Json<InvoiceDetail>, InvoiceError> {
    Ok(Json(state.invoices.pay(&principal, invoice_id).await?))
}

pub async fn recompute_invoice(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(invoice_id): PathParam<Uuid>,
) -> Result<Json<InvoiceDetail>, InvoiceError> {
    let detail = state
        .invoices
        .recompute_total(&principal, invoice_id)
        .await?;
    Ok(Json(detail))
}
