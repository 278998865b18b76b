//! Read-only audit transaction handlers.

use axum::{extract::State, Json};
use serde::Deserialize;
use service_core::middleware::auth::AuthUser;
use uuid::Uuid;

use crate::error::InvoiceError;
use crate::handlers::extract::{PathParam, QueryParams};
use crate::models::{ListTransactionsFilter, Transaction, TransactionType};
use crate::services::TransactionPage;
use crate::startup::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    pub invoice_id: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

impl From<ListTransactionsQuery> for ListTransactionsFilter {
    fn from(query: ListTransactionsQuery) -> Self {
        Self {
            invoice_ids: query.invoice_id.map(|id| vec![id]),
            transaction_type: query.transaction_type,
            page_size: query.page_size.unwrap_or_default(),
            page_token: query.page_token,
        }
    }
}

pub async fn list_transactions(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    QueryParams(query): QueryParams<ListTransactionsQuery>,
) -> Result<Json<TransactionPage>, InvoiceError> {
    let page = state
        .invoices
        .list_transactions(&principal, query.into())
        .await?;
    Ok(Json(page))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    PathParam(transaction_id): PathParam<Uuid>,
) -> Result<Json<Transaction>, InvoiceError> {
    let transaction = state
        .invoices
        .get_transaction(&principal, transaction_id)
        .await?;
    Ok(Json(transaction))
}
