//! Domain errors for invoicing-service and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use service_core::error::{AppError, ErrorBody};
use thiserror::Error;

use crate::services::metrics::ERRORS_TOTAL;
use crate::validation::ValidationFailure;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("Invoice is already paid.")]
    AlreadyPaid,

    #[error("Status can only be changed by paying the invoice.")]
    StatusReadOnly,

    #[error("{0} not found.")]
    NotFound(&'static str),

    #[error("{0}")]
    MalformedRequest(String),

    #[error(transparent)]
    App(#[from] AppError),
}

impl InvoiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            InvoiceError::Validation(_) => "validation_error",
            InvoiceError::AlreadyPaid => "already_paid",
            InvoiceError::StatusReadOnly => "status_read_only",
            InvoiceError::NotFound(_) => "not_found",
            InvoiceError::MalformedRequest(_) => "malformed_request",
            InvoiceError::App(e) => e.kind(),
        }
    }
}

impl IntoResponse for InvoiceError {
    fn into_response(self) -> Response {
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let kind = self.kind();
        match self {
            InvoiceError::Validation(failure) => {
                let details = serde_json::to_value(&failure.violations).unwrap_or_default();
                ErrorBody::new(kind, "Validation failed.")
                    .with_details(details)
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            InvoiceError::AlreadyPaid
            | InvoiceError::StatusReadOnly
            | InvoiceError::MalformedRequest(_) => {
                ErrorBody::new(kind, self.to_string()).into_response_with(StatusCode::BAD_REQUEST)
            }
            InvoiceError::NotFound(_) => {
                ErrorBody::new(kind, self.to_string()).into_response_with(StatusCode::NOT_FOUND)
            }
            InvoiceError::App(err) => err.into_response(),
        }
    }
}
