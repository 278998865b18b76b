//! Invoice item model for invoicing-service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::validation::validate_unit_price;

/// One billable line on an invoice.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvoiceItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Input for a line item, as supplied on create and update.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceItem {
    #[validate(length(
        min = 1,
        max = 255,
        code = "invalid_description",
        message = "Description must be between 1 and 255 characters."
    ))]
    pub description: String,
    #[validate(range(min = 1, code = "invalid_quantity", message = "Quantity must be positive."))]
    pub quantity: i32,
    #[validate(custom(function = "validate_unit_price"))]
    pub unit_price: Decimal,
}
