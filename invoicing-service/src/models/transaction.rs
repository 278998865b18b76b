//! Audit transaction model for invoicing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UnknownVariant;

/// Kind of money movement recorded against an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Recorded once when the invoice is created.
    Sale,
    /// Recorded once when the invoice is paid.
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Payment => "payment",
        }
    }
}

impl TryFrom<String> for TransactionType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "sale" => Ok(TransactionType::Sale),
            "payment" => Ok(TransactionType::Payment),
            _ => Err(UnknownVariant {
                kind: "transaction type",
                value,
            }),
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub invoice_id: Uuid,
    #[sqlx(try_from = "String")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

/// Row values for a new audit record.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

impl NewTransaction {
    pub fn new(invoice_id: Uuid, transaction_type: TransactionType, amount: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            invoice_id,
            transaction_type,
            amount,
            date: Utc::now(),
        }
    }
}

/// Filter parameters for listing transactions.
#[derive(Debug, Clone, Default)]
pub struct ListTransactionsFilter {
    pub invoice_ids: Option<Vec<Uuid>>,
    pub transaction_type: Option<TransactionType>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
