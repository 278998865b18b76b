//! Invoice model for invoicing-service.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{CreateInvoiceItem, InvoiceItem, UnknownVariant};

/// Invoice payment status.
///
/// The only transition is `Pending -> Paid`, taken by the pay action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// Whether the pay transition is allowed from this status.
    pub fn can_pay(&self) -> bool {
        matches!(self, InvoiceStatus::Pending)
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            _ => Err(UnknownVariant {
                kind: "invoice status",
                value,
            }),
        }
    }
}

/// Invoice document.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub reference_number: String,
    pub customer_name: String,
    pub date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub total_amount: Decimal,
}

/// Row values for a freshly created invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub id: Uuid,
    pub reference_number: String,
    pub customer_name: String,
    pub date: NaiveDate,
}

impl NewInvoice {
    pub fn new(customer_name: String, date: NaiveDate) -> Self {
        Self {
            id: Uuid::now_v7(),
            reference_number: generate_reference_number(),
            customer_name,
            date,
        }
    }
}

/// Column changes applied by an update.
#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub customer_name: Option<String>,
    pub status: Option<InvoiceStatus>,
}

/// Input for creating an invoice with its items.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoice {
    pub customer_name: String,
    #[serde(default)]
    pub items: Vec<CreateInvoiceItem>,
    /// Read-only; accepted only so a negative value can be rejected.
    #[serde(default)]
    pub total_amount: Option<Decimal>,
}

/// Input for updating an invoice. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInvoice {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub items: Option<Vec<CreateInvoiceItem>>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
}

/// Input for a full replacement (`PUT`): name and items are required.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceInvoice {
    pub customer_name: String,
    #[serde(default)]
    pub items: Vec<CreateInvoiceItem>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
}

impl From<ReplaceInvoice> for UpdateInvoice {
    fn from(input: ReplaceInvoice) -> Self {
        Self {
            customer_name: Some(input.customer_name),
            status: input.status,
            items: Some(input.items),
            total_amount: input.total_amount,
        }
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// `quantity × unit_price` for a single line.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity) * unit_price
}

/// Sum of line totals over an item set, at two fraction digits.
pub fn compute_total<'a>(items: impl IntoIterator<Item = &'a InvoiceItem>) -> Decimal {
    let sum: Decimal = items
        .into_iter()
        .map(|item| line_total(item.quantity, item.unit_price))
        .sum();
    to_money(sum)
}

/// Normalise an amount to two fraction digits.
pub fn to_money(amount: Decimal) -> Decimal {
    let mut amount = amount.round_dp(2);
    amount.rescale(2);
    amount
}

fn generate_reference_number() -> String {
    format!("INV-{}", Uuid::new_v4().simple()).to_uppercase()
}
