//! Domain models for invoicing-service.

mod invoice;
mod invoice_item;
mod transaction;

pub use invoice::{
    compute_total, line_total, to_money, CreateInvoice, Invoice, InvoiceChanges, InvoiceStatus,
    ListInvoicesFilter, NewInvoice, ReplaceInvoice, UpdateInvoice,
};
pub use invoice_item::{CreateInvoiceItem, InvoiceItem};
pub use transaction::{
    ListTransactionsFilter, NewTransaction, Transaction, TransactionType,
};

use serde::Serialize;

/// A stored enum column held a value this build does not know.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// An invoice with its items and audit transactions.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub transactions: Vec<Transaction>,
}
