//! Storage seam for invoicing-service.
//!
//! Reads go straight through [`InvoiceStore`]. Every multi-step write runs
//! inside a [`UnitOfWork`]: nothing it does is visible until `commit`, and
//! dropping it uncommitted discards all of it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    CreateInvoiceItem, Invoice, InvoiceChanges, InvoiceItem, ListInvoicesFilter,
    ListTransactionsFilter, NewInvoice, NewTransaction, Transaction,
};

/// Largest page a list call will return.
pub const MAX_PAGE_SIZE: i32 = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i32 = 50;

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn page_limit(page_size: i32) -> i64 {
    if page_size <= 0 {
        DEFAULT_PAGE_SIZE as i64
    } else {
        page_size.min(MAX_PAGE_SIZE) as i64
    }
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Start an atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError>;

    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;

    /// Invoices ordered by id, after `page_token` when given.
    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError>;

    /// Items belonging to any of the given invoices.
    async fn list_items(&self, invoice_ids: &[Uuid]) -> Result<Vec<InvoiceItem>, AppError>;

    async fn get_transaction(&self, transaction_id: Uuid)
        -> Result<Option<Transaction>, AppError>;

    /// Every transaction of the given invoices, unpaged.
    async fn list_invoice_transactions(
        &self,
        invoice_ids: &[Uuid],
    ) -> Result<Vec<Transaction>, AppError>;

    /// Transactions ordered by id, after `page_token` when given.
    async fn list_transactions(
        &self,
        filter: &ListTransactionsFilter,
    ) -> Result<Vec<Transaction>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    async fn insert_invoice(&mut self, input: &NewInvoice) -> Result<Invoice, AppError>;

    /// Fetch an invoice and hold it against concurrent writers until commit.
    async fn lock_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;

    async fn update_invoice(
        &mut self,
        invoice_id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Invoice, AppError>;

    async fn insert_item(
        &mut self,
        invoice_id: Uuid,
        input: &CreateInvoiceItem,
    ) -> Result<InvoiceItem, AppError>;

    /// Remove every item of an invoice, returning how many were removed.
    async fn delete_items(&mut self, invoice_id: Uuid) -> Result<u64, AppError>;

    /// Σ quantity × unit_price over the invoice's current items.
    async fn sum_items(&mut self, invoice_id: Uuid) -> Result<Decimal, AppError>;

    async fn set_total(&mut self, invoice_id: Uuid, total: Decimal) -> Result<Invoice, AppError>;

    async fn insert_transaction(&mut self, input: &NewTransaction)
        -> Result<Transaction, AppError>;

    /// Delete an invoice with its items and transactions.
    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<bool, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
