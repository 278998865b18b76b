//! In-process store for invoicing-service.
//!
//! Backs local runs and the test suite. One writer at a time: a unit of work
//! holds the state lock from `begin` until it is committed or dropped, and
//! edits a private copy that only replaces the shared state on commit.
//! Taking that copy clones every row, so each write costs time proportional
//! to the whole store. Fine for tests and local runs, not for real volumes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{
    compute_total, to_money, CreateInvoiceItem, Invoice, InvoiceChanges, InvoiceItem, InvoiceStatus,
    ListInvoicesFilter, ListTransactionsFilter, NewInvoice, NewTransaction, Transaction,
    TransactionType,
};
use crate::services::store::{page_limit, InvoiceStore, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    invoices: BTreeMap<Uuid, Invoice>,
    items: BTreeMap<Uuid, InvoiceItem>,
    transactions: BTreeMap<Uuid, Transaction>,
}

/// Thread-safe in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: Clone>(
    rows: &BTreeMap<Uuid, T>,
    page_token: Option<Uuid>,
    page_size: i32,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    let limit = page_limit(page_size) as usize;
    rows.iter()
        .filter(|(id, _)| page_token.map_or(true, |token| **id > token))
        .map(|(_, row)| row)
        .filter(|row| keep(row))
        .take(limit)
        .cloned()
        .collect()
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.state.lock().await.invoices.get(&invoice_id).cloned())
    }

    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let state = self.state.lock().await;
        Ok(page(
            &state.invoices,
            filter.page_token,
            filter.page_size,
            |invoice| filter.status.map_or(true, |s| invoice.status == s),
        ))
    }

    async fn list_items(&self, invoice_ids: &[Uuid]) -> Result<Vec<InvoiceItem>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .values()
            .filter(|item| invoice_ids.contains(&item.invoice_id))
            .cloned()
            .collect())
    }

    async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .transactions
            .get(&transaction_id)
            .cloned())
    }

    async fn list_invoice_transactions(
        &self,
        invoice_ids: &[Uuid],
    ) -> Result<Vec<Transaction>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .values()
            .filter(|t| invoice_ids.contains(&t.invoice_id))
            .cloned()
            .collect())
    }

    async fn list_transactions(
        &self,
        filter: &ListTransactionsFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let state = self.state.lock().await;
        Ok(page(
            &state.transactions,
            filter.page_token,
            filter.page_size,
            |t| {
                filter
                    .invoice_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&t.invoice_id))
                    && filter
                        .transaction_type
                        .map_or(true, |kind| t.transaction_type == kind)
            },
        ))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn invoice_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Invoice not found"))
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_invoice(&mut self, input: &NewInvoice) -> Result<Invoice, AppError> {
        if self.working.invoices.contains_key(&input.id) {
            return Err(AppError::Conflict(anyhow::anyhow!("Invoice already exists")));
        }
        let invoice = Invoice {
            id: input.id,
            reference_number: input.reference_number.clone(),
            customer_name: input.customer_name.clone(),
            date: input.date,
            status: InvoiceStatus::Pending,
            total_amount: Decimal::ZERO,
        };
        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn lock_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.working.invoices.get(&invoice_id).cloned())
    }

    async fn update_invoice(
        &mut self,
        invoice_id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Invoice, AppError> {
        let invoice = self
            .working
            .invoices
            .get_mut(&invoice_id)
            .ok_or_else(invoice_not_found)?;
        if let Some(name) = &changes.customer_name {
            invoice.customer_name = name.clone();
        }
        if let Some(status) = changes.status {
            invoice.status = status;
        }
        Ok(invoice.clone())
    }

    async fn insert_item(
        &mut self,
        invoice_id: Uuid,
        input: &CreateInvoiceItem,
    ) -> Result<InvoiceItem, AppError> {
        if !self.working.invoices.contains_key(&invoice_id) {
            return Err(invoice_not_found());
        }
        let item = InvoiceItem {
            id: Uuid::now_v7(),
            invoice_id,
            description: input.description.clone(),
            quantity: input.quantity,
            unit_price: to_money(input.unit_price),
        };
        self.working.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn delete_items(&mut self, invoice_id: Uuid) -> Result<u64, AppError> {
        let before = self.working.items.len();
        self.working
            .items
            .retain(|_, item| item.invoice_id != invoice_id);
        Ok((before - self.working.items.len()) as u64)
    }

    async fn sum_items(&mut self, invoice_id: Uuid) -> Result<Decimal, AppError> {
        Ok(compute_total(
            self.working
                .items
                .values()
                .filter(|item| item.invoice_id == invoice_id),
        ))
    }

    async fn set_total(&mut self, invoice_id: Uuid, total: Decimal) -> Result<Invoice, AppError> {
        let invoice = self
            .working
            .invoices
            .get_mut(&invoice_id)
            .ok_or_else(invoice_not_found)?;
        invoice.total_amount = total;
        Ok(invoice.clone())
    }

    async fn insert_transaction(
        &mut self,
        input: &NewTransaction,
    ) -> Result<Transaction, AppError> {
        if !self.working.invoices.contains_key(&input.invoice_id) {
            return Err(invoice_not_found());
        }
        if input.transaction_type == TransactionType::Payment
            && self.working.transactions.values().any(|t| {
                t.invoice_id == input.invoice_id && t.transaction_type == TransactionType::Payment
            })
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice already has a payment"
            )));
        }
        let transaction = Transaction {
            id: input.id,
            invoice_id: input.invoice_id,
            transaction_type: input.transaction_type,
            amount: input.amount,
            date: input.date,
        };
        self.working
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<bool, AppError> {
        if self.working.invoices.remove(&invoice_id).is_none() {
            return Ok(false);
        }
        self.working
            .items
            .retain(|_, item| item.invoice_id != invoice_id);
        self.working
            .transactions
            .retain(|_, t| t.invoice_id != invoice_id);
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn new_invoice() -> NewInvoice {
        NewInvoice::new(
            "Acme".to_string(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        )
    }

    fn item(quantity: i32, unit_price: &str) -> CreateInvoiceItem {
        CreateInvoiceItem {
            description: "Widget".to_string(),
            quantity,
            unit_price: Decimal::from_str(unit_price).unwrap(),
        }
    }

    #[tokio::test]
    async fn committed_work_is_visible() {
        let store = MemoryStore::new();
        let input = new_invoice();

        let mut uow = store.begin().await.unwrap();
        uow.insert_invoice(&input).await.unwrap();
        uow.insert_item(input.id, &item(2, "10.00")).await.unwrap();
        uow.commit().await.unwrap();

        assert!(store.get_invoice(input.id).await.unwrap().is_some());
        assert_eq!(store.list_items(&[input.id]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_work_is_discarded() {
        let store = MemoryStore::new();
        let input = new_invoice();

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_invoice(&input).await.unwrap();
        }

        assert!(store.get_invoice(input.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sum_items_multiplies_quantity_by_price() {
        let store = MemoryStore::new();
        let input = new_invoice();

        let mut uow = store.begin().await.unwrap();
        uow.insert_invoice(&input).await.unwrap();
        uow.insert_item(input.id, &item(2, "10.00")).await.unwrap();
        uow.insert_item(input.id, &item(1, "20.00")).await.unwrap();

        let total = uow.sum_items(input.id).await.unwrap();
        assert_eq!(total, Decimal::from_str("40.00").unwrap());
    }

    #[tokio::test]
    async fn unit_price_is_stored_at_two_decimals() {
        let store = MemoryStore::new();
        let input = new_invoice();

        let mut uow = store.begin().await.unwrap();
        uow.insert_invoice(&input).await.unwrap();
        let stored = uow.insert_item(input.id, &item(1, "1.500")).await.unwrap();

        assert_eq!(stored.unit_price.to_string(), "1.50");
    }

    #[tokio::test]
    async fn delete_invoice_removes_items_and_transactions() {
        let store = MemoryStore::new();
        let input = new_invoice();

        let mut uow = store.begin().await.unwrap();
        uow.insert_invoice(&input).await.unwrap();
        uow.insert_item(input.id, &item(1, "5.00")).await.unwrap();
        uow.insert_transaction(&NewTransaction::new(
            input.id,
            TransactionType::Sale,
            Decimal::from_str("5.00").unwrap(),
        ))
        .await
        .unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert!(uow.delete_invoice(input.id).await.unwrap());
        uow.commit().await.unwrap();

        assert!(store.list_items(&[input.id]).await.unwrap().is_empty());
        let filter = ListTransactionsFilter {
            invoice_ids: Some(vec![input.id]),
            ..Default::default()
        };
        assert!(store.list_transactions(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_payment_is_a_conflict() {
        let store = MemoryStore::new();
        let input = new_invoice();
        let amount = Decimal::from_str("5.00").unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.insert_invoice(&input).await.unwrap();
        uow.insert_transaction(&NewTransaction::new(input.id, TransactionType::Payment, amount))
            .await
            .unwrap();
        let second = uow
            .insert_transaction(&NewTransaction::new(input.id, TransactionType::Payment, amount))
            .await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn listing_pages_after_token() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        for _ in 0..3 {
            uow.insert_invoice(&new_invoice()).await.unwrap();
        }
        uow.commit().await.unwrap();

        let first = store
            .list_invoices(&ListInvoicesFilter {
                page_size: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let rest = store
            .list_invoices(&ListInvoicesFilter {
                page_size: 2,
                page_token: Some(first[1].id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert!(rest[0].id > first[1].id);
    }
}
