//! Invoice lifecycle: create, update, pay, recompute, delete and reads.
//!
//! Every write runs in one [`UnitOfWork`]. An early return drops the unit
//! uncommitted, so a failed call never leaves partial records behind.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use service_core::middleware::auth::Principal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::InvoiceError;
use crate::models::{
    to_money, CreateInvoice, Invoice, InvoiceChanges, InvoiceDetail, InvoiceItem, InvoiceStatus,
    ListInvoicesFilter, ListTransactionsFilter, NewInvoice, NewTransaction, Transaction,
    TransactionType, UpdateInvoice,
};
use crate::services::metrics::{INVOICES_TOTAL, TRANSACTIONS_TOTAL, TRANSACTION_AMOUNT_TOTAL};
use crate::services::store::{page_limit, InvoiceStore, UnitOfWork};
use crate::validation::{validate_create, validate_update};

/// One page of hydrated invoices.
#[derive(Debug, Serialize)]
pub struct InvoicePage {
    pub invoices: Vec<InvoiceDetail>,
    pub next_page_token: Option<Uuid>,
}

/// One page of audit transactions.
#[derive(Debug, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub next_page_token: Option<Uuid>,
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn InvoiceStore> {
        &self.store
    }

    #[instrument(skip(self, principal, input), fields(actor = %principal.subject))]
    pub async fn create(
        &self,
        principal: &Principal,
        input: CreateInvoice,
    ) -> Result<InvoiceDetail, InvoiceError> {
        validate_create(&input)?;

        let new_invoice = NewInvoice::new(
            input.customer_name.trim().to_string(),
            Utc::now().date_naive(),
        );

        let mut uow = self.store.begin().await?;
        uow.insert_invoice(&new_invoice).await?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            items.push(uow.insert_item(new_invoice.id, item).await?);
        }

        let invoice = recompute_in(&mut *uow, new_invoice.id).await?;
        let sale = uow
            .insert_transaction(&NewTransaction::new(
                invoice.id,
                TransactionType::Sale,
                invoice.total_amount,
            ))
            .await?;
        uow.commit().await?;

        INVOICES_TOTAL.with_label_values(&["created"]).inc();
        record_transaction(&sale);
        info!(
            invoice_id = %invoice.id,
            reference_number = %invoice.reference_number,
            total_amount = %invoice.total_amount,
            item_count = items.len(),
            "Invoice created"
        );

        Ok(InvoiceDetail {
            invoice,
            items,
            transactions: vec![sale],
        })
    }

    #[instrument(skip(self, principal, input), fields(actor = %principal.subject, invoice_id = %invoice_id))]
    pub async fn update(
        &self,
        principal: &Principal,
        invoice_id: Uuid,
        input: UpdateInvoice,
    ) -> Result<InvoiceDetail, InvoiceError> {
        validate_update(&input)?;

        let mut uow = self.store.begin().await?;
        let mut invoice = uow
            .lock_invoice(invoice_id)
            .await?
            .ok_or(InvoiceError::NotFound("Invoice"))?;

        if let Some(status) = input.status {
            if status != invoice.status {
                warn!(current = ?invoice.status, requested = ?status, "Rejected direct status change");
                return Err(InvoiceError::StatusReadOnly);
            }
        }

        if let Some(name) = &input.customer_name {
            let changes = InvoiceChanges {
                customer_name: Some(name.trim().to_string()),
                ..Default::default()
            };
            invoice = uow.update_invoice(invoice_id, &changes).await?;
        }

        if let Some(items) = &input.items {
            let removed = uow.delete_items(invoice_id).await?;
            for item in items {
                uow.insert_item(invoice_id, item).await?;
            }
            invoice = recompute_in(&mut *uow, invoice_id).await?;
            info!(
                removed,
                added = items.len(),
                total_amount = %invoice.total_amount,
                "Invoice items replaced"
            );
        }

        uow.commit().await?;
        INVOICES_TOTAL.with_label_values(&["updated"]).inc();

        self.hydrate_one(invoice).await
    }

    /// Move a pending invoice to paid and record the payment.
    #[instrument(skip(self, principal), fields(actor = %principal.subject, invoice_id = %invoice_id))]
    pub async fn pay(
        &self,
        principal: &Principal,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, InvoiceError> {
        let mut uow = self.store.begin().await?;
        let invoice = uow
            .lock_invoice(invoice_id)
            .await?
            .ok_or(InvoiceError::NotFound("Invoice"))?;

        if !invoice.status.can_pay() {
            warn!("Invoice is already paid");
            return Err(InvoiceError::AlreadyPaid);
        }

        let changes = InvoiceChanges {
            status: Some(InvoiceStatus::Paid),
            ..Default::default()
        };
        let invoice = uow.update_invoice(invoice_id, &changes).await?;
        let payment = uow
            .insert_transaction(&NewTransaction::new(
                invoice_id,
                TransactionType::Payment,
                invoice.total_amount,
            ))
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => InvoiceError::AlreadyPaid,
                other => InvoiceError::from(other),
            })?;
        uow.commit().await?;

        INVOICES_TOTAL.with_label_values(&["paid"]).inc();
        record_transaction(&payment);
        info!(amount = %payment.amount, "Invoice paid");

        self.hydrate_one(invoice).await
    }

    /// Rewrite `total_amount` from the current items.
    #[instrument(skip(self, principal), fields(actor = %principal.subject, invoice_id = %invoice_id))]
    pub async fn recompute_total(
        &self,
        principal: &Principal,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, InvoiceError> {
        let mut uow = self.store.begin().await?;
        let before = uow
            .lock_invoice(invoice_id)
            .await?
            .ok_or(InvoiceError::NotFound("Invoice"))?;

        let invoice = recompute_in(&mut *uow, invoice_id).await?;
        uow.commit().await?;

        INVOICES_TOTAL.with_label_values(&["recomputed"]).inc();
        if before.total_amount != invoice.total_amount {
            warn!(
                previous = %before.total_amount,
                total_amount = %invoice.total_amount,
                "Repaired invoice total"
            );
        }

        self.hydrate_one(invoice).await
    }

    #[instrument(skip(self, principal), fields(actor = %principal.subject, invoice_id = %invoice_id))]
    pub async fn delete(&self, principal: &Principal, invoice_id: Uuid) -> Result<(), InvoiceError> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_invoice(invoice_id).await? {
            return Err(InvoiceError::NotFound("Invoice"));
        }
        uow.commit().await?;

        INVOICES_TOTAL.with_label_values(&["deleted"]).inc();
        info!("Invoice deleted");
        Ok(())
    }

    #[instrument(skip(self, principal), fields(actor = %principal.subject, invoice_id = %invoice_id))]
    pub async fn get(
        &self,
        principal: &Principal,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, InvoiceError> {
        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or(InvoiceError::NotFound("Invoice"))?;
        self.hydrate_one(invoice).await
    }

    #[instrument(skip(self, principal, filter), fields(actor = %principal.subject))]
    pub async fn list(
        &self,
        principal: &Principal,
        filter: ListInvoicesFilter,
    ) -> Result<InvoicePage, InvoiceError> {
        let invoices = self.store.list_invoices(&filter).await?;
        let next_page_token = next_token(&invoices, filter.page_size, |i| i.id);
        let invoices = self.hydrate(invoices).await?;
        Ok(InvoicePage {
            invoices,
            next_page_token,
        })
    }

    #[instrument(skip(self, principal), fields(actor = %principal.subject, transaction_id = %transaction_id))]
    pub async fn get_transaction(
        &self,
        principal: &Principal,
        transaction_id: Uuid,
    ) -> Result<Transaction, InvoiceError> {
        self.store
            .get_transaction(transaction_id)
            .await?
            .ok_or(InvoiceError::NotFound("Transaction"))
    }

    #[instrument(skip(self, principal, filter), fields(actor = %principal.subject))]
    pub async fn list_transactions(
        &self,
        principal: &Principal,
        filter: ListTransactionsFilter,
    ) -> Result<TransactionPage, InvoiceError> {
        let transactions = self.store.list_transactions(&filter).await?;
        let next_page_token = next_token(&transactions, filter.page_size, |t| t.id);
        Ok(TransactionPage {
            transactions,
            next_page_token,
        })
    }

    async fn hydrate_one(&self, invoice: Invoice) -> Result<InvoiceDetail, InvoiceError> {
        let mut hydrated = self.hydrate(vec![invoice]).await?;
        hydrated.pop().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Hydration lost the invoice")).into()
        })
    }

    async fn hydrate(&self, invoices: Vec<Invoice>) -> Result<Vec<InvoiceDetail>, InvoiceError> {
        let ids: Vec<Uuid> = invoices.iter().map(|i| i.id).collect();

        let mut items: HashMap<Uuid, Vec<InvoiceItem>> = HashMap::new();
        for item in self.store.list_items(&ids).await? {
            items.entry(item.invoice_id).or_default().push(item);
        }
        let mut transactions: HashMap<Uuid, Vec<Transaction>> = HashMap::new();
        for transaction in self.store.list_invoice_transactions(&ids).await? {
            transactions
                .entry(transaction.invoice_id)
                .or_default()
                .push(transaction);
        }

        Ok(invoices
            .into_iter()
            .map(|invoice| InvoiceDetail {
                items: items.remove(&invoice.id).unwrap_or_default(),
                transactions: transactions.remove(&invoice.id).unwrap_or_default(),
                invoice,
            })
            .collect())
    }
}

async fn recompute_in(uow: &mut dyn UnitOfWork, invoice_id: Uuid) -> Result<Invoice, AppError> {
    let sum = uow.sum_items(invoice_id).await?;
    uow.set_total(invoice_id, to_money(sum)).await
}

/// A full page means there may be more rows after its last id.
fn next_token<T>(rows: &[T], page_size: i32, id: impl Fn(&T) -> Uuid) -> Option<Uuid> {
    if rows.len() as i64 == page_limit(page_size) {
        rows.last().map(id)
    } else {
        None
    }
}

fn record_transaction(transaction: &Transaction) {
    let kind = transaction.transaction_type.as_str();
    TRANSACTIONS_TOTAL.with_label_values(&[kind]).inc();
    TRANSACTION_AMOUNT_TOTAL
        .with_label_values(&[kind])
        .inc_by(transaction.amount.to_f64().unwrap_or(0.0).max(0.0));
}
