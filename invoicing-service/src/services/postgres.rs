//! PostgreSQL store for invoicing-service.

use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction as PgTransaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    CreateInvoiceItem, Invoice, InvoiceChanges, InvoiceItem, ListInvoicesFilter,
    ListTransactionsFilter, NewInvoice, NewTransaction, Transaction,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{page_limit, InvoiceStore, UnitOfWork};

/// Unique index guarding against a second payment for one invoice.
const ONE_PAYMENT_INDEX: &str = "transactions_one_payment_per_invoice";

/// Connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for PgStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, reference_number, customer_name, date, status, total_amount
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self, filter))]
    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, reference_number, customer_name, date, status, total_amount
            FROM invoices
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.page_token)
        .bind(page_limit(filter.page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self, invoice_ids), fields(count = invoice_ids.len()))]
    async fn list_items(&self, invoice_ids: &[Uuid]) -> Result<Vec<InvoiceItem>, AppError> {
        if invoice_ids.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, description, quantity, unit_price
            FROM invoice_items
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, id
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_transaction"])
            .start_timer();

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, invoice_id, transaction_type, amount, date
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(transaction)
    }

    #[instrument(skip(self, invoice_ids), fields(count = invoice_ids.len()))]
    async fn list_invoice_transactions(
        &self,
        invoice_ids: &[Uuid],
    ) -> Result<Vec<Transaction>, AppError> {
        if invoice_ids.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoice_transactions"])
            .start_timer();

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, invoice_id, transaction_type, amount, date
            FROM transactions
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, id
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list transactions: {}", e))
        })?;

        timer.observe_duration();

        Ok(transactions)
    }

    #[instrument(skip(self, filter))]
    async fn list_transactions(
        &self,
        filter: &ListTransactionsFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transactions"])
            .start_timer();

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, invoice_id, transaction_type, amount, date
            FROM transactions
            WHERE ($1::uuid[] IS NULL OR invoice_id = ANY($1))
              AND ($2::text IS NULL OR transaction_type = $2)
              AND ($3::uuid IS NULL OR id > $3)
            ORDER BY id
            LIMIT $4
            "#,
        )
        .bind(filter.invoice_ids.as_deref())
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.page_token)
        .bind(page_limit(filter.page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list transactions: {}", e))
        })?;

        timer.observe_duration();

        Ok(transactions)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}

/// One open database transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgUnitOfWork {
    tx: PgTransaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip(self, input), fields(invoice_id = %input.id))]
    async fn insert_invoice(&mut self, input: &NewInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (id, reference_number, customer_name, date, status, total_amount)
            VALUES ($1, $2, $3, $4, 'pending', 0)
            RETURNING id, reference_number, customer_name, date, status, total_amount
            "#,
        )
        .bind(input.id)
        .bind(&input.reference_number)
        .bind(&input.customer_name)
        .bind(input.date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e))
        })?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn lock_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["lock_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, reference_number, customer_name, date, status, total_amount
            FROM invoices
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self, changes), fields(invoice_id = %invoice_id))]
    async fn update_invoice(
        &mut self,
        invoice_id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET
                customer_name = COALESCE($2, customer_name),
                status = COALESCE($3, status)
            WHERE id = $1
            RETURNING id, reference_number, customer_name, date, status, total_amount
            "#,
        )
        .bind(invoice_id)
        .bind(changes.customer_name.as_deref())
        .bind(changes.status.map(|s| s.as_str()))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    async fn insert_item(
        &mut self,
        invoice_id: Uuid,
        input: &CreateInvoiceItem,
    ) -> Result<InvoiceItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_item"])
            .start_timer();

        let item = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, invoice_id, description, quantity, unit_price
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(invoice_id)
        .bind(&input.description)
        .bind(input.quantity)
        .bind(input.unit_price)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to add item: {}", e)))?;

        timer.observe_duration();

        Ok(item)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn delete_items(&mut self, invoice_id: Uuid) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_items"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete items: {}", e))
            })?;

        timer.observe_duration();

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn sum_items(&mut self, invoice_id: Uuid) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_items"])
            .start_timer();

        let total = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity * unit_price), 0)
            FROM invoice_items
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum items: {}", e)))?;

        timer.observe_duration();

        Ok(total)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id, total = %total))]
    async fn set_total(&mut self, invoice_id: Uuid, total: Decimal) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_total"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET total_amount = $2
            WHERE id = $1
            RETURNING id, reference_number, customer_name, date, status, total_amount
            "#,
        )
        .bind(invoice_id)
        .bind(total)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to set total: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(
        skip(self, input),
        fields(invoice_id = %input.invoice_id, transaction_type = input.transaction_type.as_str())
    )]
    async fn insert_transaction(
        &mut self,
        input: &NewTransaction,
    ) -> Result<Transaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_transaction"])
            .start_timer();

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, invoice_id, transaction_type, amount, date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, invoice_id, transaction_type, amount, date
            "#,
        )
        .bind(input.id)
        .bind(input.invoice_id)
        .bind(input.transaction_type.as_str())
        .bind(input.amount)
        .bind(input.date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint() == Some(ONE_PAYMENT_INDEX) => {
                AppError::Conflict(anyhow::anyhow!("Invoice already has a payment"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!(
                "Failed to record transaction: {}",
                e
            )),
        })?;

        timer.observe_duration();

        Ok(transaction)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        // Items and transactions go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })
    }
}
