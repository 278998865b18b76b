//! Services module for invoicing-service.

pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod store;

pub use lifecycle::{InvoicePage, InvoiceService, TransactionPage};
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use postgres::PgStore;
pub use store::{InvoiceStore, UnitOfWork};
