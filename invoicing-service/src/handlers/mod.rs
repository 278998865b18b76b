//! HTTP handlers for invoicing-service.

pub mod extract;
pub mod health;
pub mod invoices;
pub mod transactions;
