//! Invoicing Service - invoices, line items, payment and an audit trail of transactions.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod validation;
