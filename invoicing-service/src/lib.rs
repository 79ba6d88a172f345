//! invoicing-service library.
//!
//! Financial computation and document-state engine for Malta-VAT invoicing:
//! totals calculation with proportional multi-rate VAT discount allocation,
//! credit-note balance validation, document status resolution and atomic
//! sequence number generation.

pub mod config;
pub mod domain;
pub mod models;
pub mod routes;
pub mod services;
pub mod startup;
