//! Services module for invoicing-service.

pub mod database;
pub mod metrics;
pub mod sequence;

pub use database::{CreditNoteIssue, Database};
pub use metrics::{get_metrics, init_metrics};
pub use sequence::{CounterStore, InMemoryCounterStore, SequenceGenerator};
