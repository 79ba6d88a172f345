//! Sequence number generation.
//!
//! Two concurrent "create document" actions for the same business must
//! never receive the same number, so the increment-and-read is a single
//! atomic operation behind the `CounterStore` trait. The issue paths in
//! `Database` inline the same increment as an upsert guarded by the
//! `(business_id, prefix, year)` primary key, inside the issuing
//! transaction; the in-memory implementation backs tests.
//!
//! If the store fails, number generation fails, and document creation must
//! abort: a document is never persisted without a number.

use crate::domain::format_sequence_number;
use crate::services::metrics::SEQUENCE_FAILURES_TOTAL;
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Atomic counter storage, scoped per (business, prefix, year).
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Advance the counter and return the new value. Must be atomic:
    /// concurrent callers receive strictly distinct, gap-free values.
    async fn next_value(&self, business_id: Uuid, prefix: &str, year: i32)
        -> Result<i64, AppError>;
}

/// Sequence number generator over any counter store.
pub struct SequenceGenerator<S> {
    store: S,
    pad_width: usize,
}

impl<S: CounterStore> SequenceGenerator<S> {
    pub fn new(store: S, pad_width: usize) -> Self {
        Self { store, pad_width }
    }

    /// Obtain the next formatted document number, e.g. `INV-000045`.
    pub async fn next_number(
        &self,
        business_id: Uuid,
        prefix: &str,
        year: i32,
    ) -> Result<String, AppError> {
        let seq = self
            .store
            .next_value(business_id, prefix, year)
            .await
            .map_err(|e| {
                SEQUENCE_FAILURES_TOTAL.with_label_values(&[prefix]).inc();
                e
            })?;
        Ok(format_sequence_number(prefix, seq, self.pad_width))
    }
}

/// Mutex-guarded in-memory counter store. Used by tests; mirrors the
/// atomicity contract of the Postgres upsert.
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<(Uuid, String, i32), i64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn next_value(
        &self,
        business_id: Uuid,
        prefix: &str,
        year: i32,
    ) -> Result<i64, AppError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Counter store poisoned")))?;
        let seq = counters
            .entry((business_id, prefix.to_string(), year))
            .or_insert(0);
        *seq += 1;
        Ok(*seq)
    }
}
