//! Tests for sequence number generation: formatting and the atomicity
//! contract of the counter store under concurrent callers.

use invoicing_service::domain::format_sequence_number;
use invoicing_service::services::{CounterStore, InMemoryCounterStore, SequenceGenerator};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[test]
fn formats_with_zero_padding() {
    assert_eq!(format_sequence_number("INV", 45, 6), "INV-000045");
    assert_eq!(format_sequence_number("CN", 1, 6), "CN-000001");
    assert_eq!(format_sequence_number("QT", 999999, 6), "QT-999999");
}

#[test]
fn values_wider_than_pad_width_render_unpadded() {
    assert_eq!(format_sequence_number("INV", 12345678, 6), "INV-12345678");
}

#[test]
fn pad_width_is_configurable() {
    assert_eq!(format_sequence_number("INV", 7, 4), "INV-0007");
}

#[tokio::test]
async fn counter_starts_at_one_and_increments() {
    let store = InMemoryCounterStore::new();
    let business_id = Uuid::new_v4();

    assert_eq!(store.next_value(business_id, "INV", 2026).await.unwrap(), 1);
    assert_eq!(store.next_value(business_id, "INV", 2026).await.unwrap(), 2);
    assert_eq!(store.next_value(business_id, "INV", 2026).await.unwrap(), 3);
}

#[tokio::test]
async fn counters_are_scoped_per_business_prefix_and_year() {
    let store = InMemoryCounterStore::new();
    let first_business = Uuid::new_v4();
    let second_business = Uuid::new_v4();

    store.next_value(first_business, "INV", 2026).await.unwrap();
    store.next_value(first_business, "INV", 2026).await.unwrap();

    // Another business, another prefix and another year all start fresh.
    assert_eq!(
        store.next_value(second_business, "INV", 2026).await.unwrap(),
        1
    );
    assert_eq!(store.next_value(first_business, "CN", 2026).await.unwrap(), 1);
    assert_eq!(store.next_value(first_business, "INV", 2027).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_generation_yields_distinct_gap_free_numbers() {
    const TASKS: usize = 100;

    let generator = Arc::new(SequenceGenerator::new(InMemoryCounterStore::new(), 6));
    let business_id = Uuid::new_v4();

    let mut handles = Vec::with_capacity(TASKS);
    for _ in 0..TASKS {
        let generator = generator.clone();
        handles.push(tokio::spawn(async move {
            generator.next_number(business_id, "INV", 2026).await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let number = handle.await.unwrap().unwrap();
        assert!(numbers.insert(number), "duplicate number issued");
    }

    // No duplicates and no gaps: exactly INV-000001..INV-000100.
    for seq in 1..=TASKS as i64 {
        let expected = format_sequence_number("INV", seq, 6);
        assert!(numbers.contains(&expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn generator_formats_with_configured_width() {
    let generator = SequenceGenerator::new(InMemoryCounterStore::new(), 4);
    let business_id = Uuid::new_v4();

    let number = generator.next_number(business_id, "QT", 2026).await.unwrap();
    assert_eq!(number, "QT-0001");
}
