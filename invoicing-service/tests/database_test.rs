//! Postgres-backed tests for the document lifecycle guards: payment
//! atomicity, issued-document immutability and number uniqueness.
//!
//! These need a running database; set `INVOICING_DATABASE_URL` and run
//! with `cargo test -- --ignored`.

use chrono::NaiveDate;
use invoicing_service::config::NumberingConfig;
use invoicing_service::models::{CreateDocument, CreateDocumentItem, CreatePayment, DocumentKind};
use invoicing_service::services::Database;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::str::FromStr;
use uuid::Uuid;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn issue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

async fn test_db() -> Database {
    let url = std::env::var("INVOICING_DATABASE_URL")
        .expect("INVOICING_DATABASE_URL must be set for database tests");
    let db = Database::new(&url, 5, 1)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations()
        .await
        .expect("Failed to run migrations");
    db
}

/// Create and issue a one-line invoice for the given business.
async fn issued_invoice(db: &Database, business_id: Uuid, unit_price: &str) -> Uuid {
    let draft = db
        .create_document(&CreateDocument {
            business_id,
            document_kind: DocumentKind::Invoice,
            customer_id: Uuid::new_v4(),
            customer_name: "Test Customer".to_string(),
            customer_vat_number: None,
            customer_address: None,
            currency: "EUR".to_string(),
            due_date: None,
            discount_type: "none".to_string(),
            discount_value: Decimal::ZERO,
            notes: None,
        })
        .await
        .expect("Failed to create draft");

    db.add_item(&CreateDocumentItem {
        business_id,
        document_id: draft.document_id,
        description: "Consulting".to_string(),
        quantity: d("1"),
        unit_price: d(unit_price),
        vat_rate: Decimal::ZERO,
        sort_order: 0,
    })
    .await
    .expect("Failed to add line item");

    db.issue_document(
        business_id,
        draft.document_id,
        issue_date(),
        &NumberingConfig::default(),
    )
    .await
    .expect("Failed to issue document")
    .expect("Document disappeared during issue");

    draft.document_id
}

fn payment(business_id: Uuid, invoice_id: Uuid, amount: &str) -> CreatePayment {
    CreatePayment {
        business_id,
        invoice_id,
        amount: d(amount),
        payment_date: issue_date(),
        method: "bank_transfer".to_string(),
        reference: None,
        notes: None,
    }
}

#[tokio::test]
#[ignore]
async fn overpayment_leaves_no_orphan_payment_row() {
    let db = test_db().await;
    let business_id = Uuid::new_v4();
    let invoice_id = issued_invoice(&db, business_id, "100.00").await;

    let result = db.record_payment(&payment(business_id, invoice_id, "150.00")).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    // The rejection must not leave a payment behind or touch amount_paid.
    let payments = db.list_payments(business_id, invoice_id).await.unwrap();
    assert!(payments.is_empty());
    let invoice = db
        .get_document(business_id, invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.amount_paid, Decimal::ZERO);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn concurrent_payments_cannot_exceed_the_invoice_total() {
    let db = test_db().await;
    let business_id = Uuid::new_v4();
    let invoice_id = issued_invoice(&db, business_id, "100.00").await;

    // Two 60.00 payments against a 100.00 invoice; at most one may land.
    let db_a = db.clone();
    let db_b = db.clone();
    let pay_a = tokio::spawn(async move {
        db_a.record_payment(&payment(business_id, invoice_id, "60.00"))
            .await
    });
    let pay_b = tokio::spawn(async move {
        db_b.record_payment(&payment(business_id, invoice_id, "60.00"))
            .await
    });
    let results = [pay_a.await.unwrap(), pay_b.await.unwrap()];

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "exactly one of the competing payments may land");

    let invoice = db
        .get_document(business_id, invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.amount_paid, d("60.00"));
    let payments = db.list_payments(business_id, invoice_id).await.unwrap();
    assert_eq!(payments.len(), 1);
}

#[tokio::test]
#[ignore]
async fn line_items_are_frozen_once_a_document_is_issued() {
    let db = test_db().await;
    let business_id = Uuid::new_v4();
    let invoice_id = issued_invoice(&db, business_id, "100.00").await;

    let result = db
        .add_item(&CreateDocumentItem {
            business_id,
            document_id: invoice_id,
            description: "Late addition".to_string(),
            quantity: d("1"),
            unit_price: d("10.00"),
            vat_rate: Decimal::ZERO,
            sort_order: 1,
        })
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let items = db.get_items(business_id, invoice_id).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
#[ignore]
async fn duplicate_document_number_surfaces_as_conflict() {
    let db = test_db().await;
    let business_id = Uuid::new_v4();
    let numbering = NumberingConfig::default();
    issued_invoice(&db, business_id, "100.00").await;

    // Wind the counter back so the next issue produces the same number.
    sqlx::query(
        "UPDATE counters SET last_seq = last_seq - 1 \
         WHERE business_id = $1 AND prefix = $2",
    )
    .bind(business_id)
    .bind(&numbering.invoice_prefix)
    .execute(db.pool())
    .await
    .unwrap();

    let draft = db
        .create_document(&CreateDocument {
            business_id,
            document_kind: DocumentKind::Invoice,
            customer_id: Uuid::new_v4(),
            customer_name: "Second Customer".to_string(),
            customer_vat_number: None,
            customer_address: None,
            currency: "EUR".to_string(),
            due_date: None,
            discount_type: "none".to_string(),
            discount_value: Decimal::ZERO,
            notes: None,
        })
        .await
        .unwrap();
    db.add_item(&CreateDocumentItem {
        business_id,
        document_id: draft.document_id,
        description: "Consulting".to_string(),
        quantity: d("1"),
        unit_price: d("50.00"),
        vat_rate: Decimal::ZERO,
        sort_order: 0,
    })
    .await
    .unwrap();

    let result = db
        .issue_document(business_id, draft.document_id, issue_date(), &numbering)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // The losing draft keeps its state so the caller can retry.
    let doc = db
        .get_document(business_id, draft.document_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, "draft");
    assert!(doc.document_number.is_none());
}
