//! Tests for document status resolution: the three computed axes and the
//! display priority collapsing them into one label.

use chrono::NaiveDate;
use invoicing_service::domain::{
    resolve_document_status, DisplayStatus, DocumentStatus, DueStatus, PaymentStatus,
};
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

const TODAY: fn() -> NaiveDate = || date(2026, 3, 15);

#[test]
fn draft_displays_as_draft_even_when_overdue() {
    let info = resolve_document_status(
        DocumentStatus::Draft,
        d("100.00"),
        Decimal::ZERO,
        Some(date(2026, 1, 1)),
        TODAY(),
    );

    assert_eq!(info.display, DisplayStatus::Draft);
    assert_eq!(info.due, DueStatus::Overdue);
}

#[test]
fn void_displays_as_void_regardless_of_payment() {
    let info = resolve_document_status(
        DocumentStatus::Void,
        d("100.00"),
        d("100.00"),
        Some(date(2026, 1, 1)),
        TODAY(),
    );

    assert_eq!(info.display, DisplayStatus::Void);
}

#[test]
fn paid_takes_priority_over_overdue() {
    let info = resolve_document_status(
        DocumentStatus::Issued,
        d("100.00"),
        d("100.00"),
        Some(date(2026, 1, 1)),
        TODAY(),
    );

    assert_eq!(info.payment, PaymentStatus::Paid);
    // A settled invoice is never due, whatever the due date says.
    assert_eq!(info.due, DueStatus::NotDue);
    assert_eq!(info.display, DisplayStatus::Paid);
}

#[test]
fn overdue_takes_priority_over_partial() {
    let info = resolve_document_status(
        DocumentStatus::Issued,
        d("100.00"),
        d("50.00"),
        Some(date(2026, 3, 14)),
        TODAY(),
    );

    assert_eq!(info.payment, PaymentStatus::Partial);
    assert_eq!(info.due, DueStatus::Overdue);
    assert_eq!(info.display, DisplayStatus::Overdue);
}

#[test]
fn partial_payment_not_yet_due_displays_as_partial() {
    let info = resolve_document_status(
        DocumentStatus::Issued,
        d("100.00"),
        d("50.00"),
        Some(date(2026, 4, 1)),
        TODAY(),
    );

    assert_eq!(info.due, DueStatus::NotDue);
    assert_eq!(info.display, DisplayStatus::Partial);
}

#[test]
fn due_date_equal_to_today_is_due_not_overdue() {
    let info = resolve_document_status(
        DocumentStatus::Issued,
        d("100.00"),
        Decimal::ZERO,
        Some(TODAY()),
        TODAY(),
    );

    assert_eq!(info.due, DueStatus::Due);
    assert_eq!(info.display, DisplayStatus::Issued);
}

#[test]
fn due_date_one_day_past_is_overdue() {
    let info = resolve_document_status(
        DocumentStatus::Issued,
        d("100.00"),
        Decimal::ZERO,
        Some(date(2026, 3, 14)),
        TODAY(),
    );

    assert_eq!(info.due, DueStatus::Overdue);
    assert_eq!(info.display, DisplayStatus::Overdue);
}

#[test]
fn missing_due_date_is_never_due() {
    let info = resolve_document_status(
        DocumentStatus::Issued,
        d("100.00"),
        Decimal::ZERO,
        None,
        TODAY(),
    );

    assert_eq!(info.due, DueStatus::NotDue);
    assert_eq!(info.display, DisplayStatus::Issued);
}

#[test]
fn unpaid_issued_invoice_displays_as_issued() {
    let info = resolve_document_status(
        DocumentStatus::Issued,
        d("100.00"),
        Decimal::ZERO,
        Some(date(2026, 4, 1)),
        TODAY(),
    );

    assert_eq!(info.payment, PaymentStatus::Unpaid);
    assert_eq!(info.display, DisplayStatus::Issued);
}

#[test]
fn overpayment_counts_as_paid() {
    let info = resolve_document_status(
        DocumentStatus::Issued,
        d("100.00"),
        d("120.00"),
        None,
        TODAY(),
    );

    assert_eq!(info.payment, PaymentStatus::Paid);
    assert_eq!(info.display, DisplayStatus::Paid);
}
