//! Tests for credit note balance validation: remaining-balance boundaries,
//! the fully-settled rule and the draft/issue field requirements.

use invoicing_service::domain::{
    existing_credits_gross, validate_credit_note, CreditNoteCheck, CreditNoteViolation,
    InvoiceBalance,
};
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn balance(invoice_total: &str, other_credits: &str, payments: &str) -> InvoiceBalance {
    InvoiceBalance {
        invoice_total: d(invoice_total),
        other_credits_gross: d(other_credits),
        payments_total: d(payments),
    }
}

fn linked_check(proposed_gross: &str, balance: InvoiceBalance) -> CreditNoteCheck {
    CreditNoteCheck {
        proposed_gross: d(proposed_gross),
        balance: Some(balance),
        issuing: true,
        has_reason: true,
        has_description: false,
    }
}

#[test]
fn credit_up_to_exact_remaining_balance_is_valid() {
    let check = linked_check("1000.00", balance("1000.00", "0", "0"));
    let validation = validate_credit_note(&check);

    assert!(validation.is_valid());
}

#[test]
fn credit_one_cent_over_remaining_balance_is_rejected() {
    let check = linked_check("1000.01", balance("1000.00", "0", "0"));
    let validation = validate_credit_note(&check);

    assert!(validation.contains(CreditNoteViolation::ExceedsRemaining));
}

#[test]
fn remaining_balance_accounts_for_credits_and_payments() {
    let consumed = balance("1000.00", "400.00", "300.00");
    assert_eq!(consumed.remaining(), d("300.00"));

    let at_limit = validate_credit_note(&linked_check("300.00", consumed));
    assert!(at_limit.is_valid());

    let over_limit = validate_credit_note(&linked_check("300.01", consumed));
    assert!(over_limit.contains(CreditNoteViolation::ExceedsRemaining));
}

#[test]
fn remaining_balance_is_floored_at_zero() {
    let over_consumed = balance("500.00", "400.00", "200.00");
    assert_eq!(over_consumed.remaining(), Decimal::ZERO);
}

#[test]
fn fully_settled_invoice_rejects_any_further_credit() {
    // Remaining collapsing to zero must not silently permit more credits,
    // and the reason code differs from ordinary over-crediting.
    let settled = balance("500.00", "0", "500.00");

    let validation = validate_credit_note(&linked_check("0.01", settled));
    assert!(validation.contains(CreditNoteViolation::ExceedsInvoiceTotal));
    assert!(!validation.contains(CreditNoteViolation::ExceedsRemaining));
}

#[test]
fn zero_and_negative_totals_are_rejected() {
    let zero = validate_credit_note(&linked_check("0", balance("100.00", "0", "0")));
    assert!(zero.contains(CreditNoteViolation::TotalNotPositive));

    let negative = validate_credit_note(&linked_check("-10.00", balance("100.00", "0", "0")));
    assert!(negative.contains(CreditNoteViolation::TotalNotPositive));
}

#[test]
fn issuing_linked_credit_requires_a_reason() {
    let check = CreditNoteCheck {
        proposed_gross: d("50.00"),
        balance: Some(balance("100.00", "0", "0")),
        issuing: true,
        has_reason: false,
        has_description: false,
    };
    let validation = validate_credit_note(&check);

    assert!(validation.contains(CreditNoteViolation::ReasonRequired));
}

#[test]
fn draft_linked_credit_does_not_require_a_reason() {
    let check = CreditNoteCheck {
        proposed_gross: d("50.00"),
        balance: Some(balance("100.00", "0", "0")),
        issuing: false,
        has_reason: false,
        has_description: false,
    };
    let validation = validate_credit_note(&check);

    assert!(validation.is_valid());
}

#[test]
fn standalone_credit_requires_a_description() {
    let check = CreditNoteCheck {
        proposed_gross: d("25.00"),
        balance: None,
        issuing: true,
        has_reason: false,
        has_description: false,
    };
    let validation = validate_credit_note(&check);

    assert!(validation.contains(CreditNoteViolation::DescriptionRequired));
    // Standalone credits are not checked against any balance and do not
    // need a reason.
    assert!(!validation.contains(CreditNoteViolation::ReasonRequired));
    assert!(!validation.contains(CreditNoteViolation::ExceedsRemaining));
}

#[test]
fn standalone_credit_with_description_is_valid() {
    let check = CreditNoteCheck {
        proposed_gross: d("25.00"),
        balance: None,
        issuing: true,
        has_reason: false,
        has_description: true,
    };
    let validation = validate_credit_note(&check);

    assert!(validation.is_valid());
}

#[test]
fn field_errors_map_violations_to_form_fields() {
    let check = CreditNoteCheck {
        proposed_gross: d("0"),
        balance: Some(balance("100.00", "0", "0")),
        issuing: true,
        has_reason: false,
        has_description: false,
    };
    let validation = validate_credit_note(&check);
    let errors = validation.field_errors();

    assert!(errors.contains_key("amount"));
    assert!(errors.contains_key("reason"));
    assert!(!errors.contains_key("description"));
}

#[test]
fn existing_credits_gross_includes_vat() {
    let notes = [(d("100.00"), d("0.18")), (d("50.00"), d("0.00"))];
    assert_eq!(existing_credits_gross(&notes), d("168.00"));
}

#[test]
fn existing_credits_gross_of_no_notes_is_zero() {
    assert_eq!(existing_credits_gross(&[]), Decimal::ZERO);
}
