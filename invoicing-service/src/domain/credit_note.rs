//! Credit note balance validation.
//!
//! A pure predicate over aggregates the caller has already fetched: the
//! invoice total, the gross value of the other issued credit notes and the
//! payments recorded so far. Business-rule violations are returned as
//! values, never as errors; only genuine data-fetch failures surface as
//! `AppError` in the calling layer.
//!
//! The aggregates are read without transactional isolation, so two credit
//! notes validated concurrently can both pass against slightly stale sums.
//! That is an accepted risk; this module does not attempt to detect it.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Sum of `amount x (1 + vat_rate)` over existing credit notes.
pub fn existing_credits_gross(notes: &[(Decimal, Decimal)]) -> Decimal {
    notes
        .iter()
        .fold(Decimal::ZERO, |acc, (amount, vat_rate)| {
            acc + *amount * (Decimal::ONE + *vat_rate)
        })
}

/// Invoice-side aggregates a linked credit note is validated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvoiceBalance {
    pub invoice_total: Decimal,
    pub other_credits_gross: Decimal,
    pub payments_total: Decimal,
}

impl InvoiceBalance {
    /// Remaining creditable balance, floored at zero.
    pub fn remaining(&self) -> Decimal {
        (self.invoice_total - self.other_credits_gross - self.payments_total).max(Decimal::ZERO)
    }
}

/// Input to the validator.
///
/// `balance: None` marks a standalone customer credit: there is no invoice
/// balance to check, only the positivity and description rules apply.
#[derive(Debug, Clone)]
pub struct CreditNoteCheck {
    pub proposed_gross: Decimal,
    pub balance: Option<InvoiceBalance>,
    /// True when the note is being issued; drafts skip the reason rule.
    pub issuing: bool,
    pub has_reason: bool,
    pub has_description: bool,
}

/// A single failed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteViolation {
    ExceedsRemaining,
    ExceedsInvoiceTotal,
    TotalNotPositive,
    ReasonRequired,
    DescriptionRequired,
}

impl CreditNoteViolation {
    /// Form field the violation is reported against.
    pub fn field(&self) -> &'static str {
        match self {
            CreditNoteViolation::ExceedsRemaining
            | CreditNoteViolation::ExceedsInvoiceTotal
            | CreditNoteViolation::TotalNotPositive => "amount",
            CreditNoteViolation::ReasonRequired => "reason",
            CreditNoteViolation::DescriptionRequired => "description",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CreditNoteViolation::ExceedsRemaining => "exceeds_remaining",
            CreditNoteViolation::ExceedsInvoiceTotal => "exceeds_invoice_total",
            CreditNoteViolation::TotalNotPositive => "total_not_positive",
            CreditNoteViolation::ReasonRequired => "reason_required",
            CreditNoteViolation::DescriptionRequired => "description_required",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            CreditNoteViolation::ExceedsRemaining => {
                "Credit note total exceeds the remaining invoice balance"
            }
            CreditNoteViolation::ExceedsInvoiceTotal => {
                "Invoice is fully settled; no further credit can be issued against it"
            }
            CreditNoteViolation::TotalNotPositive => "Credit note total must be greater than zero",
            CreditNoteViolation::ReasonRequired => "A reason is required to issue a credit note",
            CreditNoteViolation::DescriptionRequired => {
                "A description is required for a standalone customer credit"
            }
        }
    }
}

/// Validation outcome: empty means valid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreditNoteValidation {
    pub violations: Vec<CreditNoteViolation>,
}

impl CreditNoteValidation {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn contains(&self, violation: CreditNoteViolation) -> bool {
        self.violations.contains(&violation)
    }

    /// Field -> message map for inline form display.
    pub fn field_errors(&self) -> BTreeMap<&'static str, &'static str> {
        self.violations
            .iter()
            .map(|v| (v.field(), v.message()))
            .collect()
    }
}

/// Validate a proposed credit note against the supplied aggregates.
pub fn validate_credit_note(check: &CreditNoteCheck) -> CreditNoteValidation {
    let mut validation = CreditNoteValidation::default();

    if check.proposed_gross <= Decimal::ZERO {
        validation
            .violations
            .push(CreditNoteViolation::TotalNotPositive);
    }

    if let Some(balance) = &check.balance {
        let remaining = balance.remaining();
        if remaining > Decimal::ZERO {
            if check.proposed_gross > remaining {
                validation
                    .violations
                    .push(CreditNoteViolation::ExceedsRemaining);
            }
        } else if check.proposed_gross > Decimal::ZERO {
            // Fully settled invoice: a remaining balance of zero must not
            // silently permit further credits, under a reason code distinct
            // from the ordinary over-crediting one.
            validation
                .violations
                .push(CreditNoteViolation::ExceedsInvoiceTotal);
        }

        if check.issuing && !check.has_reason {
            validation
                .violations
                .push(CreditNoteViolation::ReasonRequired);
        }
    } else if !check.has_description {
        // Standalone customer credit: no invoice balance to validate
        // against, only positivity and description presence apply.
        validation
            .violations
            .push(CreditNoteViolation::DescriptionRequired);
    }

    validation
}
