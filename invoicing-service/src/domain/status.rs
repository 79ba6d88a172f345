//! Document status resolution.
//!
//! Three independent axes collapse into one display label: the stored
//! document status (draft/issued/void), the payment status computed from
//! amounts and the due status computed from dates. Date comparisons use
//! calendar-day granularity; `today` is passed in explicitly so the
//! resolver stays a pure function of its inputs.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stored document lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Issued,
    Void,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Issued => "issued",
            DocumentStatus::Void => "void",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "issued" => DocumentStatus::Issued,
            "void" => DocumentStatus::Void,
            _ => DocumentStatus::Draft,
        }
    }
}

/// Payment status computed from amounts; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

/// Due status computed from dates; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    NotDue,
    Due,
    Overdue,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueStatus::NotDue => "not_due",
            DueStatus::Due => "due",
            DueStatus::Overdue => "overdue",
        }
    }
}

/// Display label shown to the user, first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Draft,
    Void,
    Paid,
    Overdue,
    Partial,
    Issued,
}

impl DisplayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStatus::Draft => "draft",
            DisplayStatus::Void => "void",
            DisplayStatus::Paid => "paid",
            DisplayStatus::Overdue => "overdue",
            DisplayStatus::Partial => "partial",
            DisplayStatus::Issued => "issued",
        }
    }
}

/// Resolved status across all three axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub document: DocumentStatus,
    pub payment: PaymentStatus,
    pub due: DueStatus,
    pub display: DisplayStatus,
}

/// Resolve the status of a document as of `today`.
pub fn resolve_document_status(
    document: DocumentStatus,
    total_amount: Decimal,
    paid_amount: Decimal,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> StatusInfo {
    let payment = if paid_amount <= Decimal::ZERO {
        PaymentStatus::Unpaid
    } else if paid_amount >= total_amount {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    };

    // A fully paid invoice is never due or overdue, whatever the date says.
    let due = if payment == PaymentStatus::Paid {
        DueStatus::NotDue
    } else {
        match due_date {
            Some(date) if date < today => DueStatus::Overdue,
            Some(date) if date == today => DueStatus::Due,
            _ => DueStatus::NotDue,
        }
    };

    let display = match document {
        DocumentStatus::Draft => DisplayStatus::Draft,
        DocumentStatus::Void => DisplayStatus::Void,
        DocumentStatus::Issued => {
            if payment == PaymentStatus::Paid {
                DisplayStatus::Paid
            } else if due == DueStatus::Overdue {
                DisplayStatus::Overdue
            } else if payment == PaymentStatus::Partial {
                DisplayStatus::Partial
            } else {
                DisplayStatus::Issued
            }
        }
    };

    StatusInfo {
        document,
        payment,
        due,
        display,
    }
}

/// Resolve against the current UTC calendar day.
pub fn resolve_document_status_now(
    document: DocumentStatus,
    total_amount: Decimal,
    paid_amount: Decimal,
    due_date: Option<NaiveDate>,
) -> StatusInfo {
    resolve_document_status(
        document,
        total_amount,
        paid_amount,
        due_date,
        Utc::now().date_naive(),
    )
}
