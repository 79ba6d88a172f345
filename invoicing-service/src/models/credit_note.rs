//! Credit note model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Credit note status. Once issued, a credit note is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    Draft,
    Issued,
}

impl CreditNoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditNoteStatus::Draft => "draft",
            CreditNoteStatus::Issued => "issued",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "issued" => CreditNoteStatus::Issued,
            _ => CreditNoteStatus::Draft,
        }
    }
}

/// Credit note row. `invoice_id` is NULL for standalone customer credits,
/// which are not validated against any invoice balance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditNote {
    pub credit_note_id: Uuid,
    pub business_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub credit_note_number: Option<String>,
    pub status: String,
    pub amount: Decimal,
    pub vat_rate: Decimal,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub issued_utc: Option<DateTime<Utc>>,
}

impl CreditNote {
    /// Gross value of this note: net amount plus VAT.
    pub fn gross(&self) -> Decimal {
        self.amount * (Decimal::ONE + self.vat_rate)
    }
}

/// Filter parameters for listing credit notes.
#[derive(Debug, Clone, Default)]
pub struct ListCreditNotesFilter {
    pub invoice_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<CreditNoteStatus>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a draft credit note.
#[derive(Debug, Clone)]
pub struct CreateCreditNote {
    pub business_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub vat_rate: Decimal,
    pub reason: Option<String>,
    pub description: Option<String>,
}
