//! Document model: invoices and quotations.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of commercial document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Quotation,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Quotation => "quotation",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "quotation" => DocumentKind::Quotation,
            _ => DocumentKind::Invoice,
        }
    }
}

/// Invoice or quotation row.
///
/// The monetary columns are a snapshot: they are recomputed from line items
/// while the document is a draft and frozen at issue time. Issued documents
/// are only ever touched again by payments and voiding.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub document_id: Uuid,
    pub business_id: Uuid,
    pub document_number: Option<String>,
    pub document_kind: String,
    pub status: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_vat_number: Option<String>,
    pub customer_address: Option<String>,
    pub currency: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub taxable: Decimal,
    pub vat_total: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub issued_utc: Option<DateTime<Utc>>,
    pub voided_utc: Option<DateTime<Utc>>,
}

/// Filter parameters for listing documents.
#[derive(Debug, Clone, Default)]
pub struct ListDocumentsFilter {
    pub kind: Option<DocumentKind>,
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a draft document.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub business_id: Uuid,
    pub document_kind: DocumentKind,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_vat_number: Option<String>,
    pub customer_address: Option<String>,
    pub currency: String,
    pub due_date: Option<NaiveDate>,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub notes: Option<String>,
}

/// Input for updating a draft document.
#[derive(Debug, Clone, Default)]
pub struct UpdateDocument {
    pub customer_name: Option<String>,
    pub customer_vat_number: Option<String>,
    pub customer_address: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub discount_type: Option<String>,
    pub discount_value: Option<Decimal>,
    pub notes: Option<String>,
}
