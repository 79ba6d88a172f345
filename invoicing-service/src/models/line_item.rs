//! Line item model for documents.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on a document. `vat_rate` is a fraction in [0, 1], e.g. 0.18
/// for the Malta standard rate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentItem {
    pub item_id: Uuid,
    pub document_id: Uuid,
    pub business_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    pub line_net: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for adding a line item.
#[derive(Debug, Clone)]
pub struct CreateDocumentItem {
    pub business_id: Uuid,
    pub document_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    pub sort_order: i32,
}

/// Input for updating a line item.
#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentItem {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub vat_rate: Option<Decimal>,
    pub sort_order: Option<i32>,
}
