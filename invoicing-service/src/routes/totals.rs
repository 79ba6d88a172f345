//! Stateless totals preview.
//!
//! Runs the same pure calculator a draft refresh and an issue snapshot run,
//! so a client-side preview can never drift from what gets persisted.

use crate::domain::{calculate_totals, DiscountInput, InvoiceTotals, LineInput};
use axum::Json;
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct TotalsPreviewRequest {
    pub items: Vec<LineInput>,
    #[serde(default)]
    pub discount: DiscountInput,
}

pub async fn preview_totals(
    Json(payload): Json<TotalsPreviewRequest>,
) -> Result<Json<InvoiceTotals>, AppError> {
    Ok(Json(calculate_totals(&payload.items, &payload.discount)))
}
