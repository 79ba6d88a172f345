//! Payment handlers.

use crate::models::{CreatePayment, Payment};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    /// Defaults to the current UTC calendar day.
    pub payment_date: Option<NaiveDate>,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<Payment>,
    pub total_paid: Decimal,
}

pub async fn record_payment(
    State(state): State<AppState>,
    Path((business_id, invoice_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let input = CreatePayment {
        business_id,
        invoice_id,
        amount: payload.amount,
        payment_date: payload
            .payment_date
            .unwrap_or_else(|| Utc::now().date_naive()),
        method: payload.method,
        reference: payload.reference,
        notes: payload.notes,
    };
    let payment = state.db.record_payment(&input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Path((business_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PaymentListResponse>, AppError> {
    let payments = state.db.list_payments(business_id, invoice_id).await?;
    let total_paid = payments.iter().map(|p| p.amount).sum();
    Ok(Json(PaymentListResponse {
        payments,
        total_paid,
    }))
}
