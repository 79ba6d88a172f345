//! Credit note handlers.
//!
//! Issue failures caused by business rules come back as HTTP 422 with a
//! field->message map, so a form can show them inline. Only data-fetch
//! failures become 5xx.

use crate::models::{CreateCreditNote, CreditNote, CreditNoteStatus, ListCreditNotesFilter};
use crate::routes::AppState;
use crate::services::database::CreditNoteIssue;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateCreditNoteRequest {
    /// NULL for a standalone customer credit.
    pub invoice_id: Option<Uuid>,
    pub customer_id: Uuid,
    /// Net amount; VAT is added on top.
    pub amount: Decimal,
    pub vat_rate: Decimal,
    pub reason: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListCreditNotesQuery {
    pub invoice_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<CreditNoteStatus>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

fn default_page_size() -> i32 {
    50
}

#[derive(Debug, Serialize)]
pub struct CreditNoteListResponse {
    pub credit_notes: Vec<CreditNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub field_errors: BTreeMap<&'static str, &'static str>,
}

pub async fn create_credit_note(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    Json(payload): Json<CreateCreditNoteRequest>,
) -> Result<(StatusCode, Json<CreditNote>), AppError> {
    let input = CreateCreditNote {
        business_id,
        invoice_id: payload.invoice_id,
        customer_id: payload.customer_id,
        amount: payload.amount,
        vat_rate: payload.vat_rate,
        reason: payload.reason,
        description: payload.description,
    };
    let note = state.db.create_credit_note(&input).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn list_credit_notes(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    Query(query): Query<ListCreditNotesQuery>,
) -> Result<Json<CreditNoteListResponse>, AppError> {
    let filter = ListCreditNotesFilter {
        invoice_id: query.invoice_id,
        customer_id: query.customer_id,
        status: query.status,
        page_size: query.page_size,
        page_token: query.page_token,
    };
    let credit_notes = state.db.list_credit_notes(business_id, &filter).await?;
    let next_page_token = if credit_notes.len() as i64 >= filter.page_size.clamp(1, 100) as i64 {
        credit_notes.last().map(|n| n.credit_note_id)
    } else {
        None
    };
    Ok(Json(CreditNoteListResponse {
        credit_notes,
        next_page_token,
    }))
}

pub async fn get_credit_note(
    State(state): State<AppState>,
    Path((business_id, credit_note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CreditNote>, AppError> {
    let note = state
        .db
        .get_credit_note(business_id, credit_note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credit note not found")))?;
    Ok(Json(note))
}

pub async fn issue_credit_note(
    State(state): State<AppState>,
    Path((business_id, credit_note_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let outcome = state
        .db
        .issue_credit_note(business_id, credit_note_id, &state.config.numbering)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credit note not found")))?;

    match outcome {
        CreditNoteIssue::Issued(note) => Ok(Json(note).into_response()),
        CreditNoteIssue::Rejected(validation) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationErrorResponse {
                error: "Credit note failed validation".to_string(),
                field_errors: validation.field_errors(),
            }),
        )
            .into_response()),
    }
}
