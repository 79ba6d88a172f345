//! Document handlers: CRUD, line items, issue, void, status.

use crate::domain::{resolve_document_status_now, DiscountType, DocumentStatus, StatusInfo};
use crate::models::{
    CreateDocument, CreateDocumentItem, Document, DocumentItem, DocumentKind,
    ListDocumentsFilter, UpdateDocument, UpdateDocumentItem,
};
use crate::routes::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub document_kind: DocumentKind,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_vat_number: Option<String>,
    pub customer_address: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub due_date: Option<NaiveDate>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub customer_name: Option<String>,
    pub customer_vat_number: Option<String>,
    pub customer_address: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub kind: Option<DocumentKind>,
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

fn default_page_size() -> i32 {
    50
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<Uuid>,
}

/// Document with its line items and resolved status.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    #[serde(flatten)]
    pub document: Document,
    pub items: Vec<DocumentItem>,
    pub status_info: StatusInfo,
}

#[derive(Debug, Deserialize, Default)]
pub struct IssueDocumentRequest {
    /// Defaults to the current UTC calendar day.
    pub issue_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateItemRequest {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub vat_rate: Option<Decimal>,
    pub sort_order: Option<i32>,
}

fn status_info(document: &Document) -> StatusInfo {
    resolve_document_status_now(
        DocumentStatus::from_string(&document.status),
        document.total,
        document.amount_paid,
        document.due_date,
    )
}

pub async fn create_document(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    Json(payload): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let input = CreateDocument {
        business_id,
        document_kind: payload.document_kind,
        customer_id: payload.customer_id,
        customer_name: payload.customer_name,
        customer_vat_number: payload.customer_vat_number,
        customer_address: payload.customer_address,
        currency: payload.currency,
        due_date: payload.due_date,
        discount_type: payload
            .discount_type
            .unwrap_or(DiscountType::None)
            .as_str()
            .to_string(),
        discount_value: payload.discount_value.unwrap_or(Decimal::ZERO),
        notes: payload.notes,
    };
    let document = state.db.create_document(&input).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Path(business_id): Path<Uuid>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let filter = ListDocumentsFilter {
        kind: query.kind,
        status: query.status,
        customer_id: query.customer_id,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size,
        page_token: query.page_token,
    };
    let documents = state.db.list_documents(business_id, &filter).await?;
    let next_page_token = if documents.len() as i64 >= filter.page_size.clamp(1, 100) as i64 {
        documents.last().map(|d| d.document_id)
    } else {
        None
    };
    Ok(Json(DocumentListResponse {
        documents,
        next_page_token,
    }))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path((business_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DocumentResponse>, AppError> {
    let document = state
        .db
        .get_document(business_id, document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
    let items = state.db.get_items(business_id, document_id).await?;
    let status_info = status_info(&document);
    Ok(Json(DocumentResponse {
        document,
        items,
        status_info,
    }))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path((business_id, document_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, AppError> {
    let input = UpdateDocument {
        customer_name: payload.customer_name,
        customer_vat_number: payload.customer_vat_number,
        customer_address: payload.customer_address,
        due_date: payload.due_date,
        discount_type: payload.discount_type.map(|t| t.as_str().to_string()),
        discount_value: payload.discount_value,
        notes: payload.notes,
    };
    let document = state
        .db
        .update_document(business_id, document_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
    Ok(Json(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path((business_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_document(business_id, document_id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Draft document not found"
        )))
    }
}

pub async fn issue_document(
    State(state): State<AppState>,
    Path((business_id, document_id)): Path<(Uuid, Uuid)>,
    payload: Option<Json<IssueDocumentRequest>>,
) -> Result<Json<Document>, AppError> {
    let issue_date = payload
        .and_then(|Json(p)| p.issue_date)
        .unwrap_or_else(|| Utc::now().date_naive());
    let document = state
        .db
        .issue_document(
            business_id,
            document_id,
            issue_date,
            &state.config.numbering,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
    Ok(Json(document))
}

pub async fn void_document(
    State(state): State<AppState>,
    Path((business_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Document>, AppError> {
    let document = state
        .db
        .void_document(
            business_id,
            document_id,
            state.config.policy.allow_void_draft,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
    Ok(Json(document))
}

pub async fn document_status(
    State(state): State<AppState>,
    Path((business_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<StatusInfo>, AppError> {
    let document = state
        .db
        .get_document(business_id, document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
    Ok(Json(status_info(&document)))
}

pub async fn add_item(
    State(state): State<AppState>,
    Path((business_id, document_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<DocumentItem>), AppError> {
    let input = CreateDocumentItem {
        business_id,
        document_id,
        description: payload.description,
        quantity: payload.quantity,
        unit_price: payload.unit_price,
        vat_rate: payload.vat_rate,
        sort_order: payload.sort_order,
    };
    let item = state.db.add_item(&input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path((business_id, document_id, item_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<DocumentItem>, AppError> {
    let input = UpdateDocumentItem {
        description: payload.description,
        quantity: payload.quantity,
        unit_price: payload.unit_price,
        vat_rate: payload.vat_rate,
        sort_order: payload.sort_order,
    };
    let item = state
        .db
        .update_item(business_id, document_id, item_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Line item not found")))?;
    Ok(Json(item))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Path((business_id, document_id, item_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let removed = state
        .db
        .remove_item(business_id, document_id, item_id)
        .await?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Line item not found")))
    }
}
