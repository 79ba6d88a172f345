//! HTTP routes for invoicing-service.

pub mod credit_notes;
pub mod documents;
pub mod payments;
pub mod totals;

use crate::config::InvoicingConfig;
use crate::services::Database;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<InvoicingConfig>,
    pub db: Arc<Database>,
}

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/businesses/:business_id/documents",
            post(documents::create_document).get(documents::list_documents),
        )
        .route(
            "/businesses/:business_id/documents/:document_id",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route(
            "/businesses/:business_id/documents/:document_id/issue",
            post(documents::issue_document),
        )
        .route(
            "/businesses/:business_id/documents/:document_id/void",
            post(documents::void_document),
        )
        .route(
            "/businesses/:business_id/documents/:document_id/status",
            get(documents::document_status),
        )
        .route(
            "/businesses/:business_id/documents/:document_id/items",
            post(documents::add_item),
        )
        .route(
            "/businesses/:business_id/documents/:document_id/items/:item_id",
            axum::routing::put(documents::update_item).delete(documents::remove_item),
        )
        .route(
            "/businesses/:business_id/documents/:document_id/payments",
            post(payments::record_payment).get(payments::list_payments),
        )
        .route(
            "/businesses/:business_id/credit-notes",
            post(credit_notes::create_credit_note).get(credit_notes::list_credit_notes),
        )
        .route(
            "/businesses/:business_id/credit-notes/:credit_note_id",
            get(credit_notes::get_credit_note),
        )
        .route(
            "/businesses/:business_id/credit-notes/:credit_note_id/issue",
            post(credit_notes::issue_credit_note),
        )
        .route("/totals/preview", post(totals::preview_totals))
}
