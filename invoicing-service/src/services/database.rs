//! Database service for invoicing-service.
//!
//! All monetary snapshots pass through the pure calculator in
//! `crate::domain` so that draft previews and issued documents can never
//! disagree. The counters table is the single concurrency-bearing piece:
//! the increment is one atomic upsert, run inside the same transaction as
//! the issue status flip so a failed issue never burns or duplicates a
//! number. Lifecycle mutations lock the document row first, which is what
//! keeps issued documents immutable under concurrent writers.

use crate::config::NumberingConfig;
use crate::domain::{
    calculate_totals, existing_credits_gross, format_sequence_number, round_money,
    validate_credit_note, CreditNoteCheck, CreditNoteValidation, DiscountInput, DiscountType,
    InvoiceBalance, InvoiceTotals, LineInput,
};
use crate::models::{
    CreateCreditNote, CreateDocument, CreateDocumentItem, CreatePayment, CreditNote,
    Document, DocumentItem, DocumentKind, ListCreditNotesFilter, ListDocumentsFilter, Payment,
    UpdateDocument, UpdateDocumentItem,
};
use crate::services::metrics::{
    CREDIT_NOTES_TOTAL, DB_QUERY_DURATION, DOCUMENTS_TOTAL, INVOICE_AMOUNT_TOTAL, PAYMENTS_TOTAL,
    PAYMENT_AMOUNT_TOTAL, SEQUENCE_FAILURES_TOTAL,
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "document_id, business_id, document_number, document_kind, status, \
    customer_id, customer_name, customer_vat_number, customer_address, currency, \
    issue_date, due_date, discount_type, discount_value, \
    subtotal, discount_amount, taxable, vat_total, total, amount_paid, \
    notes, created_utc, issued_utc, voided_utc";

const ITEM_COLUMNS: &str = "item_id, document_id, business_id, description, quantity, \
    unit_price, vat_rate, line_net, sort_order, created_utc";

const CREDIT_NOTE_COLUMNS: &str = "credit_note_id, business_id, invoice_id, customer_id, \
    credit_note_number, status, amount, vat_rate, reason, description, created_utc, issued_utc";

const PAYMENT_COLUMNS: &str = "payment_id, business_id, invoice_id, amount, payment_date, \
    method, reference, notes, created_utc";

/// Outcome of attempting to issue a credit note: either the issued note or
/// the business-rule violations that blocked it.
#[derive(Debug)]
pub enum CreditNoteIssue {
    Issued(CreditNote),
    Rejected(CreditNoteValidation),
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Document Operations
    // -------------------------------------------------------------------------

    /// Create a new draft document.
    #[instrument(skip(self, input), fields(business_id = %input.business_id))]
    pub async fn create_document(&self, input: &CreateDocument) -> Result<Document, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_document"])
            .start_timer();

        let document_id = Uuid::new_v4();
        let sql = format!(
            r#"
            INSERT INTO documents (
                document_id, business_id, document_kind, status, customer_id, customer_name,
                customer_vat_number, customer_address, currency, due_date,
                discount_type, discount_value, notes
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );
        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(document_id)
            .bind(input.business_id)
            .bind(input.document_kind.as_str())
            .bind(input.customer_id)
            .bind(&input.customer_name)
            .bind(&input.customer_vat_number)
            .bind(&input.customer_address)
            .bind(&input.currency)
            .bind(input.due_date)
            .bind(&input.discount_type)
            .bind(input.discount_value)
            .bind(&input.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create document: {}", e))
            })?;

        timer.observe_duration();

        DOCUMENTS_TOTAL
            .with_label_values(&[input.document_kind.as_str(), "created"])
            .inc();
        info!(document_id = %document.document_id, kind = %document.document_kind, "Draft document created");

        Ok(document)
    }

    /// Get a document by ID.
    #[instrument(skip(self), fields(business_id = %business_id, document_id = %document_id))]
    pub async fn get_document(
        &self,
        business_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_document"])
            .start_timer();

        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE business_id = $1 AND document_id = $2"
        );
        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(business_id)
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get document: {}", e))
            })?;

        timer.observe_duration();

        Ok(document)
    }

    /// List documents for a business.
    #[instrument(skip(self, filter), fields(business_id = %business_id))]
    pub async fn list_documents(
        &self,
        business_id: Uuid,
        filter: &ListDocumentsFilter,
    ) -> Result<Vec<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_documents"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let kind_str = filter.kind.map(|k| k.as_str().to_string());

        let documents = if let Some(cursor) = filter.page_token {
            let sql = format!(
                r#"
                SELECT {DOCUMENT_COLUMNS}
                FROM documents
                WHERE business_id = $1
                  AND ($2::varchar IS NULL OR document_kind = $2)
                  AND ($3::varchar IS NULL OR status = $3)
                  AND ($4::uuid IS NULL OR customer_id = $4)
                  AND ($5::date IS NULL OR issue_date >= $5)
                  AND ($6::date IS NULL OR issue_date <= $6)
                  AND document_id > $7
                ORDER BY document_id
                LIMIT $8
                "#
            );
            sqlx::query_as::<_, Document>(&sql)
                .bind(business_id)
                .bind(&kind_str)
                .bind(&filter.status)
                .bind(filter.customer_id)
                .bind(filter.start_date)
                .bind(filter.end_date)
                .bind(cursor)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
        } else {
            let sql = format!(
                r#"
                SELECT {DOCUMENT_COLUMNS}
                FROM documents
                WHERE business_id = $1
                  AND ($2::varchar IS NULL OR document_kind = $2)
                  AND ($3::varchar IS NULL OR status = $3)
                  AND ($4::uuid IS NULL OR customer_id = $4)
                  AND ($5::date IS NULL OR issue_date >= $5)
                  AND ($6::date IS NULL OR issue_date <= $6)
                ORDER BY document_id
                LIMIT $7
                "#
            );
            sqlx::query_as::<_, Document>(&sql)
                .bind(business_id)
                .bind(&kind_str)
                .bind(&filter.status)
                .bind(filter.customer_id)
                .bind(filter.start_date)
                .bind(filter.end_date)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list documents: {}", e)))?;

        timer.observe_duration();

        Ok(documents)
    }

    /// Update a draft document. Issued documents are immutable except
    /// through payments, credit notes and voiding.
    #[instrument(skip(self, input), fields(business_id = %business_id, document_id = %document_id))]
    pub async fn update_document(
        &self,
        business_id: Uuid,
        document_id: Uuid,
        input: &UpdateDocument,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_document"])
            .start_timer();

        let existing = self.get_document(business_id, document_id).await?;
        match existing {
            Some(doc) if doc.status == "draft" => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft documents can be updated"
                )))
            }
            None => return Ok(None),
        };

        let sql = format!(
            r#"
            UPDATE documents
            SET customer_name = COALESCE($3, customer_name),
                customer_vat_number = COALESCE($4, customer_vat_number),
                customer_address = COALESCE($5, customer_address),
                due_date = COALESCE($6, due_date),
                discount_type = COALESCE($7, discount_type),
                discount_value = COALESCE($8, discount_value),
                notes = COALESCE($9, notes)
            WHERE business_id = $1 AND document_id = $2 AND status = 'draft'
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );
        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(business_id)
            .bind(document_id)
            .bind(&input.customer_name)
            .bind(&input.customer_vat_number)
            .bind(&input.customer_address)
            .bind(input.due_date)
            .bind(&input.discount_type)
            .bind(input.discount_value)
            .bind(&input.notes)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update document: {}", e))
            })?;

        timer.observe_duration();

        // Discount changes move the draft totals.
        if document.is_some() {
            self.refresh_draft_totals(business_id, document_id).await?;
            return self.get_document(business_id, document_id).await;
        }

        Ok(document)
    }

    /// Delete a draft document.
    #[instrument(skip(self), fields(business_id = %business_id, document_id = %document_id))]
    pub async fn delete_document(
        &self,
        business_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_document"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE business_id = $1 AND document_id = $2 AND status = 'draft'
            "#,
        )
        .bind(business_id)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete document: {}", e))
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(document_id = %document_id, "Draft document deleted");
        }

        Ok(deleted)
    }

    /// Issue a document: assign its number, freeze its monetary snapshot and
    /// flip it from draft to issued.
    ///
    /// The counter increment and the status flip run in one transaction. If
    /// numbering fails the document stays a draft; if the flip fails the
    /// increment rolls back. A document is never persisted issued without a
    /// number.
    #[instrument(skip(self, numbering), fields(business_id = %business_id, document_id = %document_id))]
    pub async fn issue_document(
        &self,
        business_id: Uuid,
        document_id: Uuid,
        issue_date: NaiveDate,
        numbering: &NumberingConfig,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["issue_document"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Lock the document row so line items cannot change between the
        // totals snapshot and the status flip; add/update/remove take the
        // same lock before touching items.
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE business_id = $1 AND document_id = $2 FOR UPDATE"
        );
        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(business_id)
            .bind(document_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get document: {}", e))
            })?;
        let document = match document {
            Some(doc) if doc.status == "draft" => doc,
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft documents can be issued"
                )))
            }
            None => return Ok(None),
        };

        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM document_items \
             WHERE business_id = $1 AND document_id = $2 ORDER BY sort_order, created_utc"
        );
        let items = sqlx::query_as::<_, DocumentItem>(&sql)
            .bind(business_id)
            .bind(document_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e))
            })?;
        if items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot issue a document without line items"
            )));
        }

        let totals = snapshot_totals(&document, &items);
        let kind = DocumentKind::from_string(&document.document_kind);
        let prefix = match kind {
            DocumentKind::Invoice => numbering.invoice_prefix.as_str(),
            DocumentKind::Quotation => numbering.quotation_prefix.as_str(),
        };
        let year = issue_date.year();

        let last_seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (business_id, prefix, year, last_seq)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (business_id, prefix, year)
            DO UPDATE SET last_seq = counters.last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(business_id)
        .bind(prefix)
        .bind(year)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            SEQUENCE_FAILURES_TOTAL.with_label_values(&[prefix]).inc();
            AppError::DatabaseError(anyhow::anyhow!("Failed to generate document number: {}", e))
        })?;

        let number = format_sequence_number(prefix, last_seq, numbering.pad_width);

        let sql = format!(
            r#"
            UPDATE documents
            SET document_number = $3,
                status = 'issued',
                issue_date = $4,
                issued_utc = NOW(),
                subtotal = $5,
                discount_amount = $6,
                taxable = $7,
                vat_total = $8,
                total = $9
            WHERE business_id = $1 AND document_id = $2 AND status = 'draft'
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );
        let issued = sqlx::query_as::<_, Document>(&sql)
            .bind(business_id)
            .bind(document_id)
            .bind(&number)
            .bind(issue_date)
            .bind(totals.subtotal)
            .bind(totals.discount_amount)
            .bind(totals.taxable)
            .bind(totals.vat_amount)
            .bind(totals.total)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Document number '{}' already exists",
                        number
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to issue document: {}", e)),
            })?;

        let issued = match issued {
            Some(doc) => {
                tx.commit().await.map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to commit issue: {}", e))
                })?;
                doc
            }
            None => {
                // Lost a race with a concurrent issue or delete; the counter
                // increment rolls back with the transaction.
                tx.rollback().await.ok();
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Document was modified concurrently"
                )));
            }
        };

        timer.observe_duration();

        DOCUMENTS_TOTAL
            .with_label_values(&[issued.document_kind.as_str(), "issued"])
            .inc();
        if kind == DocumentKind::Invoice {
            INVOICE_AMOUNT_TOTAL
                .with_label_values(&[issued.currency.as_str()])
                .inc_by(issued.total.to_f64().unwrap_or(0.0));
        }
        info!(
            document_id = %issued.document_id,
            document_number = %issued.document_number.as_deref().unwrap_or(""),
            total = %issued.total,
            "Document issued"
        );

        Ok(Some(issued))
    }

    /// Void a document. Issued documents can always be voided; drafts only
    /// when the voiding policy allows it.
    #[instrument(skip(self), fields(business_id = %business_id, document_id = %document_id))]
    pub async fn void_document(
        &self,
        business_id: Uuid,
        document_id: Uuid,
        allow_void_draft: bool,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["void_document"])
            .start_timer();

        let existing = self.get_document(business_id, document_id).await?;
        match existing {
            Some(doc) if doc.status == "issued" => {}
            Some(doc) if doc.status == "draft" && allow_void_draft => {}
            Some(doc) if doc.status == "draft" => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Draft documents cannot be voided; delete the draft instead"
                )))
            }
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Document is already void"
                )))
            }
            None => return Ok(None),
        };

        let sql = format!(
            r#"
            UPDATE documents
            SET status = 'void',
                voided_utc = NOW()
            WHERE business_id = $1 AND document_id = $2 AND status IN ('draft', 'issued')
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );
        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(business_id)
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to void document: {}", e))
            })?;

        timer.observe_duration();

        if let Some(ref doc) = document {
            DOCUMENTS_TOTAL
                .with_label_values(&[doc.document_kind.as_str(), "voided"])
                .inc();
            info!(document_id = %doc.document_id, "Document voided");
        }

        Ok(document)
    }

    // -------------------------------------------------------------------------
    // Line Item Operations
    // -------------------------------------------------------------------------

    /// Add a line item to a draft document and refresh the draft totals.
    #[instrument(skip(self, input), fields(business_id = %input.business_id, document_id = %input.document_id))]
    pub async fn add_item(&self, input: &CreateDocumentItem) -> Result<DocumentItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Holding the document row lock keeps the draft check valid until
        // commit; a concurrent issue blocks behind it.
        let status = self
            .lock_document_status(&mut tx, input.business_id, input.document_id)
            .await?;
        match status.as_deref() {
            Some("draft") => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Can only add line items to draft documents"
                )))
            }
            None => {
                return Err(AppError::NotFound(anyhow::anyhow!("Document not found")));
            }
        };

        let line_net = input.quantity * input.unit_price;

        let item_id = Uuid::new_v4();
        let sql = format!(
            r#"
            INSERT INTO document_items (
                item_id, document_id, business_id, description, quantity,
                unit_price, vat_rate, line_net, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let item = sqlx::query_as::<_, DocumentItem>(&sql)
            .bind(item_id)
            .bind(input.document_id)
            .bind(input.business_id)
            .bind(&input.description)
            .bind(input.quantity)
            .bind(input.unit_price)
            .bind(input.vat_rate)
            .bind(line_net)
            .bind(input.sort_order)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to add line item: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit line item: {}", e))
        })?;

        // Recompute totals after commit; refresh is a no-op if the document
        // left draft in the meantime.
        self.refresh_draft_totals(input.business_id, input.document_id)
            .await?;

        timer.observe_duration();

        info!(item_id = %item.item_id, "Line item added");

        Ok(item)
    }

    /// Get line items for a document.
    #[instrument(skip(self), fields(business_id = %business_id, document_id = %document_id))]
    pub async fn get_items(
        &self,
        business_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<DocumentItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_items"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM document_items
            WHERE business_id = $1 AND document_id = $2
            ORDER BY sort_order, created_utc
            "#
        );
        let items = sqlx::query_as::<_, DocumentItem>(&sql)
            .bind(business_id)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e))
            })?;

        timer.observe_duration();

        Ok(items)
    }

    /// Update a line item on a draft document and refresh the draft totals.
    #[instrument(skip(self, input), fields(business_id = %business_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        business_id: Uuid,
        document_id: Uuid,
        item_id: Uuid,
        input: &UpdateDocumentItem,
    ) -> Result<Option<DocumentItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let status = self
            .lock_document_status(&mut tx, business_id, document_id)
            .await?;
        match status.as_deref() {
            Some("draft") => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Can only update line items on draft documents"
                )))
            }
            None => return Ok(None),
        };

        let existing = {
            let sql = format!(
                "SELECT {ITEM_COLUMNS} FROM document_items \
                 WHERE business_id = $1 AND document_id = $2 AND item_id = $3"
            );
            sqlx::query_as::<_, DocumentItem>(&sql)
                .bind(business_id)
                .bind(document_id)
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to get line item: {}", e))
                })?
        };
        let existing = match existing {
            Some(item) => item,
            None => return Ok(None),
        };

        let quantity = input.quantity.unwrap_or(existing.quantity);
        let unit_price = input.unit_price.unwrap_or(existing.unit_price);
        let vat_rate = input.vat_rate.unwrap_or(existing.vat_rate);
        let line_net = quantity * unit_price;

        let sql = format!(
            r#"
            UPDATE document_items
            SET description = COALESCE($4, description),
                quantity = $5,
                unit_price = $6,
                vat_rate = $7,
                line_net = $8,
                sort_order = COALESCE($9, sort_order)
            WHERE business_id = $1 AND document_id = $2 AND item_id = $3
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let item = sqlx::query_as::<_, DocumentItem>(&sql)
            .bind(business_id)
            .bind(document_id)
            .bind(item_id)
            .bind(&input.description)
            .bind(quantity)
            .bind(unit_price)
            .bind(vat_rate)
            .bind(line_net)
            .bind(input.sort_order)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update line item: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit line item: {}", e))
        })?;

        self.refresh_draft_totals(business_id, document_id).await?;

        timer.observe_duration();

        Ok(item)
    }

    /// Remove a line item from a draft document and refresh the draft totals.
    #[instrument(skip(self), fields(business_id = %business_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        business_id: Uuid,
        document_id: Uuid,
        item_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let status = self
            .lock_document_status(&mut tx, business_id, document_id)
            .await?;
        match status.as_deref() {
            Some("draft") => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Can only remove line items from draft documents"
                )))
            }
            None => return Ok(false),
        };

        let result = sqlx::query(
            r#"
            DELETE FROM document_items
            WHERE business_id = $1 AND document_id = $2 AND item_id = $3
            "#,
        )
        .bind(business_id)
        .bind(document_id)
        .bind(item_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to remove line item: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit line item removal: {}", e))
        })?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.refresh_draft_totals(business_id, document_id).await?;
        }

        timer.observe_duration();

        Ok(removed)
    }

    /// Lock the document row for the duration of `tx` and return its status.
    async fn lock_document_status(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        business_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<String>, AppError> {
        sqlx::query_scalar(
            "SELECT status FROM documents \
             WHERE business_id = $1 AND document_id = $2 FOR UPDATE",
        )
        .bind(business_id)
        .bind(document_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock document: {}", e)))
    }

    /// Recompute a draft document's monetary columns from its line items
    /// through the pure calculator, so previews always match what issue
    /// will freeze.
    async fn refresh_draft_totals(
        &self,
        business_id: Uuid,
        document_id: Uuid,
    ) -> Result<(), AppError> {
        let document = match self.get_document(business_id, document_id).await? {
            Some(doc) if doc.status == "draft" => doc,
            _ => return Ok(()),
        };
        let items = self.get_items(business_id, document_id).await?;
        let totals = snapshot_totals(&document, &items);

        sqlx::query(
            r#"
            UPDATE documents
            SET subtotal = $3,
                discount_amount = $4,
                taxable = $5,
                vat_total = $6,
                total = $7
            WHERE business_id = $1 AND document_id = $2 AND status = 'draft'
            "#,
        )
        .bind(business_id)
        .bind(document_id)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.taxable)
        .bind(totals.vat_amount)
        .bind(totals.total)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to refresh draft totals: {}", e))
        })?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a payment against an issued invoice.
    #[instrument(skip(self, input), fields(business_id = %input.business_id, invoice_id = %input.invoice_id))]
    pub async fn record_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Lock the invoice row so the overpayment check reads a current
        // amount_paid and concurrent payments serialize behind it. The
        // insert and the running-total update commit or roll back together.
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE business_id = $1 AND document_id = $2 FOR UPDATE"
        );
        let invoice = sqlx::query_as::<_, Document>(&sql)
            .bind(input.business_id)
            .bind(input.invoice_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e))
            })?;
        let invoice = match invoice {
            Some(doc) if doc.status == "issued" && doc.document_kind == "invoice" => doc,
            Some(doc) if doc.document_kind != "invoice" => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Payments can only be recorded against invoices"
                )))
            }
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Can only record payments against issued invoices"
                )))
            }
            None => return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found"))),
        };

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be greater than zero"
            )));
        }

        let amount_due = invoice.total - invoice.amount_paid;
        if input.amount > amount_due {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount {} exceeds amount due {}",
                input.amount,
                amount_due
            )));
        }

        let payment_id = Uuid::new_v4();
        let sql = format!(
            r#"
            INSERT INTO payments (
                payment_id, business_id, invoice_id, amount, payment_date,
                method, reference, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .bind(input.business_id)
            .bind(input.invoice_id)
            .bind(input.amount)
            .bind(input.payment_date)
            .bind(&input.method)
            .bind(&input.reference)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e))
            })?;

        let updated = sqlx::query(
            r#"
            UPDATE documents
            SET amount_paid = amount_paid + $3
            WHERE business_id = $1 AND document_id = $2
              AND status = 'issued' AND amount_paid + $3 <= total
            "#,
        )
        .bind(input.business_id)
        .bind(input.invoice_id)
        .bind(input.amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update amount paid: {}", e))
        })?;
        if updated.rows_affected() == 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice was modified concurrently"
            )));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit payment: {}", e))
        })?;

        timer.observe_duration();

        PAYMENTS_TOTAL
            .with_label_values(&[payment.method.as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&[invoice.currency.as_str()])
            .inc_by(payment.amount.to_f64().unwrap_or(0.0));
        info!(
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            "Payment recorded"
        );

        Ok(payment)
    }

    /// List payments for an invoice.
    #[instrument(skip(self), fields(business_id = %business_id, invoice_id = %invoice_id))]
    pub async fn list_payments(
        &self,
        business_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE business_id = $1 AND invoice_id = $2
            ORDER BY payment_date, created_utc
            "#
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(business_id)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e))
            })?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Sum of payments recorded against an invoice.
    #[instrument(skip(self), fields(business_id = %business_id, invoice_id = %invoice_id))]
    pub async fn payments_total(
        &self,
        business_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["payments_total"])
            .start_timer();

        let total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payments
            WHERE business_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(business_id)
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e))
        })?;

        timer.observe_duration();

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    // -------------------------------------------------------------------------
    // Credit Note Operations
    // -------------------------------------------------------------------------

    /// Create a draft credit note, either linked to an issued invoice or as
    /// a standalone customer credit.
    #[instrument(skip(self, input), fields(business_id = %input.business_id))]
    pub async fn create_credit_note(
        &self,
        input: &CreateCreditNote,
    ) -> Result<CreditNote, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_credit_note"])
            .start_timer();

        if let Some(invoice_id) = input.invoice_id {
            let invoice = self.get_document(input.business_id, invoice_id).await?;
            match invoice {
                Some(doc) if doc.document_kind == "invoice" && doc.status == "issued" => {}
                Some(_) => {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Credit notes can only be linked to issued invoices"
                    )))
                }
                None => {
                    return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
                }
            };
        }

        let credit_note_id = Uuid::new_v4();
        let sql = format!(
            r#"
            INSERT INTO credit_notes (
                credit_note_id, business_id, invoice_id, customer_id, status,
                amount, vat_rate, reason, description
            )
            VALUES ($1, $2, $3, $4, 'draft', $5, $6, $7, $8)
            RETURNING {CREDIT_NOTE_COLUMNS}
            "#
        );
        let note = sqlx::query_as::<_, CreditNote>(&sql)
            .bind(credit_note_id)
            .bind(input.business_id)
            .bind(input.invoice_id)
            .bind(input.customer_id)
            .bind(input.amount)
            .bind(input.vat_rate)
            .bind(&input.reason)
            .bind(&input.description)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create credit note: {}", e))
            })?;

        timer.observe_duration();

        CREDIT_NOTES_TOTAL.with_label_values(&["created"]).inc();
        info!(credit_note_id = %note.credit_note_id, "Draft credit note created");

        Ok(note)
    }

    /// Get a credit note by ID.
    #[instrument(skip(self), fields(business_id = %business_id, credit_note_id = %credit_note_id))]
    pub async fn get_credit_note(
        &self,
        business_id: Uuid,
        credit_note_id: Uuid,
    ) -> Result<Option<CreditNote>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_credit_note"])
            .start_timer();

        let sql = format!(
            "SELECT {CREDIT_NOTE_COLUMNS} FROM credit_notes \
             WHERE business_id = $1 AND credit_note_id = $2"
        );
        let note = sqlx::query_as::<_, CreditNote>(&sql)
            .bind(business_id)
            .bind(credit_note_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get credit note: {}", e))
            })?;

        timer.observe_duration();

        Ok(note)
    }

    /// List credit notes for a business.
    #[instrument(skip(self, filter), fields(business_id = %business_id))]
    pub async fn list_credit_notes(
        &self,
        business_id: Uuid,
        filter: &ListCreditNotesFilter,
    ) -> Result<Vec<CreditNote>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_credit_notes"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let notes = if let Some(cursor) = filter.page_token {
            let sql = format!(
                r#"
                SELECT {CREDIT_NOTE_COLUMNS}
                FROM credit_notes
                WHERE business_id = $1
                  AND ($2::uuid IS NULL OR invoice_id = $2)
                  AND ($3::uuid IS NULL OR customer_id = $3)
                  AND ($4::varchar IS NULL OR status = $4)
                  AND credit_note_id > $5
                ORDER BY credit_note_id
                LIMIT $6
                "#
            );
            sqlx::query_as::<_, CreditNote>(&sql)
                .bind(business_id)
                .bind(filter.invoice_id)
                .bind(filter.customer_id)
                .bind(&status_str)
                .bind(cursor)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
        } else {
            let sql = format!(
                r#"
                SELECT {CREDIT_NOTE_COLUMNS}
                FROM credit_notes
                WHERE business_id = $1
                  AND ($2::uuid IS NULL OR invoice_id = $2)
                  AND ($3::uuid IS NULL OR customer_id = $3)
                  AND ($4::varchar IS NULL OR status = $4)
                ORDER BY credit_note_id
                LIMIT $5
                "#
            );
            sqlx::query_as::<_, CreditNote>(&sql)
                .bind(business_id)
                .bind(filter.invoice_id)
                .bind(filter.customer_id)
                .bind(&status_str)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list credit notes: {}", e))
        })?;

        timer.observe_duration();

        Ok(notes)
    }

    /// Gross value of the other issued credit notes against an invoice,
    /// excluding the note under validation.
    #[instrument(skip(self), fields(business_id = %business_id, invoice_id = %invoice_id))]
    pub async fn other_credits_gross(
        &self,
        business_id: Uuid,
        invoice_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["other_credits_gross"])
            .start_timer();

        let rows: Vec<(Decimal, Decimal)> = sqlx::query_as(
            r#"
            SELECT amount, vat_rate
            FROM credit_notes
            WHERE business_id = $1
              AND invoice_id = $2
              AND status = 'issued'
              AND ($3::uuid IS NULL OR credit_note_id <> $3)
            "#,
        )
        .bind(business_id)
        .bind(invoice_id)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum credit notes: {}", e))
        })?;

        timer.observe_duration();

        Ok(existing_credits_gross(&rows))
    }

    /// Issue a draft credit note.
    ///
    /// Fetches the invoice aggregates, runs the balance validator and, when
    /// valid, numbers the note and flips it to issued in one transaction.
    /// Business-rule violations come back as `CreditNoteIssue::Rejected`,
    /// never as an error.
    ///
    /// The aggregates are read outside any isolation level that would stop
    /// a concurrent credit note passing validation against the same
    /// balance; that narrow race is an accepted risk.
    #[instrument(skip(self, numbering), fields(business_id = %business_id, credit_note_id = %credit_note_id))]
    pub async fn issue_credit_note(
        &self,
        business_id: Uuid,
        credit_note_id: Uuid,
        numbering: &NumberingConfig,
    ) -> Result<Option<CreditNoteIssue>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["issue_credit_note"])
            .start_timer();

        let note = match self.get_credit_note(business_id, credit_note_id).await? {
            Some(note) => note,
            None => return Ok(None),
        };
        if note.status != "draft" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only draft credit notes can be issued"
            )));
        }

        let balance = match note.invoice_id {
            Some(invoice_id) => {
                let invoice = self
                    .get_document(business_id, invoice_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(anyhow::anyhow!("Linked invoice not found"))
                    })?;
                let other_credits = self
                    .other_credits_gross(business_id, invoice_id, Some(credit_note_id))
                    .await?;
                let payments = self.payments_total(business_id, invoice_id).await?;
                Some(InvoiceBalance {
                    invoice_total: invoice.total,
                    other_credits_gross: other_credits,
                    payments_total: payments,
                })
            }
            None => None,
        };

        let check = CreditNoteCheck {
            proposed_gross: round_money(note.gross()),
            balance,
            issuing: true,
            has_reason: note.reason.as_deref().is_some_and(|r| !r.trim().is_empty()),
            has_description: note
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty()),
        };
        let validation = validate_credit_note(&check);
        if !validation.is_valid() {
            CREDIT_NOTES_TOTAL.with_label_values(&["rejected"]).inc();
            info!(
                credit_note_id = %credit_note_id,
                violations = validation.violations.len(),
                "Credit note rejected by balance validation"
            );
            return Ok(Some(CreditNoteIssue::Rejected(validation)));
        }

        let prefix = numbering.credit_note_prefix.as_str();
        let year = Utc::now().year();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let last_seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (business_id, prefix, year, last_seq)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (business_id, prefix, year)
            DO UPDATE SET last_seq = counters.last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(business_id)
        .bind(prefix)
        .bind(year)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            SEQUENCE_FAILURES_TOTAL.with_label_values(&[prefix]).inc();
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to generate credit note number: {}",
                e
            ))
        })?;

        let number = format_sequence_number(prefix, last_seq, numbering.pad_width);

        let sql = format!(
            r#"
            UPDATE credit_notes
            SET credit_note_number = $3,
                status = 'issued',
                issued_utc = NOW()
            WHERE business_id = $1 AND credit_note_id = $2 AND status = 'draft'
            RETURNING {CREDIT_NOTE_COLUMNS}
            "#
        );
        let issued = sqlx::query_as::<_, CreditNote>(&sql)
            .bind(business_id)
            .bind(credit_note_id)
            .bind(&number)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Credit note number '{}' already exists",
                        number
                    ))
                }
                _ => {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to issue credit note: {}", e))
                }
            })?;

        let issued = match issued {
            Some(note) => {
                tx.commit().await.map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to commit issue: {}", e))
                })?;
                note
            }
            None => {
                tx.rollback().await.ok();
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Credit note was modified concurrently"
                )));
            }
        };

        timer.observe_duration();

        CREDIT_NOTES_TOTAL.with_label_values(&["issued"]).inc();
        info!(
            credit_note_id = %issued.credit_note_id,
            credit_note_number = %issued.credit_note_number.as_deref().unwrap_or(""),
            "Credit note issued"
        );

        Ok(Some(CreditNoteIssue::Issued(issued)))
    }
}

/// Build the calculator inputs from a document row and its items.
fn snapshot_totals(document: &Document, items: &[DocumentItem]) -> InvoiceTotals {
    let lines: Vec<LineInput> = items
        .iter()
        .map(|item| LineInput {
            quantity: item.quantity,
            unit_price: item.unit_price,
            vat_rate: item.vat_rate,
        })
        .collect();
    let discount = DiscountInput {
        discount_type: DiscountType::from_string(&document.discount_type),
        value: document.discount_value,
    };
    calculate_totals(&lines, &discount)
}
