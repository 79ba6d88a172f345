//! Persisted domain models for invoicing-service.

mod credit_note;
mod document;
mod line_item;
mod payment;

pub use credit_note::{CreateCreditNote, CreditNote, CreditNoteStatus, ListCreditNotesFilter};
pub use document::{
    CreateDocument, Document, DocumentKind, ListDocumentsFilter, UpdateDocument,
};
pub use line_item::{CreateDocumentItem, DocumentItem, UpdateDocumentItem};
pub use payment::{CreatePayment, Payment};
