//! Pure financial computation core.
//!
//! Everything in this module is deterministic and free of I/O: totals are
//! computed independently for previews and issued snapshots and must match
//! exactly. Persistence concerns live in `crate::services`.

pub mod credit_note;
pub mod sequence;
pub mod status;
pub mod totals;

pub use credit_note::{
    existing_credits_gross, validate_credit_note, CreditNoteCheck, CreditNoteValidation,
    CreditNoteViolation, InvoiceBalance,
};
pub use sequence::format_sequence_number;
pub use status::{
    resolve_document_status, resolve_document_status_now, DisplayStatus, DocumentStatus,
    DueStatus, PaymentStatus, StatusInfo,
};
pub use totals::{
    calculate_totals, round_money, DiscountInput, DiscountType, InvoiceTotals, LineInput,
    VatBucket,
};
