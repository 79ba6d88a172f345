//! Sequence number formatting.
//!
//! The sequence value itself comes from an atomic counter increment in the
//! persistence layer (see `crate::services::sequence`); this module only
//! owns the human-readable rendering. There is deliberately no
//! read-highest-and-add-one path anywhere: that pattern loses updates under
//! concurrent document creation.

/// Render a sequence value as a prefixed, zero-padded document number,
/// e.g. `format_sequence_number("INV", 45, 6)` -> `"INV-000045"`.
///
/// Values wider than `pad_width` digits render unpadded rather than
/// truncated.
pub fn format_sequence_number(prefix: &str, seq: i64, pad_width: usize) -> String {
    format!("{}-{:0width$}", prefix, seq, width = pad_width)
}
