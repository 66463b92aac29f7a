//! Persistent per-instrument relations.
//!
//! Each ingested instrument owns a metadata database and a segment
//! database, both SQLite files written once during ingest and opened
//! read-only at query time. Connections are `Send` but not `Sync`, so
//! each store guards its connection with a mutex held only for the
//! duration of a single statement.

mod metadata;
mod segments;

pub use metadata::MetadataStore;
pub use segments::{SegmentRow, SegmentStore};

/// Validate a configured column name before it is spliced into DDL.
/// Predicate values are always bound as parameters; names cannot be, so
/// they are restricted to identifier characters.
pub(crate) fn check_identifier(name: &str) -> crate::Result<()> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(c) => c.is_ascii_alphabetic() || c == '_',
        None => false,
    };
    if ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(crate::Error::bad_query(format!(
            "invalid column name '{name}'"
        )))
    }
}
