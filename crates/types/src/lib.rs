//! # pdsc-types
//!
//! Shared data types for the PDSC observation catalog.
//!
//! This crate provides the record and query types exchanged between the
//! query engine, the HTTP server, and the HTTP client:
//!
//! - **Values**: [`Value`], [`ColumnType`] — typed metadata cells
//! - **Records**: [`Metadata`] — one data product of one instrument
//! - **Predicates**: [`Predicate`], [`CmpOp`] — conjunctive query filters
//!
//! All types are serializable with Serde. The JSON encoding is the PDSC
//! wire format: text, integer, and real values map to native JSON types,
//! while timestamps are encoded as tagged objects so they survive a
//! round trip:
//!
//! ```
//! use pdsc_types::Value;
//!
//! let ts = Value::parse_timestamp("2008-09-17T05:06:05.062000").unwrap();
//! let json = serde_json::to_string(&ts).unwrap();
//! assert_eq!(
//!     json,
//!     r#"{"kind":"datetime","value":"2008-09-17T05:06:05.062000"}"#
//! );
//! assert_eq!(serde_json::from_str::<Value>(&json).unwrap(), ts);
//! ```

pub mod predicate;
pub mod record;
pub mod value;

pub use predicate::{CmpOp, Predicate};
pub use record::Metadata;
pub use value::{ColumnType, Value, TIME_FORMAT};
