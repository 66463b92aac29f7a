//! Query predicates over metadata columns.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator in a metadata predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CmpOp {
    /// SQL spelling of the operator.
    pub fn sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Like => "LIKE",
        }
    }

    /// Parse an operator from its surface spelling. `LIKE` is
    /// case-insensitive.
    pub fn parse(s: &str) -> Option<CmpOp> {
        match s {
            "=" | "==" => Some(CmpOp::Eq),
            "!=" | "<>" => Some(CmpOp::Ne),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::Le),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::Ge),
            _ if s.eq_ignore_ascii_case("like") => Some(CmpOp::Like),
            _ => None,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

impl Serialize for CmpOp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.sql())
    }
}

impl<'de> Deserialize<'de> for CmpOp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<CmpOp, D::Error> {
        let s = String::deserialize(deserializer)?;
        CmpOp::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid comparator '{s}'")))
    }
}

/// One `(column, operator, value)` constraint. Predicates in a query
/// combine with AND.
///
/// Serializes as a three-element array matching the HTTP protocol:
/// `["corner1_latitude", ">", -0.5]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate(pub String, pub CmpOp, pub Value);

impl Predicate {
    pub fn new(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Predicate {
        Predicate(column.into(), op, value.into())
    }

    pub fn column(&self) -> &str {
        &self.0
    }

    pub fn op(&self) -> CmpOp {
        self.1
    }

    pub fn value(&self) -> &Value {
        &self.2
    }
}
