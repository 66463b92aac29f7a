//! Metadata records: one data product of one instrument.

use crate::value::Value;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A flat, typed metadata record keyed on `(instrument, observation_id)`.
///
/// The field set is instrument-specific but fixed per instrument after
/// ingest. Some instruments produce multiple records per observation id
/// (e.g. HiRISE RDR color and red products), so the id alone is not a
/// primary key.
///
/// Serializes to a JSON object with an `instrument` discriminator:
///
/// ```
/// use pdsc_types::{Metadata, Value};
///
/// let mut m = Metadata::new("hirise_rdr");
/// m.set("observation_id", "PSP_005423_1780");
/// m.set("corner1_latitude", -1.9);
/// let json = serde_json::to_value(&m).unwrap();
/// assert_eq!(json["instrument"], "hirise_rdr");
/// assert_eq!(json["corner1_latitude"], -1.9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub instrument: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new(instrument: impl Into<String>) -> Metadata {
        Metadata {
            instrument: instrument.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Metadata {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_integer)
    }

    pub fn real(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_real)
    }

    pub fn timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        self.get(name).and_then(Value::as_timestamp)
    }

    /// The observation id, when the record carries one.
    pub fn observation_id(&self) -> Option<&str> {
        self.text("observation_id")
    }
}
