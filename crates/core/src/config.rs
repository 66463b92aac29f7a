//! Instrument configuration schema.
//!
//! Loading (YAML, JSON, files on disk) is the caller's concern; this
//! module only defines the deserializable shape consumed by ingest.

use crate::geom::{MARS_RADIUS_M, MOON_RADIUS_M};
use crate::localize::LocalizerOptions;
use pdsc_types::ColumnType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One column of the metadata schema: PDS cumulative-index field name,
/// PDSC field name, and column type. Serializes as a three-element
/// array, matching the configuration file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping(pub String, pub String, pub ColumnType);

impl ColumnMapping {
    pub fn pds_column(&self) -> &str {
        &self.0
    }

    pub fn field_name(&self) -> &str {
        &self.1
    }

    pub fn column_type(&self) -> ColumnType {
        self.2
    }
}

/// Segmentation parameters for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Maximum segment edge length in meters. A good heuristic is the
    /// average cross-track width of an observation, which yields roughly
    /// isosceles triangles.
    #[serde(default = "SegmentationConfig::default_resolution")]
    pub resolution: f64,
    /// Extra flags for the localizer constructor.
    #[serde(default, rename = "localizer_kwargs")]
    pub localizer_options: LocalizerOptions,
}

impl SegmentationConfig {
    const fn default_resolution() -> f64 {
        50_000.0
    }
}

impl Default for SegmentationConfig {
    fn default() -> SegmentationConfig {
        SegmentationConfig {
            resolution: Self::default_resolution(),
            localizer_options: LocalizerOptions::default(),
        }
    }
}

/// Per-instrument ingest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Ordered column mappings; order fixes the metadata table layout.
    pub columns: Vec<ColumnMapping>,
    /// Multiplicative factors applied to named fields at ingest, e.g.
    /// for unit conversion.
    #[serde(default)]
    pub scale_factors: HashMap<String, f64>,
    /// Fields to build secondary indexes on.
    #[serde(default)]
    pub index: Vec<String>,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

impl InstrumentConfig {
    /// The metadata schema as (field name, type) pairs in table order.
    pub fn schema(&self) -> Vec<(String, ColumnType)> {
        self.columns
            .iter()
            .map(|c| (c.field_name().to_string(), c.column_type()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.columns.is_empty() {
            return Err("no columns configured".to_string());
        }
        if self.segmentation.resolution <= 0.0 {
            return Err(format!(
                "segmentation resolution must be positive, got {}",
                self.segmentation.resolution
            ));
        }
        for idx in &self.index {
            if !self.columns.iter().any(|c| c.field_name() == idx) {
                return Err(format!("indexed field '{idx}' is not a configured column"));
            }
        }
        for field in self.scale_factors.keys() {
            if !self.columns.iter().any(|c| c.field_name() == field) {
                return Err(format!("scaled field '{field}' is not a configured column"));
            }
        }
        Ok(())
    }
}

/// The body radius pinned to an instrument at ingest time.
pub fn body_radius_for_instrument(instrument: &str) -> f64 {
    if instrument.starts_with("lroc") {
        MOON_RADIUS_M
    } else {
        MARS_RADIUS_M
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_config_json() {
        let json = r#"{
            "columns": [
                ["OBSERVATION_ID", "observation_id", "text"],
                ["LINES", "lines", "integer"],
                ["CORNER1_LATITUDE", "corner1_latitude", "real"],
                ["START_TIME", "start_time", "timestamp"]
            ],
            "scale_factors": {"corner1_latitude": 1.0},
            "index": ["observation_id"],
            "segmentation": {
                "resolution": 20000.0,
                "localizer_kwargs": {"nomap": true}
            }
        }"#;
        let config: InstrumentConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.columns.len(), 4);
        assert_eq!(config.columns[0].pds_column(), "OBSERVATION_ID");
        assert_eq!(config.columns[3].column_type(), ColumnType::Timestamp);
        assert_eq!(config.segmentation.resolution, 20000.0);
        assert!(config.segmentation.localizer_options.nomap);
    }

    #[test]
    fn defaults_are_filled_in() {
        let json = r#"{"columns": [["A", "a", "real"]]}"#;
        let config: InstrumentConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.segmentation.resolution, 50_000.0);
        assert!(config.index.is_empty());
        assert!(!config.segmentation.localizer_options.browse);
    }

    #[test]
    fn validation_catches_mismatches() {
        let json = r#"{"columns": [["A", "a", "real"]], "index": ["b"]}"#;
        let config: InstrumentConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn body_radius_pinning() {
        assert_eq!(body_radius_for_instrument("ctx"), MARS_RADIUS_M);
        assert_eq!(body_radius_for_instrument("hirise_rdr"), MARS_RADIUS_M);
        assert_eq!(body_radius_for_instrument("lroc_cdr"), MOON_RADIUS_M);
    }
}
