//! Ingest pipeline: metadata records in, immutable index artifacts out.
//!
//! Parsing of PDS cumulative index files happens upstream; ingest
//! consumes already-mapped [`Metadata`] records plus the instrument
//! configuration and produces the three per-instrument artifacts:
//! metadata database, segment database, and serialized segment tree.

use crate::config::{body_radius_for_instrument, InstrumentConfig};
use crate::localize::get_localizer;
use crate::segment::{TriSegment, TriSegmentedFootprint};
use crate::store::{MetadataStore, SegmentRow, SegmentStore};
use crate::tree::SegmentTree;
use crate::{Error, Result};
use pdsc_types::{Metadata, Value};
use std::path::Path;

/// Filename suffix of per-instrument metadata databases.
pub const METADATA_DB_SUFFIX: &str = "_metadata.db";

/// Filename suffix of per-instrument segment databases.
pub const SEGMENT_DB_SUFFIX: &str = "_segments.db";

/// Filename suffix of per-instrument serialized segment trees.
pub const SEGMENT_TREE_SUFFIX: &str = "_segments.tree";

/// Counts reported by a completed ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub records: usize,
    pub observations_indexed: usize,
    pub segments: usize,
}

/// Store metadata records into `path`, applying configured scale
/// factors. Returns the records as stored.
pub fn store_metadata(
    path: &Path,
    instrument: &str,
    records: &[Metadata],
    config: &InstrumentConfig,
) -> Result<Vec<Metadata>> {
    config.validate().map_err(Error::config)?;

    let scaled: Vec<Metadata> = records
        .iter()
        .map(|record| {
            let mut r = record.clone();
            for (field, factor) in &config.scale_factors {
                if let Some(v) = r.real(field) {
                    r.set(field.clone(), Value::Real(v * factor));
                }
            }
            r
        })
        .collect();

    let store = MetadataStore::create(path, instrument, &config.schema(), &config.index)?;
    store.insert(&scaled)?;
    log::info!(
        "stored {} {} metadata records to {}",
        scaled.len(),
        instrument,
        path.display()
    );
    Ok(scaled)
}

/// Segments stored for one instrument, with the count of observations
/// that contributed at least one valid segment.
pub struct StoredSegments {
    pub segments: Vec<(u64, TriSegment)>,
    pub observations: usize,
}

/// Segment every observation and store the rows into `path`. Returns
/// the stored segments for tree building.
///
/// Observations whose localizer cannot be constructed, or that yield no
/// valid segment, are logged and skipped; ingest continues.
pub fn store_segments(
    path: &Path,
    records: &[Metadata],
    config: &InstrumentConfig,
    body_radius_m: f64,
) -> Result<StoredSegments> {
    let resolution = config.segmentation.resolution;
    let options = &config.segmentation.localizer_options;

    let mut rows = Vec::new();
    let mut segments = Vec::new();
    let mut observations = 0usize;
    let mut next_id: u64 = 0;

    for record in records {
        let Some(observation_id) = record.observation_id().map(str::to_string) else {
            log::warn!("skipping record without observation_id field");
            continue;
        };

        let localizer = match get_localizer(record, options) {
            Ok(l) => l,
            Err(e) => {
                log::warn!("skipping {observation_id}: {e}");
                continue;
            }
        };

        let footprint = TriSegmentedFootprint::new(localizer.as_ref(), resolution, body_radius_m);
        let total = footprint.segments.len();
        let valid: Vec<TriSegment> = footprint
            .segments
            .into_iter()
            .filter(|s| !s.is_degenerate())
            .collect();
        if valid.len() < total {
            log::warn!(
                "{observation_id}: dropped {} degenerate segments",
                total - valid.len()
            );
        }
        if valid.is_empty() {
            let err = Error::DegenerateSegment {
                observation_id: observation_id.clone(),
            };
            log::warn!("skipping observation: {err}");
            continue;
        }

        observations += 1;
        for seg in valid {
            rows.push(SegmentRow {
                segment_id: next_id,
                observation_id: observation_id.clone(),
                latlon_points: *seg.latlon_points(),
            });
            segments.push((next_id, seg));
            next_id += 1;
        }
    }

    let store = SegmentStore::create(path, body_radius_m)?;
    store.insert(&rows)?;
    log::info!("stored {} segments to {}", rows.len(), path.display());
    Ok(StoredSegments {
        segments,
        observations,
    })
}

/// Build and save the segment tree for the stored segments.
pub fn store_segment_tree(
    path: &Path,
    segments: &[(u64, TriSegment)],
    body_radius_m: f64,
) -> Result<()> {
    let tree = SegmentTree::build(
        segments.iter().map(|(id, seg)| (*id, seg)),
        body_radius_m,
    );
    tree.save(path)?;
    log::info!(
        "saved segment tree over {} centers to {}",
        tree.len(),
        path.display()
    );
    Ok(())
}

/// Ingest one instrument's records into `output_dir`, producing all
/// three index artifacts.
pub fn ingest_index(
    instrument: &str,
    records: &[Metadata],
    config: &InstrumentConfig,
    output_dir: &Path,
) -> Result<IngestSummary> {
    let body_radius_m = body_radius_for_instrument(instrument);

    let metadata_path = output_dir.join(format!("{instrument}{METADATA_DB_SUFFIX}"));
    let stored = store_metadata(&metadata_path, instrument, records, config)?;

    let segment_path = output_dir.join(format!("{instrument}{SEGMENT_DB_SUFFIX}"));
    let stored_segments = store_segments(&segment_path, &stored, config, body_radius_m)?;

    let tree_path = output_dir.join(format!("{instrument}{SEGMENT_TREE_SUFFIX}"));
    store_segment_tree(&tree_path, &stored_segments.segments, body_radius_m)?;

    Ok(IngestSummary {
        records: stored.len(),
        observations_indexed: stored_segments.observations,
        segments: stored_segments.segments.len(),
    })
}
