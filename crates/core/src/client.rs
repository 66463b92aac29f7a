//! Local query client over an ingested index directory.

use crate::cancel::CancelToken;
use crate::ingest::{METADATA_DB_SUFFIX, SEGMENT_DB_SUFFIX, SEGMENT_TREE_SUFFIX};
use crate::segment::PointQuery;
use crate::store::{MetadataStore, SegmentStore};
use crate::tree::SegmentTree;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use pdsc_types::{ColumnType, Metadata, Predicate};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming the ingested index directory.
pub const DATABASE_DIRECTORY_VAR: &str = "PDSC_DATABASE_DIR";

/// Number of instrument handles kept open by default.
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Open artifacts of one instrument. Metadata is always present; the
/// spatial pieces exist only for instruments ingested with segments.
#[derive(Debug)]
struct InstrumentHandle {
    metadata: MetadataStore,
    segments: Option<SegmentStore>,
    tree: Option<SegmentTree>,
}

impl InstrumentHandle {
    fn spatial(&self, instrument: &str) -> Result<(&SegmentStore, &SegmentTree)> {
        match (&self.segments, &self.tree) {
            (Some(segments), Some(tree)) => Ok((segments, tree)),
            _ => Err(Error::UnknownInstrument {
                instrument: instrument.to_string(),
            }),
        }
    }
}

/// Query client over a local PDSC index directory.
///
/// Instruments are discovered from the `*_metadata.db` filename
/// convention. Per-instrument handles are opened lazily and cached with
/// LRU eviction beyond [`DEFAULT_CACHE_CAPACITY`] (configurable via
/// [`PdsClient::with_cache_capacity`]); the cache is safe to share
/// across threads, and every handle is read-only.
#[derive(Debug)]
pub struct PdsClient {
    directory: PathBuf,
    instruments: Vec<String>,
    handles: RwLock<HashMap<String, Arc<InstrumentHandle>>>,
    lru: Mutex<VecDeque<String>>,
    cache_capacity: usize,
}

impl PdsClient {
    /// Open the index at `directory`, or at `PDSC_DATABASE_DIR` when no
    /// directory is given.
    pub fn new(directory: Option<&Path>) -> Result<PdsClient> {
        let directory = match directory {
            Some(d) => d.to_path_buf(),
            None => std::env::var_os(DATABASE_DIRECTORY_VAR)
                .map(PathBuf::from)
                .ok_or_else(|| {
                    Error::config(format!(
                        "must specify database directory or set {DATABASE_DIRECTORY_VAR}"
                    ))
                })?,
        };
        if !directory.is_dir() {
            return Err(Error::config(format!(
                "database directory {} does not exist",
                directory.display()
            )));
        }

        let mut instruments = Vec::new();
        for entry in std::fs::read_dir(&directory)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(instrument) = name.strip_suffix(METADATA_DB_SUFFIX) {
                    instruments.push(instrument.to_string());
                }
            }
        }
        instruments.sort_unstable();

        Ok(PdsClient {
            directory,
            instruments,
            handles: RwLock::new(HashMap::new()),
            lru: Mutex::new(VecDeque::new()),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        })
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> PdsClient {
        self.cache_capacity = capacity.max(1);
        self
    }

    /// Instruments available in this index directory, sorted.
    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    fn touch(&self, instrument: &str) {
        let mut lru = self.lru.lock();
        if let Some(pos) = lru.iter().position(|i| i == instrument) {
            lru.remove(pos);
        }
        lru.push_back(instrument.to_string());
    }

    fn handle(&self, instrument: &str) -> Result<Arc<InstrumentHandle>> {
        if !self.instruments.iter().any(|i| i == instrument) {
            return Err(Error::UnknownInstrument {
                instrument: instrument.to_string(),
            });
        }

        if let Some(handle) = self.handles.read().get(instrument) {
            let handle = Arc::clone(handle);
            self.touch(instrument);
            return Ok(handle);
        }

        let mut handles = self.handles.write();
        // Raced with another loader between the read and write locks.
        if let Some(handle) = handles.get(instrument) {
            let handle = Arc::clone(handle);
            self.touch(instrument);
            return Ok(handle);
        }

        let metadata_path = self
            .directory
            .join(format!("{instrument}{METADATA_DB_SUFFIX}"));
        let metadata = MetadataStore::open(&metadata_path, instrument)?;

        let segment_path = self
            .directory
            .join(format!("{instrument}{SEGMENT_DB_SUFFIX}"));
        let tree_path = self
            .directory
            .join(format!("{instrument}{SEGMENT_TREE_SUFFIX}"));
        let (segments, tree) = if segment_path.is_file() && tree_path.is_file() {
            let tree = SegmentTree::load(&tree_path)?;
            let segments = SegmentStore::open(&segment_path, tree.body_radius_m())?;
            (Some(segments), Some(tree))
        } else {
            (None, None)
        };

        let handle = Arc::new(InstrumentHandle {
            metadata,
            segments,
            tree,
        });
        handles.insert(instrument.to_string(), Arc::clone(&handle));
        self.touch(instrument);

        // Evict least-recently-used handles beyond the cap.
        let mut lru = self.lru.lock();
        while handles.len() > self.cache_capacity {
            match lru.pop_front() {
                Some(old) => {
                    handles.remove(&old);
                }
                None => break,
            }
        }

        Ok(handle)
    }

    /// Column names and types of one instrument's metadata table.
    pub fn columns(&self, instrument: &str) -> Result<Vec<(String, ColumnType)>> {
        Ok(self.handle(instrument)?.metadata.columns().to_vec())
    }

    /// Metadata records matching the conjunction of `predicates`.
    pub fn query(&self, instrument: &str, predicates: &[Predicate]) -> Result<Vec<Metadata>> {
        self.handle(instrument)?.metadata.query(predicates)
    }

    /// All metadata records for one observation id. Instruments with
    /// several data products per observation return several records;
    /// an unknown id returns an empty list.
    pub fn query_by_observation_id(
        &self,
        instrument: &str,
        observation_id: &str,
    ) -> Result<Vec<Metadata>> {
        self.handle(instrument)?
            .metadata
            .query_by_observation_id(observation_id)
    }

    /// Observations whose footprint contains, or lies within `radius_m`
    /// of, the given location.
    pub fn find_observations_of_latlon(
        &self,
        instrument: &str,
        lat: f64,
        lon: f64,
        radius_m: f64,
    ) -> Result<Vec<String>> {
        self.find_observations_of_latlon_cancel(
            instrument,
            lat,
            lon,
            radius_m,
            &CancelToken::never(),
        )
    }

    /// Cancellable variant of [`PdsClient::find_observations_of_latlon`].
    pub fn find_observations_of_latlon_cancel(
        &self,
        instrument: &str,
        lat: f64,
        lon: f64,
        radius_m: f64,
        cancel: &CancelToken,
    ) -> Result<Vec<String>> {
        let handle = self.handle(instrument)?;
        let (segments, tree) = handle.spatial(instrument)?;

        let query = PointQuery::new(lat, lon, radius_m)?;
        let candidates = tree.query_point(&query, cancel)?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut found = Vec::new();
        for segment_id in candidates {
            cancel.check()?;
            let (observation_id, segment) = segments.segment_by_id(segment_id)?;
            if seen.contains(&observation_id) {
                continue;
            }
            if segment.includes_point(&query) {
                seen.insert(observation_id.clone());
                found.push(observation_id);
            }
        }
        Ok(found)
    }

    /// Observations of `other_instrument` whose footprint intersects the
    /// footprint of `observation_id` from `instrument`.
    pub fn find_overlapping_observations(
        &self,
        instrument: &str,
        observation_id: &str,
        other_instrument: &str,
    ) -> Result<Vec<String>> {
        self.find_overlapping_observations_cancel(
            instrument,
            observation_id,
            other_instrument,
            &CancelToken::never(),
        )
    }

    /// Cancellable variant of
    /// [`PdsClient::find_overlapping_observations`].
    pub fn find_overlapping_observations_cancel(
        &self,
        instrument: &str,
        observation_id: &str,
        other_instrument: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<String>> {
        let handle_a = self.handle(instrument)?;
        let (segments_a, _) = handle_a.spatial(instrument)?;
        let handle_b = self.handle(other_instrument)?;
        let (segments_b, tree_b) = handle_b.spatial(other_instrument)?;

        let own_segments = segments_a.segments_for_observation(observation_id)?;
        if own_segments.is_empty() {
            return Err(Error::UnknownObservation {
                instrument: instrument.to_string(),
                observation_id: observation_id.to_string(),
            });
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut found = Vec::new();
        for segment in &own_segments {
            let candidates = tree_b.query_segment(segment, cancel)?;
            for segment_id in candidates {
                cancel.check()?;
                let (other_id, other_segment) = segments_b.segment_by_id(segment_id)?;
                if seen.contains(&other_id) {
                    continue;
                }
                if segment.overlaps_segment(&other_segment) {
                    seen.insert(other_id.clone());
                    found.push(other_id);
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_config_error() {
        let err = PdsClient::new(Some(Path::new("/nonexistent/pdsc"))).unwrap_err();
        assert_eq!(err.code(), "config");
    }

    #[test]
    fn empty_directory_has_no_instruments() {
        let dir = tempfile::tempdir().unwrap();
        let client = PdsClient::new(Some(dir.path())).unwrap();
        assert!(client.instruments().is_empty());
        let err = client.query("ctx", &[]).unwrap_err();
        assert_eq!(err.code(), "unknown-instrument");
    }
}
