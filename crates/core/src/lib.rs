//! Spatial index and query engine for planetary remote-sensing
//! observations.
//!
//! PDSC ingests observation metadata from PDS cumulative indexes and
//! answers three families of queries:
//!
//! - **Metadata**: lookup by observation id or by typed predicates
//! - **Point**: observations whose footprint contains, or lies within a
//!   radius of, a surface location
//! - **Overlap**: observations (possibly from another instrument) whose
//!   footprint intersects that of a reference observation
//!
//! Footprints are decomposed into convex spherical triangles
//! ([`TriSegment`]) stored in a per-instrument relation and indexed by a
//! ball tree ([`SegmentTree`]) over segment centers. Queries run in two
//! phases: a tree radius search widened by the instrument's maximum
//! segment radius (a guaranteed superset), then an exact geometric test
//! per candidate.
//!
//! ## Example
//!
//! ```no_run
//! use pdsc::PdsClient;
//!
//! let client = PdsClient::new(None)?; // uses PDSC_DATABASE_DIR
//! let ids = client.find_observations_of_latlon("hirise_rdr", -4.5, 137.4, 0.0)?;
//! for id in ids {
//!     for record in client.query_by_observation_id("hirise_rdr", &id)? {
//!         println!("{:?}", record.text("product_id"));
//!     }
//! }
//! # Ok::<(), pdsc::Error>(())
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod geom;
pub mod ingest;
pub mod localize;
pub mod segment;
pub mod store;
pub mod tree;

pub use cancel::CancelToken;
pub use client::{PdsClient, DATABASE_DIRECTORY_VAR};
pub use config::InstrumentConfig;
pub use error::{Error, Result};
pub use ingest::{
    ingest_index, IngestSummary, METADATA_DB_SUFFIX, SEGMENT_DB_SUFFIX, SEGMENT_TREE_SUFFIX,
};
pub use localize::{get_localizer, Localizer, LocalizerOptions, Registry};
pub use segment::{PointQuery, TriSegment, TriSegmentedFootprint};
pub use store::{MetadataStore, SegmentStore};
pub use tree::SegmentTree;

pub use pdsc_types::{CmpOp, ColumnType, Metadata, Predicate, Value};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
