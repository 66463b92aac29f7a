//! Persistent relation of footprint segments.

use crate::segment::TriSegment;
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// One row of the segment relation, as written during ingest.
#[derive(Debug, Clone)]
pub struct SegmentRow {
    pub segment_id: u64,
    pub observation_id: String,
    /// Vertex (latitude, longitude) pairs in counter-clockwise order.
    pub latlon_points: [[f64; 2]; 3],
}

/// Per-instrument store of footprint segments keyed by segment id.
///
/// Only vertices are persisted; centers and radii are recomputed on
/// load so the relation carries no redundant state.
#[derive(Debug)]
pub struct SegmentStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    body_radius_m: f64,
}

impl SegmentStore {
    /// Create a fresh store, replacing any existing file at `path`.
    pub fn create(path: &Path, body_radius_m: f64) -> Result<SegmentStore> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE segments (
                segment_id integer PRIMARY KEY,
                observation_id text,
                latitude0 real, longitude0 real,
                latitude1 real, longitude1 real,
                latitude2 real, longitude2 real
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX observation_index ON segments (observation_id)",
            [],
        )?;
        Ok(SegmentStore {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            body_radius_m,
        })
    }

    /// Open an existing store read-only. The body radius comes from the
    /// sibling segment-tree header.
    pub fn open(path: &Path, body_radius_m: f64) -> Result<SegmentStore> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let table: i64 = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'segments'",
            [],
            |row| row.get(0),
        )?;
        if table == 0 {
            return Err(Error::corrupt(path, "no segments table"));
        }
        Ok(SegmentStore {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            body_radius_m,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn body_radius_m(&self) -> f64 {
        self.body_radius_m
    }

    /// Bulk-insert rows in a single transaction (ingest only).
    pub fn insert(&self, rows: &[SegmentRow]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO segments VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for row in rows {
                let p = &row.latlon_points;
                stmt.execute(rusqlite::params![
                    row.segment_id as i64,
                    row.observation_id,
                    p[0][0],
                    p[0][1],
                    p[1][0],
                    p[1][1],
                    p[2][0],
                    p[2][1],
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn segment_from_row(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<(u64, String, TriSegment)> {
        let id: i64 = row.get(0)?;
        let observation_id: String = row.get(1)?;
        let seg = TriSegment::new(
            [row.get(2)?, row.get(3)?],
            [row.get(4)?, row.get(5)?],
            [row.get(6)?, row.get(7)?],
            self.body_radius_m,
        );
        Ok((id as u64, observation_id, seg))
    }

    /// All segments of one observation, in segment-id order. The empty
    /// result distinguishes unknown observations at the caller.
    pub fn segments_for_observation(&self, observation_id: &str) -> Result<Vec<TriSegment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM segments WHERE observation_id = ?1 ORDER BY segment_id",
        )?;
        let mut rows = stmt.query([observation_id])?;
        let mut segments = Vec::new();
        while let Some(row) = rows.next()? {
            segments.push(self.segment_from_row(row)?.2);
        }
        Ok(segments)
    }

    /// The segment with the given id plus its owning observation.
    ///
    /// Ids handed out by the ball tree must exist here; a miss means the
    /// two artifacts are out of sync.
    pub fn segment_by_id(&self, segment_id: u64) -> Result<(String, TriSegment)> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM segments WHERE segment_id = ?1")?;
        let mut rows = stmt.query([segment_id as i64])?;
        match rows.next()? {
            Some(row) => {
                let (_, observation_id, seg) = self.segment_from_row(row)?;
                Ok((observation_id, seg))
            }
            None => Err(Error::corrupt(
                &self.path,
                format!("segment {segment_id} referenced by the tree is missing"),
            )),
        }
    }

    /// Every stored segment, in id order. Used at tree-build time.
    pub fn all_segments(&self) -> Result<Vec<(u64, String, TriSegment)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM segments ORDER BY segment_id")?;
        let mut rows = stmt.query([])?;
        let mut segments = Vec::new();
        while let Some(row) = rows.next()? {
            segments.push(self.segment_from_row(row)?);
        }
        Ok(segments)
    }

    pub fn len(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT count(*) FROM segments", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
