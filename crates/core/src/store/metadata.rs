//! Typed metadata relation, one row per data product.

use super::check_identifier;
use crate::{Error, Result};
use parking_lot::Mutex;
use pdsc_types::{ColumnType, Metadata, Predicate, Value, TIME_FORMAT};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Indexed store of metadata records for one instrument.
///
/// Created once during ingest with the column set from the instrument
/// configuration; opened read-only at query time. Predicate columns are
/// validated against the schema and predicate values are always bound as
/// SQL parameters, never interpolated.
#[derive(Debug)]
pub struct MetadataStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    instrument: String,
    columns: Vec<(String, ColumnType)>,
}

impl MetadataStore {
    /// Create a fresh store, replacing any existing file at `path`.
    pub fn create(
        path: &Path,
        instrument: &str,
        columns: &[(String, ColumnType)],
        indexed: &[String],
    ) -> Result<MetadataStore> {
        if columns.is_empty() {
            return Err(Error::config("metadata schema has no columns"));
        }
        for (name, _) in columns {
            check_identifier(name)?;
        }
        for name in indexed {
            check_identifier(name)?;
            if !columns.iter().any(|(c, _)| c == name) {
                return Err(Error::config(format!(
                    "indexed column '{name}' is not in the schema"
                )));
            }
        }
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let conn = Connection::open(path)?;
        let decl = columns
            .iter()
            .map(|(name, ty)| format!("{name} {}", ty.sql_decl()))
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute(&format!("CREATE TABLE metadata ({decl})"), [])?;
        for name in indexed {
            conn.execute(
                &format!("CREATE INDEX {name}_index ON metadata ({name})"),
                [],
            )?;
        }

        Ok(MetadataStore {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            instrument: instrument.to_string(),
            columns: columns.to_vec(),
        })
    }

    /// Open an existing store read-only. A missing table or an unknown
    /// declared column type marks the index as corrupt.
    pub fn open(path: &Path, instrument: &str) -> Result<MetadataStore> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let mut columns = Vec::new();
        {
            let mut stmt = conn.prepare("PRAGMA table_info(metadata)")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let name: String = row.get(1)?;
                let decl: String = row.get(2)?;
                let ty = ColumnType::from_sql_decl(&decl).ok_or_else(|| {
                    Error::corrupt(path, format!("column '{name}' has unknown type '{decl}'"))
                })?;
                columns.push((name, ty));
            }
        }
        if columns.is_empty() {
            return Err(Error::corrupt(path, "no metadata table"));
        }

        Ok(MetadataStore {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            instrument: instrument.to_string(),
            columns,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema as (name, type) pairs in table order.
    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(c, _)| c == name)
            .map(|(_, ty)| *ty)
    }

    /// Bulk-insert records in a single transaction (ingest only).
    /// Fields missing from a record are stored as NULL.
    pub fn insert(&self, records: &[Metadata]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let placeholders = (1..=self.columns.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt =
                tx.prepare(&format!("INSERT INTO metadata VALUES ({placeholders})"))?;
            for record in records {
                let params: Vec<rusqlite::types::Value> = self
                    .columns
                    .iter()
                    .map(|(name, _)| to_sql_value(record.get(name).unwrap_or(&Value::Null)))
                    .collect();
                stmt.execute(rusqlite::params_from_iter(params))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All records matching the conjunction of `predicates`, in ingest
    /// (rowid) order.
    pub fn query(&self, predicates: &[Predicate]) -> Result<Vec<Metadata>> {
        let mut sql = String::from("SELECT * FROM metadata");
        let mut params = Vec::with_capacity(predicates.len());
        for (i, pred) in predicates.iter().enumerate() {
            if self.column_type(pred.column()).is_none() {
                return Err(Error::bad_query(format!(
                    "unknown column '{}' for instrument '{}'",
                    pred.column(),
                    self.instrument
                )));
            }
            if pred.value().is_null() {
                return Err(Error::bad_query(format!(
                    "null value in predicate on '{}'",
                    pred.column()
                )));
            }
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("{} {} ?{}", pred.column(), pred.op().sql(), i + 1));
            params.push(to_sql_value(pred.value()));
        }
        sql.push_str(" ORDER BY rowid");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.record_from_row(row)?);
        }
        Ok(records)
    }

    /// All records for one observation id; empty when the id is unknown.
    pub fn query_by_observation_id(&self, observation_id: &str) -> Result<Vec<Metadata>> {
        if self.column_type("observation_id").is_none() {
            return Err(Error::bad_query(format!(
                "instrument '{}' has no observation_id column",
                self.instrument
            )));
        }
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM metadata WHERE observation_id = ?1 ORDER BY rowid")?;
        let mut rows = stmt.query([observation_id])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.record_from_row(row)?);
        }
        Ok(records)
    }

    fn record_from_row(&self, row: &rusqlite::Row<'_>) -> Result<Metadata> {
        let mut record = Metadata::new(self.instrument.clone());
        for (i, (name, ty)) in self.columns.iter().enumerate() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(v) => Value::Integer(v),
                ValueRef::Real(v) => Value::Real(v),
                ValueRef::Text(bytes) => {
                    let text = std::str::from_utf8(bytes).map_err(|_| {
                        Error::corrupt(&self.path, format!("non-UTF-8 text in column '{name}'"))
                    })?;
                    if *ty == ColumnType::Timestamp {
                        Value::parse_timestamp(text).ok_or_else(|| {
                            Error::corrupt(
                                &self.path,
                                format!("unparseable timestamp '{text}' in column '{name}'"),
                            )
                        })?
                    } else {
                        Value::Text(text.to_string())
                    }
                }
                ValueRef::Blob(_) => {
                    return Err(Error::corrupt(
                        &self.path,
                        format!("unexpected blob in column '{name}'"),
                    ));
                }
            };
            if !value.is_null() {
                record.fields.insert(name.clone(), value);
            }
        }
        Ok(record)
    }
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Real(r) => rusqlite::types::Value::Real(*r),
        Value::Timestamp(t) => rusqlite::types::Value::Text(t.format(TIME_FORMAT).to_string()),
        Value::Null => rusqlite::types::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdsc_types::CmpOp;

    fn schema() -> Vec<(String, ColumnType)> {
        vec![
            ("observation_id".to_string(), ColumnType::Text),
            ("product_id".to_string(), ColumnType::Text),
            ("lines".to_string(), ColumnType::Integer),
            ("corner1_latitude".to_string(), ColumnType::Real),
            ("start_time".to_string(), ColumnType::Timestamp),
        ]
    }

    fn record(id: &str, product: &str, lines: i64, lat: f64) -> Metadata {
        let mut m = Metadata::new("hirise_rdr");
        m.set("observation_id", id)
            .set("product_id", product)
            .set("lines", lines)
            .set("corner1_latitude", lat)
            .set(
                "start_time",
                Value::parse_timestamp("2008-09-17T05:06:05.062000").unwrap(),
            );
        m
    }

    fn sample_store(dir: &Path) -> MetadataStore {
        let path = dir.join("hirise_rdr_metadata.db");
        let store = MetadataStore::create(
            &path,
            "hirise_rdr",
            &schema(),
            &["observation_id".to_string()],
        )
        .unwrap();
        store
            .insert(&[
                record("PSP_005423_1780", "PSP_005423_1780_COLOR", 40000, -1.95),
                record("PSP_005423_1780", "PSP_005423_1780_RED", 40000, -1.95),
                record("ESP_018854_1755", "ESP_018854_1755_RED", 35000, -4.48),
                record("ESP_018920_1755", "ESP_018920_1755_RED", 36000, -4.52),
            ])
            .unwrap();
        store
    }

    #[test]
    fn query_by_observation_id_returns_all_products() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());

        let records = store.query_by_observation_id("PSP_005423_1780").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .any(|r| r.text("product_id") == Some("PSP_005423_1780_RED")));
        assert!(store.query_by_observation_id("NOPE").unwrap().is_empty());
    }

    #[test]
    fn predicates_combine_with_and() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());

        let records = store
            .query(&[
                Predicate::new("corner1_latitude", CmpOp::Gt, -4.5),
                Predicate::new("corner1_latitude", CmpOp::Lt, -1.0),
            ])
            .unwrap();
        assert_eq!(records.len(), 3);
        for r in &records {
            let lat = r.real("corner1_latitude").unwrap();
            assert!(lat > -4.5 && lat < -1.0);
        }
    }

    #[test]
    fn like_and_ne_operators() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());

        let red = store
            .query(&[Predicate::new("product_id", CmpOp::Like, "%RED%")])
            .unwrap();
        assert_eq!(red.len(), 3);

        let not_psp = store
            .query(&[Predicate::new("observation_id", CmpOp::Ne, "PSP_005423_1780")])
            .unwrap();
        assert_eq!(not_psp.len(), 2);
    }

    #[test]
    fn results_preserve_ingest_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        let all = store.query(&[]).unwrap();
        let products: Vec<&str> = all.iter().filter_map(|r| r.text("product_id")).collect();
        assert_eq!(
            products,
            [
                "PSP_005423_1780_COLOR",
                "PSP_005423_1780_RED",
                "ESP_018854_1755_RED",
                "ESP_018920_1755_RED"
            ]
        );
    }

    #[test]
    fn unknown_column_is_bad_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        let err = store
            .query(&[Predicate::new("no_such_column", CmpOp::Eq, 1.0)])
            .unwrap_err();
        assert_eq!(err.code(), "bad-query");
    }

    #[test]
    fn injection_in_values_is_inert() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());

        // A hostile value must bind as data, not alter the statement.
        let hostile = "x' OR '1'='1";
        let records = store
            .query(&[Predicate::new("observation_id", CmpOp::Eq, hostile)])
            .unwrap();
        assert!(records.is_empty());

        let hostile2 = "'; DROP TABLE metadata; --";
        let records = store
            .query(&[Predicate::new("product_id", CmpOp::Like, hostile2)])
            .unwrap();
        assert!(records.is_empty());
        // The table must still be intact afterwards.
        assert_eq!(store.query(&[]).unwrap().len(), 4);
    }

    #[test]
    fn timestamps_roundtrip_through_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        let records = store.query_by_observation_id("ESP_018854_1755").unwrap();
        let ts = records[0].timestamp("start_time").unwrap();
        assert_eq!(
            Value::Timestamp(ts),
            Value::parse_timestamp("2008-09-17T05:06:05.062000").unwrap()
        );

        // Timestamp predicates compare correctly in stored text order.
        let later = store
            .query(&[Predicate::new(
                "start_time",
                CmpOp::Gt,
                Value::parse_timestamp("2009-01-01T00:00:00").unwrap(),
            )])
            .unwrap();
        assert!(later.is_empty());
    }

    #[test]
    fn reopen_reads_schema_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let store = sample_store(dir.path());
            store.path().to_path_buf()
        };
        let store = MetadataStore::open(&path, "hirise_rdr").unwrap();
        let mut names: Vec<&str> = store.columns().iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "corner1_latitude",
                "lines",
                "observation_id",
                "product_id",
                "start_time"
            ]
        );
        assert_eq!(store.columns().len(), 5);
        assert_eq!(
            store
                .columns()
                .iter()
                .find(|(n, _)| n == "start_time")
                .unwrap()
                .1,
            ColumnType::Timestamp
        );
        assert_eq!(store.query(&[]).unwrap().len(), 4);
    }

    #[test]
    fn open_missing_table_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        // A valid SQLite file with no metadata table.
        let conn = Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE unrelated (x integer)", []).unwrap();
        drop(conn);
        let err = MetadataStore::open(&path, "ctx").unwrap_err();
        assert_eq!(err.code(), "index-corrupt");
    }
}
