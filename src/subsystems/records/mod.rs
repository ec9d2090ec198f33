//! Records subsystem: optional create-only history of analyses.
//!
//! Layout under `work_dir`:
//!
//! ```text
//! records.db              SQLite, one row per successful analysis
//! xray_images/            uploaded originals
//! segmented_images/       generated PNG overlays
//! ```
//!
//! Paths stored in the database are relative to `work_dir`. Rows are never
//! updated or deleted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use crate::error::AppError;

// ── Schema ────────────────────────────────────────────────────────────────────

const DB_FILENAME: &str = "records.db";
const IMAGES_DIR: &str = "xray_images";
const SEGMENTED_DIR: &str = "segmented_images";

/// Stored in `PRAGMA user_version`. Increment when the DDL changes.
const SCHEMA_VERSION: i64 = 1;

fn init_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS analysis_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_path TEXT NOT NULL,
            segmented_image_path TEXT,
            predicted_class TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_analysis_records_created
            ON analysis_records (created_at);

        PRAGMA user_version = {SCHEMA_VERSION};
        "
    ))
    .map_err(|e| AppError::Records(format!("initialize schema: {e}")))
}

/// Open a connection with WAL, foreign keys and a 5 s busy timeout.
fn open_conn(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Records(format!("open {}: {e}", db_path.display())))?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| AppError::Records(format!("set journal_mode WAL: {e}")))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| AppError::Records(format!("set foreign_keys ON: {e}")))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(|e| AppError::Records(format!("set busy_timeout: {e}")))?;

    Ok(conn)
}

/// Current UTC time, RFC 3339 with millisecond precision.
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// One stored analysis.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub image_path: String,
    pub segmented_image_path: Option<String>,
    pub predicted_class: String,
    pub created_at: String,
}

/// Input to [`RecordStore::insert`].
#[derive(Debug, Clone, Copy)]
pub struct NewRecord<'a> {
    pub image: &'a [u8],
    /// Client-side file name; only its extension is kept.
    pub file_name: Option<&'a str>,
    pub segmented_png: Option<&'a [u8]>,
    pub predicted_class: &'a str,
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
    db_path: PathBuf,
}

impl RecordStore {
    /// Open (or create) the store under `work_dir`. Safe to call repeatedly.
    pub fn open(work_dir: &Path) -> Result<Self, AppError> {
        for sub in [IMAGES_DIR, SEGMENTED_DIR] {
            let dir = work_dir.join(sub);
            fs::create_dir_all(&dir).map_err(|e| {
                AppError::Records(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let store = Self { root: work_dir.to_path_buf(), db_path: work_dir.join(DB_FILENAME) };
        store.init_db()?;
        Ok(store)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    /// Write both image files, then insert the row.
    pub fn insert(&self, record: NewRecord<'_>) -> Result<AnalysisRecord, AppError> {
        let stem = uuid::Uuid::now_v7().to_string();

        let image_rel = format!("{IMAGES_DIR}/{stem}.{}", extension_of(record.file_name));
        self.write_file(&image_rel, record.image)?;

        let segmented_rel = match record.segmented_png {
            Some(png) => {
                let rel = format!("{SEGMENTED_DIR}/segmented_{stem}.png");
                if let Err(e) = self.write_file(&rel, png) {
                    self.remove_quietly(&image_rel);
                    return Err(e);
                }
                Some(rel)
            }
            None => None,
        };

        let created_at = now_rfc3339();
        let inserted = open_conn(&self.db_path).and_then(|conn| {
            conn.execute(
                "INSERT INTO analysis_records (image_path, segmented_image_path, predicted_class, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![image_rel, segmented_rel, record.predicted_class, created_at],
            )
            .map_err(|e| AppError::Records(format!("insert record: {e}")))?;
            Ok(conn.last_insert_rowid())
        });

        let id = match inserted {
            Ok(id) => id,
            Err(e) => {
                self.remove_quietly(&image_rel);
                if let Some(rel) = &segmented_rel {
                    self.remove_quietly(rel);
                }
                return Err(e);
            }
        };

        debug!(id, predicted_class = record.predicted_class, "stored analysis record");
        Ok(AnalysisRecord {
            id,
            image_path: image_rel,
            segmented_image_path: segmented_rel,
            predicted_class: record.predicted_class.to_string(),
            created_at,
        })
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AnalysisRecord>, AppError> {
        let conn = open_conn(&self.db_path)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, image_path, segmented_image_path, predicted_class, created_at \
                 FROM analysis_records ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .map_err(|e| AppError::Records(format!("prepare recent: {e}")))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(AnalysisRecord {
                    id: row.get(0)?,
                    image_path: row.get(1)?,
                    segmented_image_path: row.get(2)?,
                    predicted_class: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .map_err(|e| AppError::Records(format!("query recent: {e}")))?;

        let records = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Records(format!("read record row: {e}")))?;
        Ok(records)
    }

    /// Absolute path of a stored file given its relative record path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// - `user_version == 0`: fresh DB, run DDL.
    /// - `user_version == SCHEMA_VERSION`: already initialised, skip.
    /// - Anything else: unsupported version.
    fn init_db(&self) -> Result<(), AppError> {
        let conn = open_conn(&self.db_path)?;
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .map_err(|e| AppError::Records(format!("read schema version: {e}")))?;

        if version == 0 {
            return init_schema(&conn);
        }
        if version != SCHEMA_VERSION {
            return Err(AppError::Records(format!(
                "unsupported schema version {version}, expected {SCHEMA_VERSION}"
            )));
        }
        Ok(())
    }

    fn write_file(&self, relative: &str, bytes: &[u8]) -> Result<(), AppError> {
        let path = self.resolve(relative);
        fs::write(&path, bytes)
            .map_err(|e| AppError::Records(format!("write {}: {e}", path.display())))
    }

    fn remove_quietly(&self, relative: &str) {
        let path = self.resolve(relative);
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to clean up record file");
        }
    }
}

/// Lower-cased extension of the client file name, or `bin` when it is
/// missing or not a short alphanumeric token.
fn extension_of(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, RecordStore) {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    fn new_record<'a>(class: &'a str) -> NewRecord<'a> {
        NewRecord {
            image: b"fake-jpeg",
            file_name: Some("chest.JPG"),
            segmented_png: Some(&b"fake-png"[..]),
            predicted_class: class,
        }
    }

    #[test]
    fn open_creates_layout_and_is_idempotent() {
        let (tmp, _store) = make_store();
        assert!(tmp.path().join(IMAGES_DIR).is_dir());
        assert!(tmp.path().join(SEGMENTED_DIR).is_dir());
        assert!(tmp.path().join(DB_FILENAME).is_file());
        RecordStore::open(tmp.path()).unwrap();
    }

    #[test]
    fn insert_writes_files_and_row() {
        let (_tmp, store) = make_store();
        let rec = store.insert(new_record("Effusion")).unwrap();

        assert!(rec.id > 0);
        assert!(rec.image_path.starts_with("xray_images/"));
        assert!(rec.image_path.ends_with(".jpg"));
        let seg = rec.segmented_image_path.clone().unwrap();
        assert!(seg.starts_with("segmented_images/segmented_"));
        assert_eq!(fs::read(store.resolve(&rec.image_path)).unwrap(), b"fake-jpeg");
        assert_eq!(fs::read(store.resolve(&seg)).unwrap(), b"fake-png");

        let recent = store.recent(10).unwrap();
        assert_eq!(recent, vec![rec]);
    }

    #[test]
    fn ids_autoincrement() {
        let (_tmp, store) = make_store();
        let a = store.insert(new_record("Mass")).unwrap();
        let b = store.insert(new_record("Nodule")).unwrap();
        assert_eq!(b.id, a.id + 1);
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let (_tmp, store) = make_store();
        for class in ["Edema", "Hernia", "Normal"] {
            store.insert(new_record(class)).unwrap();
        }
        let recent = store.recent(2).unwrap();
        let classes: Vec<_> = recent.iter().map(|r| r.predicted_class.as_str()).collect();
        assert_eq!(classes, vec!["Normal", "Hernia"]);
    }

    #[test]
    fn segmented_image_is_optional() {
        let (_tmp, store) = make_store();
        let mut rec = new_record("Normal");
        rec.segmented_png = None;
        let stored = store.insert(rec).unwrap();
        assert!(stored.segmented_image_path.is_none());
        assert!(store.recent(1).unwrap()[0].segmented_image_path.is_none());
    }

    #[test]
    fn records_survive_reopen() {
        let (tmp, store) = make_store();
        store.insert(new_record("Fibrosis")).unwrap();
        let reopened = RecordStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.recent(5).unwrap().len(), 1);
    }

    #[test]
    fn fresh_db_is_stamped_with_schema_version() {
        let (tmp, _store) = make_store();
        let conn = Connection::open(tmp.path().join(DB_FILENAME)).unwrap();
        let version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn unsupported_schema_version_is_rejected() {
        let (tmp, _store) = make_store();
        let conn = Connection::open(tmp.path().join(DB_FILENAME)).unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
        drop(conn);
        let err = RecordStore::open(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version 99"));
    }

    #[test]
    fn extension_sanitised() {
        assert_eq!(extension_of(Some("a.PNG")), "png");
        assert_eq!(extension_of(Some("noext")), "bin");
        assert_eq!(extension_of(Some("x.we!rd")), "bin");
        assert_eq!(extension_of(None), "bin");
    }
}
