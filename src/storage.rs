//! Purchase history persistence and export.
//!
//! A [`HistoryStore`] is an opaque blob store keyed by user id. Appends are
//! read-modify-write and not atomic; the last writer wins.

use crate::error::{Result, TrackerError};
use crate::models::PurchaseRecord;
use csv::WriterBuilder;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait HistoryStore {
    /// All purchases for `user_id`, newest first. Unknown users have an empty history.
    fn get_history(&self, user_id: &str) -> Result<Vec<PurchaseRecord>>;

    /// Put `records` in front of the user's existing history.
    fn append_history(&self, user_id: &str, records: &[PurchaseRecord]) -> Result<()>;
}

/// One pretty-printed JSON file per user under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir
            .join(format!("history_{}.json", file_stem_for(user_id)))
    }
}

// Everything but ASCII alphanumerics, `_` and `-` is escaped, `%` included,
// so distinct ids never share a file.
const FILE_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-');

/// Map a user id to something safe to embed in a file name, one to one.
pub(crate) fn file_stem_for(user_id: &str) -> String {
    utf8_percent_encode(user_id, FILE_SAFE).to_string()
}

impl HistoryStore for JsonFileStore {
    fn get_history(&self, user_id: &str) -> Result<Vec<PurchaseRecord>> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let s = fs::read_to_string(&path)
            .map_err(|e| TrackerError::Storage(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&s)
            .map_err(|e| TrackerError::Storage(format!("parse {}: {e}", path.display())))
    }

    fn append_history(&self, user_id: &str, records: &[PurchaseRecord]) -> Result<()> {
        let mut all = records.to_vec();
        all.extend(self.get_history(user_id)?);
        fs::create_dir_all(&self.dir)
            .map_err(|e| TrackerError::Storage(format!("create {}: {e}", self.dir.display())))?;
        let path = self.path_for(user_id);
        save_json(&all, &path)
            .map_err(|e| TrackerError::Storage(format!("write {}: {e}", path.display())))?;
        log::debug!("appended {} record(s) to {}", records.len(), path.display());
        Ok(())
    }
}

/// In-process store, handy for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    histories: RefCell<HashMap<String, Vec<PurchaseRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing history for one user.
    pub fn with_history(user_id: &str, records: Vec<PurchaseRecord>) -> Self {
        let store = Self::default();
        store
            .histories
            .borrow_mut()
            .insert(user_id.to_string(), records);
        store
    }
}

impl HistoryStore for MemoryStore {
    fn get_history(&self, user_id: &str) -> Result<Vec<PurchaseRecord>> {
        Ok(self
            .histories
            .borrow()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    fn append_history(&self, user_id: &str, records: &[PurchaseRecord]) -> Result<()> {
        let mut map = self.histories.borrow_mut();
        let existing = map.entry(user_id.to_string()).or_default();
        let mut all = records.to_vec();
        all.append(existing);
        *existing = all;
        Ok(())
    }
}

/// Prefix cells that a spreadsheet would treat as a formula.
fn csv_safe(s: &str) -> String {
    match s.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{s}"),
        _ => s.to_string(),
    }
}

/// Save purchases as CSV with header.
pub fn save_csv<P: AsRef<Path>>(records: &[PurchaseRecord], path: P) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record(["id", "name", "price", "store", "date", "has_image"])?;
    for r in records {
        wtr.write_record([
            csv_safe(&r.id),
            csv_safe(&r.name),
            format!("{:.2}", r.price),
            csv_safe(&r.store),
            r.date.to_rfc3339(),
            r.image_url.is_some().to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save purchases as a pretty JSON array.
pub fn save_json<P: AsRef<Path>>(records: &[PurchaseRecord], path: P) -> Result<()> {
    let mut f = File::create(path)?;
    let s = serde_json::to_string_pretty(records)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}
