use std::path::PathBuf;

use stride_api::{CursorAdvance, Record};

// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

pub(crate) const RECORDS_FILE: &str = "records.jsonl";
pub(crate) const CURSORS_FILE: &str = "cursors.jsonl";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct FileStoreConfig {
    /// Root directory; each database gets its own subdirectory.
    pub data_dir: PathBuf,
    #[serde(default = "default_database")]
    pub database: String,
    /// `sync_data` after every journal append.
    #[serde(default)]
    pub ensure_disk_write: bool,
}

fn default_database() -> String {
    "test".into()
}

impl FileStoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>, database: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            database: database.into(),
            ensure_disk_write: false,
        }
    }

    pub(crate) fn dir(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }
}

// ════════════════════════════════════════════════════════════════
//  Journal line formats
// ════════════════════════════════════════════════════════════════

/// One line of `records.jsonl`. `Put` carries the full record as it stands
/// after the write (insert, upsert or patch).
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum RecordEntry {
    Put { record: Record },
    Delete { id: u64 },
}

/// One line of `cursors.jsonl`: the value of a group after an increment.
#[derive(serde::Serialize, serde::Deserialize)]
pub(crate) struct CursorEntry {
    pub group_id: u64,
    pub value: u64,
}

impl CursorEntry {
    pub(crate) fn after(group_id: u64, advance: CursorAdvance) -> Self {
        Self { group_id, value: advance.new }
    }
}
