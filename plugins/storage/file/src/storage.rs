use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use stride_api::{
    CursorAdvance, Record, RecordId, RecordPatch, SequenceStore, StoreError, StoreFactory,
    StoreFuture,
};

use super::config::{CURSORS_FILE, CursorEntry, FileStoreConfig, RECORDS_FILE, RecordEntry};

// ════════════════════════════════════════════════════════════════
//  Journal
// ════════════════════════════════════════════════════════════════

/// What a journal needs from its backing file.
trait JournalFile: Write {
    fn len(&self) -> io::Result<u64>;
    fn set_len(&self, len: u64) -> io::Result<()>;
    fn sync_data(&self) -> io::Result<()>;
    fn sync_all(&self) -> io::Result<()>;
}

impl JournalFile for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&self) -> io::Result<()> {
        File::sync_all(self)
    }
}

/// Append-only JSON-lines file.
///
/// An append either lands as one whole line or leaves the file at its
/// previous length. If that rollback itself fails the journal is poisoned
/// and refuses further appends.
struct Journal<F = File> {
    path: PathBuf,
    file: F,
    sync: bool,
    /// Length covered by complete lines.
    len: u64,
    poisoned: bool,
}

impl Journal {
    fn open(path: PathBuf, sync: bool) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::unavailable(format!("open {}: {e}", path.display())))?;
        Journal::new(path, file, sync)
    }
}

impl<F: JournalFile> Journal<F> {
    fn new(path: PathBuf, file: F, sync: bool) -> Result<Self, StoreError> {
        let len = file
            .len()
            .map_err(|e| StoreError::unavailable(format!("stat {}: {e}", path.display())))?;
        Ok(Self { path, file, sync, len, poisoned: false })
    }

    fn append<T: serde::Serialize>(&mut self, entry: &T) -> Result<(), StoreError> {
        if self.poisoned {
            return Err(StoreError::unavailable(format!(
                "{} holds a partial write that could not be rolled back",
                self.path.display()
            )));
        }
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let written = match self.file.write_all(&line) {
            Err(e) => Err(format!("write {}: {e}", self.path.display())),
            Ok(()) if self.sync => self
                .file
                .sync_data()
                .map_err(|e| format!("sync {}: {e}", self.path.display())),
            Ok(()) => Ok(()),
        };
        match written {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(detail) => {
                self.rollback();
                Err(StoreError::unavailable(detail))
            }
        }
    }

    /// Cut the file back to the last complete line.
    fn rollback(&mut self) {
        match self.file.set_len(self.len) {
            Ok(()) => tracing::warn!(path = %self.path.display(), len = self.len, "journal append rolled back"),
            Err(e) => {
                self.poisoned = true;
                tracing::error!(path = %self.path.display(), error = %e, "journal rollback failed");
            }
        }
    }

    fn truncate(&mut self) -> Result<(), StoreError> {
        self.file
            .set_len(0)
            .map_err(|e| StoreError::unavailable(format!("truncate {}: {e}", self.path.display())))?;
        self.len = 0;
        self.poisoned = false;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    fn sync(&self) -> Result<(), StoreError> {
        self.file
            .sync_all()
            .map_err(|e| StoreError::unavailable(format!("sync {}: {e}", self.path.display())))
    }
}

/// Parse every non-empty line of `path`. A missing file is an empty journal.
///
/// A final line without its newline is an append that never completed: it
/// is cut off and replay succeeds. A complete line that does not parse is
/// a `Format` error.
fn replay<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::unavailable(format!("open {}: {e}", path.display()))),
    };
    let mut reader = BufReader::new(f);
    let mut entries = Vec::new();
    let mut line = Vec::new();
    let mut offset = 0u64;
    let mut n = 0;
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| StoreError::unavailable(format!("read {}: {e}", path.display())))?;
        if read == 0 {
            break;
        }
        n += 1;
        if line.last() != Some(&b'\n') {
            cut_torn_tail(path, offset, read)?;
            break;
        }
        offset += read as u64;
        if line.trim_ascii().is_empty() {
            continue;
        }
        let entry = serde_json::from_slice(&line)
            .map_err(|e| StoreError::format_err(format!("{}:{n}: {e}", path.display())))?;
        entries.push(entry);
    }
    Ok(entries)
}

fn cut_torn_tail(path: &Path, len: u64, torn: usize) -> Result<(), StoreError> {
    tracing::warn!(path = %path.display(), offset = len, bytes = torn, "dropping unterminated journal tail");
    let f = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| StoreError::unavailable(format!("open {}: {e}", path.display())))?;
    f.set_len(len)
        .and_then(|()| f.sync_all())
        .map_err(|e| StoreError::unavailable(format!("truncate {}: {e}", path.display())))
}

/// Rewrite the cursor journal with one line per group.
fn compact_cursors(path: &Path, values: &HashMap<u64, u64>) -> Result<(), StoreError> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut f = File::create(&tmp)
            .map_err(|e| StoreError::unavailable(format!("create {}: {e}", tmp.display())))?;
        let mut groups: Vec<_> = values.iter().collect();
        groups.sort_unstable();
        for (&group_id, &value) in groups {
            let mut line = serde_json::to_vec(&CursorEntry { group_id, value })?;
            line.push(b'\n');
            f.write_all(&line)?;
        }
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)
        .map_err(|e| StoreError::unavailable(format!("rename {}: {e}", tmp.display())))
}

// ════════════════════════════════════════════════════════════════
//  FileStore
// ════════════════════════════════════════════════════════════════

struct RecordState {
    records: BTreeMap<u64, Record>,
    journal: Journal,
}

struct CursorState {
    values: HashMap<u64, u64>,
    journal: Journal,
}

struct Inner {
    config: FileStoreConfig,
    records: Mutex<Option<RecordState>>,
    cursors: Mutex<Option<CursorState>>,
}

/// Single-process durable store.
///
/// State lives in memory; every mutation is appended to a JSON-lines
/// journal before it becomes visible, and `init` replays the journals.
/// Clones share state. Two processes must not open the same directory.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Inner>,
}

fn not_initialized() -> StoreError {
    StoreError::unavailable("file store is not initialized")
}

impl FileStore {
    pub fn new(config: FileStoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                records: Mutex::new(None),
                cursors: Mutex::new(None),
            }),
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.inner.config.dir()
    }

    async fn do_init(&self) -> Result<(), StoreError> {
        let dir = self.dir();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::unavailable(format!("mkdir {}: {e}", dir.display())))?;
        let sync = self.inner.config.ensure_disk_write;

        let records_path = dir.join(RECORDS_FILE);
        let mut records = BTreeMap::new();
        for entry in replay::<RecordEntry>(&records_path)? {
            match entry {
                RecordEntry::Put { record } => {
                    records.insert(record.id, record);
                }
                RecordEntry::Delete { id } => {
                    records.remove(&id);
                }
            }
        }

        let cursors_path = dir.join(CURSORS_FILE);
        let mut values = HashMap::new();
        for entry in replay::<CursorEntry>(&cursors_path)? {
            values.insert(entry.group_id, entry.value);
        }
        compact_cursors(&cursors_path, &values)?;

        tracing::debug!(
            dir = %dir.display(),
            records = records.len(),
            cursors = values.len(),
            "file store replayed"
        );

        *self.inner.records.lock().await = Some(RecordState {
            records,
            journal: Journal::open(records_path, sync)?,
        });
        *self.inner.cursors.lock().await = Some(CursorState {
            values,
            journal: Journal::open(cursors_path, sync)?,
        });
        Ok(())
    }

    async fn put(&self, record: Record, reject_existing: bool) -> Result<(), StoreError> {
        let mut guard = self.inner.records.lock().await;
        let state = guard.as_mut().ok_or_else(not_initialized)?;
        if reject_existing && state.records.contains_key(&record.id) {
            return Err(StoreError::conflict(format!("duplicate record id {}", record.id)));
        }
        state.journal.append(&RecordEntry::Put { record: record.clone() })?;
        state.records.insert(record.id, record);
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════
//  SequenceStore impl
// ════════════════════════════════════════════════════════════════

impl SequenceStore for FileStore {
    fn init(&self) -> StoreFuture<'_, ()> {
        Box::pin(self.do_init())
    }

    fn insert(&self, record: Record) -> StoreFuture<'_, ()> {
        Box::pin(self.put(record, true))
    }

    fn upsert(&self, id: RecordId, mut record: Record) -> StoreFuture<'_, ()> {
        record.id = id.get();
        Box::pin(self.put(record, false))
    }

    fn patch(&self, id: RecordId, patch: RecordPatch) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut guard = self.inner.records.lock().await;
            let state = guard.as_mut().ok_or_else(not_initialized)?;
            let mut record = state
                .records
                .get(&id.get())
                .cloned()
                .ok_or_else(|| StoreError::not_found(format!("record {id} not found")))?;
            if patch.is_empty() {
                return Ok(());
            }
            record.apply(&patch);
            state.journal.append(&RecordEntry::Put { record: record.clone() })?;
            state.records.insert(record.id, record);
            Ok(())
        })
    }

    fn get(&self, id: RecordId) -> StoreFuture<'_, Option<Record>> {
        Box::pin(async move {
            let guard = self.inner.records.lock().await;
            let state = guard.as_ref().ok_or_else(not_initialized)?;
            Ok(state.records.get(&id.get()).cloned())
        })
    }

    fn delete(&self, id: RecordId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut guard = self.inner.records.lock().await;
            let state = guard.as_mut().ok_or_else(not_initialized)?;
            if !state.records.contains_key(&id.get()) {
                return Ok(false);
            }
            state.journal.append(&RecordEntry::Delete { id: id.get() })?;
            state.records.remove(&id.get());
            Ok(true)
        })
    }

    fn increment(&self, group_id: u64, delta: u64) -> StoreFuture<'_, CursorAdvance> {
        Box::pin(async move {
            let mut guard = self.inner.cursors.lock().await;
            let state = guard.as_mut().ok_or_else(not_initialized)?;
            let old = state.values.get(&group_id).copied().unwrap_or(0);
            let new = old.checked_add(delta).ok_or_else(|| {
                StoreError::conflict(format!("cursor of group {group_id} overflows at {old}+{delta}"))
            })?;
            let advance = CursorAdvance { old, new };
            // Zero deltas on a known group are pure reads and leave no trace.
            if delta > 0 || !state.values.contains_key(&group_id) {
                state.journal.append(&CursorEntry::after(group_id, advance))?;
                state.values.insert(group_id, new);
            }
            Ok(advance)
        })
    }

    fn range(&self, low: u64, high: u64) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let guard = self.inner.records.lock().await;
            let state = guard.as_ref().ok_or_else(not_initialized)?;
            if low > high {
                return Ok(Vec::new());
            }
            Ok(state.records.range(low..=high).map(|(_, r)| r.clone()).collect())
        })
    }

    fn count(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let guard = self.inner.records.lock().await;
            let state = guard.as_ref().ok_or_else(not_initialized)?;
            Ok(state.records.len() as u64)
        })
    }

    fn delete_all_records(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut guard = self.inner.records.lock().await;
            let state = guard.as_mut().ok_or_else(not_initialized)?;
            state.journal.truncate()?;
            state.records.clear();
            Ok(())
        })
    }

    fn delete_all_cursors(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut guard = self.inner.cursors.lock().await;
            let state = guard.as_mut().ok_or_else(not_initialized)?;
            state.journal.truncate()?;
            state.values.clear();
            Ok(())
        })
    }

    fn flush(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if let Some(state) = self.inner.records.lock().await.as_ref() {
                state.journal.sync()?;
            }
            if let Some(state) = self.inner.cursors.lock().await.as_ref() {
                state.journal.sync()?;
            }
            Ok(())
        })
    }
}

// ════════════════════════════════════════════════════════════════
//  FileStoreFactory
// ════════════════════════════════════════════════════════════════

/// Opens the store once; every `connect` shares it.
pub struct FileStoreFactory {
    store: FileStore,
}

impl FileStoreFactory {
    pub async fn open(config: FileStoreConfig) -> Result<Self, StoreError> {
        let store = FileStore::new(config);
        store.init().await?;
        tracing::info!(dir = %store.dir().display(), "file store opened");
        Ok(Self { store })
    }
}

impl StoreFactory for FileStoreFactory {
    fn connect(&self) -> StoreFuture<'_, Arc<dyn SequenceStore>> {
        let store = self.store.clone();
        Box::pin(async move { Ok(Arc::new(store) as Arc<dyn SequenceStore>) })
    }
}
