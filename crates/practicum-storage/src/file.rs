//! Durable file backend: append-only journal plus snapshot documents.
//!
//! Layout under the store root:
//!
//! ```text
//! manifest.json                                store version marker
//! journal.log.jsonl                            one JournalRecordV1 per line
//! users/<user>/totals.json                     running totals row
//! users/<user>/dates/<date>/hours/<cat>.json   one entry document
//! ```
//!
//! A batch commits by appending (and fsyncing) one journal record; the
//! in-memory image and the document files follow it, each document
//! serialized to a temp file and renamed into place so a reader never
//! observes half a document. Records carry the *resolved* post-write
//! documents rather than deltas, so replaying a journal over documents
//! that already contain its effects is harmless. A record whose documents
//! never landed is healed on the next open. `compact` rewrites every
//! document and retires superseded spellings before truncating the
//! journal.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;
use walkdir::WalkDir;

use practicum_model::{
    AggregateTotals, DateKey, DayEntries, HourCategory, HourLogEntry, UserId,
};

use crate::docs::EntryDocV1;
use crate::store::{HourStore, ResolvedWrites, StoreError, StoreState, WriteBatch};

const MANIFEST_FILE: &str = "manifest.json";
const JOURNAL_FILE: &str = "journal.log.jsonl";
const USERS_DIR: &str = "users";
const DATES_DIR: &str = "dates";
const HOURS_DIR: &str = "hours";
const TOTALS_FILE: &str = "totals.json";

const STORE_VERSION_V1: &str = "practicum_store_v1";
const JOURNAL_VERSION_V1: &str = "practicum_journal_v1";

// ============================================================================
// On-Disk Records
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestV1 {
    version: String,
    created_at_unix_secs: u64,
}

/// One committed batch: the absolute documents it left behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecordV1 {
    pub version: String,
    pub batch_id: Uuid,
    pub created_at_unix_secs: u64,
    pub writes: Vec<JournalWriteV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum JournalWriteV1 {
    /// Post-write entry document.
    PutEntryV1 { user: UserId, doc: EntryDocV1 },
    /// Post-write totals row.
    PutTotalsV1 {
        user: UserId,
        totals: AggregateTotals,
    },
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the file backend.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Store root directory; created on open if missing.
    pub root: PathBuf,
    /// Journal records tolerated before the store compacts itself.
    pub compact_after: usize,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        FileStoreConfig {
            root: PathBuf::from("./hours"),
            compact_after: 1024,
        }
    }
}

// ============================================================================
// File Store
// ============================================================================

/// Durable `HourStore`. Reads serve from an in-memory image rebuilt on
/// open (snapshots first, then journal replay).
#[derive(Debug)]
pub struct FileStore {
    config: FileStoreConfig,
    state: RwLock<StoreState>,
    journal: Mutex<File>,
    records_since_compact: AtomicUsize,
}

impl FileStore {
    /// Open (or create) a store under `config.root`. Replays any journal
    /// left by an earlier process on top of the snapshot files and
    /// rewrites the documents those records cover, compacting right away
    /// if the journal has grown past the threshold. A torn document is an
    /// error unless a replayed record supersedes it.
    pub fn open(config: FileStoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.root)?;
        check_or_write_manifest(&config.root)?;

        let (mut state, damage) = load_snapshots(&config.root)?;
        let journal_path = config.root.join(JOURNAL_FILE);
        let records = replay_journal(&journal_path, &mut state)?;

        for torn in damage {
            if journal_covers(&records, &torn.doc) {
                warn!(path = %torn.path.display(), "journal supersedes a torn document; rewriting it");
                continue;
            }
            return Err(StoreError::Corrupt {
                path: torn.path,
                source: torn.source,
            });
        }
        for record in &records {
            write_documents(&config.root, &record.writes)?;
        }

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)?;

        let store = FileStore {
            config,
            state: RwLock::new(state),
            journal: Mutex::new(journal),
            records_since_compact: AtomicUsize::new(records.len()),
        };

        if records.len() >= store.config.compact_after {
            store.compact()?;
        }
        Ok(store)
    }

    /// Open with default settings under `root`.
    pub fn open_dir(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        FileStore::open(FileStoreConfig {
            root: root.into(),
            ..Default::default()
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Rewrite every document as a snapshot file and drop files superseded
    /// by a differently spelled key, then truncate the journal. Safe to
    /// interrupt: snapshots land through synced temp files and replay is
    /// idempotent, so a crash between the steps loses nothing.
    pub fn compact(&self) -> Result<(), StoreError> {
        let state = self.state.read();
        self.compact_locked(&state)
    }

    fn compact_locked(&self, state: &StoreState) -> Result<(), StoreError> {
        let journal = self.journal.lock();
        // Every document is synced to disk before the journal that could
        // rebuild it goes away.
        write_snapshots(&self.config.root, state)?;
        sweep_superseded_files(&self.config.root, state)?;
        journal.set_len(0)?;
        self.records_since_compact.store(0, Ordering::SeqCst);
        Ok(())
    }
}

impl HourStore for FileStore {
    fn entry(
        &self,
        user: &UserId,
        date: DateKey,
        category: HourCategory,
    ) -> Result<Option<HourLogEntry>, StoreError> {
        Ok(self.state.read().entry(user, date, category).cloned())
    }

    fn entries_for_date(&self, user: &UserId, date: DateKey) -> Result<DayEntries, StoreError> {
        Ok(self.state.read().day(user, date).cloned().unwrap_or_default())
    }

    fn totals(&self, user: &UserId) -> Result<Option<AggregateTotals>, StoreError> {
        Ok(self.state.read().totals(user))
    }

    fn dates_for_user(&self, user: &UserId) -> Result<Vec<DateKey>, StoreError> {
        Ok(self.state.read().dates(user))
    }

    fn users(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.state.read().users())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let resolved = state.resolve(&batch);
        if resolved.is_empty() {
            return Ok(());
        }

        let record = JournalRecordV1 {
            version: JOURNAL_VERSION_V1.to_string(),
            batch_id: Uuid::new_v4(),
            created_at_unix_secs: now_unix_secs(),
            writes: resolved_writes(&resolved),
        };
        {
            let mut journal = self.journal.lock();
            append_record(&mut journal, &record)?;
        }
        // The record is durable; the image and the documents follow it.
        state.apply_resolved(resolved);
        if let Err(error) = write_documents(&self.config.root, &record.writes) {
            warn!(error = %error, "document rewrite failed; replay will heal it on the next open");
        }

        let records = self.records_since_compact.fetch_add(1, Ordering::SeqCst) + 1;
        if records >= self.config.compact_after {
            self.compact_locked(&state)?;
        }
        Ok(())
    }
}

// ============================================================================
// Journal
// ============================================================================

fn resolved_writes(resolved: &ResolvedWrites) -> Vec<JournalWriteV1> {
    let mut writes = Vec::with_capacity(resolved.entries.len() + resolved.totals.len());
    for ((user, _date, _category), entry) in &resolved.entries {
        writes.push(JournalWriteV1::PutEntryV1 {
            user: user.clone(),
            doc: EntryDocV1::from_entry(entry),
        });
    }
    for (user, totals) in &resolved.totals {
        writes.push(JournalWriteV1::PutTotalsV1 {
            user: user.clone(),
            totals: *totals,
        });
    }
    writes
}

fn append_record(journal: &mut File, record: &JournalRecordV1) -> Result<(), StoreError> {
    let line = serde_json::to_string(record).map_err(|source| StoreError::Corrupt {
        path: PathBuf::from(JOURNAL_FILE),
        source,
    })?;
    writeln!(journal, "{line}")?;
    journal.sync_data()?;
    Ok(())
}

/// Replay the journal into `state`. Returns the records applied so the
/// caller can rewrite the documents they cover. A torn final line (crash
/// mid-append) is tolerated; corruption anywhere else is an error.
fn replay_journal(
    path: &Path,
    state: &mut StoreState,
) -> Result<Vec<JournalRecordV1>, StoreError> {
    let mut applied = Vec::new();
    if !path.exists() {
        return Ok(applied);
    }
    let contents = fs::read_to_string(path)?;
    let lines: Vec<&str> = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    for (idx, line) in lines.iter().enumerate() {
        let record: JournalRecordV1 = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(source) => {
                if idx + 1 == lines.len() {
                    warn!(path = %path.display(), "dropping torn final journal line");
                    break;
                }
                return Err(StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if record.version != JOURNAL_VERSION_V1 {
            return Err(StoreError::UnsupportedVersion {
                path: path.to_path_buf(),
                version: record.version,
            });
        }
        for write in &record.writes {
            match write {
                JournalWriteV1::PutEntryV1 { user, doc } => {
                    state.put_entry(user.clone(), doc.clone().into_entry());
                }
                JournalWriteV1::PutTotalsV1 { user, totals } => {
                    state.put_totals(user.clone(), *totals);
                }
            }
        }
        applied.push(record);
    }
    Ok(applied)
}

// ============================================================================
// Snapshots
// ============================================================================

fn check_or_write_manifest(root: &Path) -> Result<(), StoreError> {
    let path = root.join(MANIFEST_FILE);
    if path.exists() {
        let contents = fs::read_to_string(&path)?;
        let manifest: ManifestV1 =
            serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?;
        if manifest.version != STORE_VERSION_V1 {
            return Err(StoreError::UnsupportedVersion {
                path,
                version: manifest.version,
            });
        }
        return Ok(());
    }
    let manifest = ManifestV1 {
        version: STORE_VERSION_V1.to_string(),
        created_at_unix_secs: now_unix_secs(),
    };
    write_json_pretty(&path, &manifest)
}

fn totals_path(root: &Path, user: &UserId) -> PathBuf {
    root.join(USERS_DIR).join(user.as_str()).join(TOTALS_FILE)
}

fn entry_path(root: &Path, user: &UserId, date: DateKey, category: HourCategory) -> PathBuf {
    root.join(USERS_DIR)
        .join(user.as_str())
        .join(DATES_DIR)
        .join(date.canonical())
        .join(HOURS_DIR)
        .join(format!("{}.json", category.as_str()))
}

fn write_snapshots(root: &Path, state: &StoreState) -> Result<(), StoreError> {
    for user in state.users() {
        if let Some(totals) = state.totals(&user) {
            write_json_pretty(&totals_path(root, &user), &totals)?;
        }
        for date in state.dates(&user) {
            let day = match state.day(&user, date) {
                Some(day) => day,
                None => continue,
            };
            for entry in day.iter() {
                let path = entry_path(root, &user, date, entry.category);
                write_json_pretty(&path, &EntryDocV1::from_entry(entry))?;
            }
        }
    }
    Ok(())
}

/// Rewrite the document files a committed record names. Entry rewrites
/// also retire any file still holding the same slot under a differently
/// spelled date directory, so two files never claim one slot.
fn write_documents(root: &Path, writes: &[JournalWriteV1]) -> Result<(), StoreError> {
    for write in writes {
        match write {
            JournalWriteV1::PutEntryV1 { user, doc } => {
                write_json_pretty(&entry_path(root, user, doc.date, doc.hour_type), doc)?;
                retire_superseded_entries(root, user, doc.date, doc.hour_type)?;
            }
            JournalWriteV1::PutTotalsV1 { user, totals } => {
                write_json_pretty(&totals_path(root, user), totals)?;
            }
        }
    }
    Ok(())
}

/// Delete the file for `(date, category)` under any date directory whose
/// name parses to `date` but is not the canonical spelling. The canonical
/// file has already been rewritten when this runs.
fn retire_superseded_entries(
    root: &Path,
    user: &UserId,
    date: DateKey,
    category: HourCategory,
) -> Result<(), StoreError> {
    let dates_dir = root.join(USERS_DIR).join(user.as_str()).join(DATES_DIR);
    if !dates_dir.exists() {
        return Ok(());
    }
    let canonical = date.canonical();
    for sibling in fs::read_dir(&dates_dir)? {
        let sibling = sibling?;
        if !sibling.file_type()?.is_dir() {
            continue;
        }
        let name = sibling.file_name();
        let name = match name.to_str() {
            Some(name) => name,
            None => continue,
        };
        if name == canonical || name.parse::<DateKey>().ok() != Some(date) {
            continue;
        }
        let stale = sibling
            .path()
            .join(HOURS_DIR)
            .join(format!("{}.json", category.as_str()));
        if stale.exists() {
            warn!(path = %stale.display(), "retiring entry file superseded by a canonical rewrite");
            fs::remove_file(&stale)?;
        }
        prune_empty_dirs(&stale);
    }
    Ok(())
}

/// Remove entry files parked under non-canonical date directories once
/// `write_snapshots` has rewritten their slots. Runs during compaction so
/// a store that imported legacy-named directories converges on one file
/// per slot.
fn sweep_superseded_files(root: &Path, state: &StoreState) -> Result<(), StoreError> {
    let users_dir = root.join(USERS_DIR);
    if !users_dir.exists() {
        return Ok(());
    }
    let mut superseded = Vec::new();
    for entry in WalkDir::new(&users_dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = match path.strip_prefix(&users_dir) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let parts: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(os) => os.to_str(),
                _ => None,
            })
            .collect();
        let (user, date_name, file) = match parts.as_slice() {
            [user, DATES_DIR, date, HOURS_DIR, file] => (*user, *date, *file),
            _ => continue,
        };
        let user = match UserId::new(user) {
            Ok(user) => user,
            Err(_) => continue,
        };
        let date: DateKey = match date_name.parse() {
            Ok(date) => date,
            Err(_) => continue,
        };
        let category: HourCategory = match file.strip_suffix(".json").unwrap_or(file).parse() {
            Ok(category) => category,
            Err(_) => continue,
        };
        if date_name == date.canonical() {
            continue;
        }
        // Only retire a file whose slot the snapshot pass just rewrote.
        if state.entry(&user, date, category).is_none() {
            continue;
        }
        superseded.push(path.to_path_buf());
    }
    for path in superseded {
        warn!(path = %path.display(), "removing entry file superseded by compaction");
        fs::remove_file(&path)?;
        prune_empty_dirs(&path);
    }
    Ok(())
}

/// Best-effort removal of the hours and date directories around a retired
/// file once nothing else lives in them.
fn prune_empty_dirs(retired: &Path) {
    if let Some(hours) = retired.parent() {
        let _ = fs::remove_dir(hours);
        if let Some(date_dir) = hours.parent() {
            let _ = fs::remove_dir(date_dir);
        }
    }
}

/// Serialize `value` beside `path` and rename it into place. A reader or
/// a crash can observe the old document or the new one, never a torn one.
fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// A recognized document that failed to parse. `open` refuses the store
/// over one of these unless the journal rewrites the same slot.
struct SnapshotDamage {
    doc: DamagedDoc,
    path: PathBuf,
    source: serde_json::Error,
}

enum DamagedDoc {
    Totals {
        user: UserId,
    },
    Entry {
        user: UserId,
        date: DateKey,
        category: HourCategory,
    },
}

fn journal_covers(records: &[JournalRecordV1], doc: &DamagedDoc) -> bool {
    records
        .iter()
        .flat_map(|record| record.writes.iter())
        .any(|write| match (write, doc) {
            (JournalWriteV1::PutTotalsV1 { user, .. }, DamagedDoc::Totals { user: torn }) => {
                user == torn
            }
            (
                JournalWriteV1::PutEntryV1 { user, doc: rewrite },
                DamagedDoc::Entry {
                    user: torn,
                    date,
                    category,
                },
            ) => user == torn && rewrite.date == *date && rewrite.hour_type == *category,
            _ => false,
        })
}

/// Walk `users/` and load every recognized document. Files that do not
/// fit the layout are skipped with a warning so a stray editor backup
/// cannot brick the store; corrupt JSON in a recognized slot is reported
/// back for `open` to weigh against the journal.
fn load_snapshots(root: &Path) -> Result<(StoreState, Vec<SnapshotDamage>), StoreError> {
    let mut state = StoreState::default();
    let mut damage = Vec::new();
    let users_dir = root.join(USERS_DIR);
    if !users_dir.exists() {
        return Ok((state, damage));
    }

    for entry in WalkDir::new(&users_dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = match path.strip_prefix(&users_dir) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let parts: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(os) => os.to_str(),
                _ => None,
            })
            .collect();

        match parts.as_slice() {
            [user, TOTALS_FILE] => {
                let user = match UserId::new(*user) {
                    Ok(user) => user,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping totals with bad user dir");
                        continue;
                    }
                };
                let contents = fs::read_to_string(path)?;
                let totals: AggregateTotals = match serde_json::from_str(&contents) {
                    Ok(totals) => totals,
                    Err(source) => {
                        damage.push(SnapshotDamage {
                            doc: DamagedDoc::Totals { user },
                            path: path.to_path_buf(),
                            source,
                        });
                        continue;
                    }
                };
                state.put_totals(user, totals);
            }
            [user, DATES_DIR, date, HOURS_DIR, file] => {
                let user = match UserId::new(*user) {
                    Ok(user) => user,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping entry with bad user dir");
                        continue;
                    }
                };
                let date: DateKey = match date.parse() {
                    Ok(date) => date,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping entry with bad date dir");
                        continue;
                    }
                };
                let category: HourCategory = match file
                    .strip_suffix(".json")
                    .unwrap_or(*file)
                    .parse()
                {
                    Ok(category) => category,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping entry with bad category file");
                        continue;
                    }
                };
                let contents = fs::read_to_string(path)?;
                let doc: EntryDocV1 = match serde_json::from_str(&contents) {
                    Ok(doc) => doc,
                    Err(source) => {
                        damage.push(SnapshotDamage {
                            doc: DamagedDoc::Entry {
                                user,
                                date,
                                category,
                            },
                            path: path.to_path_buf(),
                            source,
                        });
                        continue;
                    }
                };
                if doc.hour_type != category {
                    warn!(
                        path = %path.display(),
                        expected = %category,
                        found = %doc.hour_type,
                        "skipping entry whose hourType disagrees with its file name"
                    );
                    continue;
                }
                let mut entry = doc.into_entry();
                if entry.date != date {
                    // The directory is where lookups will find it.
                    warn!(
                        path = %path.display(),
                        doc_date = %entry.date,
                        dir_date = %date,
                        "entry date field disagrees with its directory; using the directory"
                    );
                    entry.date = date;
                }
                state.put_entry(user, entry);
            }
            _ => {
                warn!(path = %path.display(), "unrecognized file in store; skipping");
            }
        }
    }
    Ok((state, damage))
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
