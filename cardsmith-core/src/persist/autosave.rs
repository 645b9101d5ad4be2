//! # Autosave
//!
//! Crash recovery. The session is written to a small local key-value store, made of named
//! stores with a single fixed key each:
//! * [`StoreName::State`] - pages, settings and image bytes, as an [`AutosaveRecord`].
//! * [`StoreName::History`] - the undo/redo stacks, as [`HistoryData`].
//!
//! The store layout is versioned. Version 1 had only the state store, version 2 added the
//! history store. Upgrading only creates what is missing and never touches existing data.
//!
//! Writes are debounced by an [`AutosaveScheduler`]: a burst of changes produces one write,
//! a quiet period after the last of them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::history::HistoryData;
use crate::pages::Page;
use crate::payload::{decode_base64, encode_base64, PayloadKey, PayloadTable};
use crate::settings::Settings;

use super::records::PageRecord;
use super::Session;

/// Current store layout version.
pub const SCHEMA_VERSION: u32 = 2;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
/// The single key used within each store.
pub const RECORD_KEY: &str = "current";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum StoreName {
    State,
    History,
}
impl StoreName {
    /// Layout version that introduced this store.
    #[must_use]
    pub fn introduced_in(self) -> u32 {
        match self {
            Self::State => 1,
            Self::History => 2,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("store layout version {0} is newer than this build understands")]
    NewerSchema(u32),
    #[error("unreadable store layout version {0:?}")]
    BadVersion(String),
}

/// A handful of named byte stores. Implementations are shared between the editing thread and
/// background writers, hence `&self` everywhere.
pub trait KeyValueStore {
    fn get(&self, store: StoreName, key: &str) -> Result<Option<Vec<u8>>, PersistError>;
    fn put(&self, store: StoreName, key: &str, value: &[u8]) -> Result<(), PersistError>;
    fn delete(&self, store: StoreName, key: &str) -> Result<(), PersistError>;
}

/// In-memory store, for tests and for running without a data directory.
#[derive(Default)]
pub struct MemoryStore {
    entries: parking_lot::Mutex<hashbrown::HashMap<(StoreName, String), Vec<u8>>>,
}
impl KeyValueStore for MemoryStore {
    fn get(&self, store: StoreName, key: &str) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(self.entries.lock().get(&(store, key.to_owned())).cloned())
    }
    fn put(&self, store: StoreName, key: &str, value: &[u8]) -> Result<(), PersistError> {
        self.entries
            .lock()
            .insert((store, key.to_owned()), value.to_owned());
        Ok(())
    }
    fn delete(&self, store: StoreName, key: &str) -> Result<(), PersistError> {
        self.entries.lock().remove(&(store, key.to_owned()));
        Ok(())
    }
}

/// Default location of the on-disk store.
#[must_use]
pub fn default_data_dir(product: &str) -> Option<PathBuf> {
    let mut dir = dirs::data_dir()?;
    dir.push(product);
    Some(dir)
}

/// On-disk store: one directory per store, one file per key, and a version file at the root.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}
impl DirectoryStore {
    const VERSION_FILE: &'static str = "version";
    /// Open or create the store at `root`, upgrading an older layout in place.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let store = Self { root };
        let found = store.version()?;
        if found > SCHEMA_VERSION {
            return Err(PersistError::NewerSchema(found));
        }
        for name in <StoreName as strum::IntoEnumIterator>::iter() {
            let dir = store.store_dir(name);
            if name.introduced_in() > found || !dir.is_dir() {
                // create_dir_all leaves an existing directory and its contents alone.
                std::fs::create_dir_all(dir)?;
            }
        }
        if found != SCHEMA_VERSION {
            log::info!("upgrading autosave store from version {found} to {SCHEMA_VERSION}");
            let version = SCHEMA_VERSION.to_string();
            store.write_atomic(&store.root.join(Self::VERSION_FILE), version.as_bytes())?;
        }
        Ok(store)
    }
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
    /// Layout version on disk, 0 for a fresh directory.
    pub fn version(&self) -> Result<u32, PersistError> {
        match std::fs::read_to_string(self.root.join(Self::VERSION_FILE)) {
            Ok(text) => text
                .trim()
                .parse()
                .map_err(|_| PersistError::BadVersion(text.trim().to_owned())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
    fn store_dir(&self, store: StoreName) -> PathBuf {
        self.root.join(store.as_ref())
    }
    fn entry_path(&self, store: StoreName, key: &str) -> PathBuf {
        self.store_dir(store)
            .join(format!("{}.json", super::naming::sanitize_file_name(key)))
    }
    /// Write through a temporary file, so a crash mid-write leaves the old value intact.
    fn write_atomic(&self, path: &Path, value: &[u8]) -> Result<(), PersistError> {
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        std::fs::write(&temp, value)?;
        std::fs::rename(&temp, path)?;
        Ok(())
    }
}
impl KeyValueStore for DirectoryStore {
    fn get(&self, store: StoreName, key: &str) -> Result<Option<Vec<u8>>, PersistError> {
        match std::fs::read(self.entry_path(store, key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
    fn put(&self, store: StoreName, key: &str, value: &[u8]) -> Result<(), PersistError> {
        self.write_atomic(&self.entry_path(store, key), value)
    }
    fn delete(&self, store: StoreName, key: &str) -> Result<(), PersistError> {
        match std::fs::remove_file(self.entry_path(store, key)) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// The persisted session.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveRecord {
    pub pages: Vec<PageRecord>,
    #[serde(default)]
    pub current_page: usize,
    #[serde(default)]
    pub settings: Settings,
    /// Image bytes of every page, base64, by content key.
    #[serde(default)]
    pub payloads: BTreeMap<PayloadKey, String>,
}

/// Single-page shape written before pages existed.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    #[serde(flatten)]
    page: PageRecord,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    payloads: BTreeMap<PayloadKey, String>,
}
impl From<LegacyRecord> for AutosaveRecord {
    fn from(legacy: LegacyRecord) -> Self {
        Self {
            pages: vec![legacy.page],
            current_page: 0,
            settings: legacy.settings,
            payloads: legacy.payloads,
        }
    }
}

impl AutosaveRecord {
    #[must_use]
    pub fn capture(pages: &[Page], current_page: usize, settings: &Settings) -> Self {
        let mut payloads = BTreeMap::new();
        for page in pages {
            for src in page.record.images.iter().filter_map(|layer| layer.image_src()) {
                if let Some((key, bytes)) = page.payloads.get_key_value(src) {
                    payloads
                        .entry(key.clone())
                        .or_insert_with(|| encode_base64(bytes));
                }
            }
        }
        Self {
            pages: pages.iter().map(|page| page.record.clone()).collect(),
            current_page,
            settings: settings.clone(),
            payloads,
        }
    }
    /// Decode into live pages. Payloads that fail to decode are dropped, leaving the layers
    /// using them to be skipped when their page is loaded.
    #[must_use]
    pub fn into_session(self) -> Session {
        let mut decoded = PayloadTable::new();
        for (key, encoded) in self.payloads {
            match decode_base64(&encoded) {
                Ok(bytes) => {
                    decoded.insert(key, bytes.into());
                }
                Err(err) => log::warn!("dropping corrupt autosaved image {key}: {err}"),
            }
        }
        let pages = self
            .pages
            .into_iter()
            .map(|record| {
                let payloads = record
                    .images
                    .iter()
                    .filter_map(|layer| layer.image_src())
                    .filter_map(|src| decoded.get_key_value(src))
                    .map(|(key, bytes)| (key.clone(), bytes.clone()))
                    .collect();
                Page { record, payloads }
            })
            .collect();
        Session {
            pages,
            current_page: self.current_page,
            settings: self.settings,
        }
    }
}

/// Parse a state record, upgrading the legacy single-page shape (no `pages` field).
pub fn parse_state(bytes: &[u8]) -> Result<AutosaveRecord, PersistError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if value.get("pages").is_some() {
        Ok(serde_json::from_value(value)?)
    } else {
        log::info!("upgrading single-page autosave");
        let legacy: LegacyRecord = serde_json::from_value(value)?;
        Ok(legacy.into())
    }
}

pub fn save_state(
    store: &(impl KeyValueStore + ?Sized),
    record: &AutosaveRecord,
) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec(record)?;
    store.put(StoreName::State, RECORD_KEY, &bytes)
}
pub fn load_state(
    store: &(impl KeyValueStore + ?Sized),
) -> Result<Option<AutosaveRecord>, PersistError> {
    store
        .get(StoreName::State, RECORD_KEY)?
        .map(|bytes| parse_state(&bytes))
        .transpose()
}
pub fn save_history(
    store: &(impl KeyValueStore + ?Sized),
    history: &HistoryData,
) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec(history)?;
    store.put(StoreName::History, RECORD_KEY, &bytes)
}
pub fn load_history(
    store: &(impl KeyValueStore + ?Sized),
) -> Result<Option<HistoryData>, PersistError> {
    store
        .get(StoreName::History, RECORD_KEY)?
        .map(|bytes| serde_json::from_slice(&bytes).map_err(PersistError::from))
        .transpose()
}

/// Debounce for autosave writes. Time is passed in, so this never blocks or spawns.
#[derive(Clone, Debug)]
pub struct AutosaveScheduler {
    quiet: Duration,
    last_change: Option<Instant>,
}
impl Default for AutosaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
impl AutosaveScheduler {
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_change: None,
        }
    }
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }
    /// Note a change. Restarts the quiet period.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.last_change = Some(now);
    }
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.last_change.is_some()
    }
    /// When the pending write becomes due, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.last_change.map(|last| last + self.quiet)
    }
    /// Whether a write is due at `now`. Consumes the pending write if so.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_change = None;
                true
            }
            _ => false,
        }
    }
    /// Consume the pending write right away, if any.
    pub fn flush_now(&mut self) -> bool {
        self.last_change.take().is_some()
    }
}
