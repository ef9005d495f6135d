use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::*;

pub const USERS_FILE: &str = "users.json";
pub const IMAGES_FILE: &str = "images.json";
pub const SUPPORT_FILE: &str = "support_requests.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Contents of one store file: a JSON object keyed by record id.
pub type Documents<T> = BTreeMap<String, T>;

/// A JSON object persisted as a single file.
///
/// Reads never fail: a missing or malformed file is an empty mapping and
/// a record of the wrong shape is skipped.
/// Writes replace the whole file through a temp file and rename, and are
/// serialized by a per-file lock so concurrent `update`s in this process
/// cannot lose each other's changes.
pub struct DocumentFile<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _records: PhantomData<fn() -> T>,
}

impl<T> DocumentFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole mapping. Missing or unreadable content yields an empty map,
    /// and records that do not match `T` are skipped.
    pub fn load(&self) -> Documents<T> {
        self.load_split().0
    }

    /// Parsed records plus the raw entries that failed to deserialize.
    fn load_split(&self) -> (Documents<T>, Documents<Value>) {
        let mut docs = Documents::new();
        let mut foreign = Documents::new();
        for (key, value) in self.load_raw() {
            match T::deserialize(&value) {
                Ok(record) => {
                    docs.insert(key, record);
                }
                Err(e) => {
                    log::warn!(
                        "Skipping unreadable record '{}' in {}: {}",
                        key,
                        self.path.display(),
                        e
                    );
                    foreign.insert(key, value);
                }
            }
        }
        (docs, foreign)
    }

    fn load_raw(&self) -> Documents<Value> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Documents::new(),
            Err(e) => {
                log::warn!("Failed to read {}: {}", self.path.display(), e);
                return Documents::new();
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(docs) => docs,
            Err(e) => {
                log::warn!("Ignoring malformed store file {}: {}", self.path.display(), e);
                Documents::new()
            }
        }
    }

    /// Overwrite the file with `docs`.
    pub fn save(&self, docs: &Documents<T>) -> StoreResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(docs, Documents::new())
    }

    /// Load, apply `f`, and save while holding the file lock.
    /// Records `f` never saw because they failed to parse are written back untouched.
    pub fn update<R>(&self, f: impl FnOnce(&mut Documents<T>) -> R) -> StoreResult<R> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut docs, foreign) = self.load_split();
        let out = f(&mut docs);
        self.write(&docs, foreign)?;
        Ok(out)
    }

    /// Create the file as `{}` if it does not exist yet.
    pub fn ensure_exists(&self) -> StoreResult<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&Documents::new())
    }

    fn write(&self, docs: &Documents<T>, mut merged: Documents<Value>) -> StoreResult<()> {
        for (key, record) in docs {
            merged.insert(key.clone(), serde_json::to_value(record)?);
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut ser =
                serde_json::Serializer::with_formatter(&mut tmp, PrettyFormatter::with_indent(b"    "));
            merged.serialize(&mut ser)?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// The three JSON-file tables: users, images and support requests.
pub struct Store {
    data_dir: PathBuf,
    users: DocumentFile<UserRecord>,
    images: DocumentFile<ImageRecord>,
    support: DocumentFile<SupportRequest>,
}

impl Store {
    /// Open (and initialize if needed) the store files under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let store = Self {
            users: DocumentFile::new(data_dir.join(USERS_FILE)),
            images: DocumentFile::new(data_dir.join(IMAGES_FILE)),
            support: DocumentFile::new(data_dir.join(SUPPORT_FILE)),
            data_dir,
        };
        store.users.ensure_exists()?;
        store.images.ensure_exists()?;
        store.support.ensure_exists()?;
        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ==================== Users ====================

    /// Upsert a user: `first_seen` is kept if the name is known, `last_seen` is always `now`.
    pub fn record_user(&self, name: &str, now: NaiveDateTime) -> StoreResult<UserRecord> {
        self.users.update(|users| {
            let record = users
                .entry(name.to_string())
                .and_modify(|u| u.last_seen = now)
                .or_insert(UserRecord {
                    first_seen: now,
                    last_seen: now,
                });
            record.clone()
        })
    }

    pub fn user(&self, name: &str) -> Option<UserRecord> {
        self.users.load().remove(name)
    }

    pub fn users(&self) -> Documents<UserRecord> {
        self.users.load()
    }

    // ==================== Images ====================

    pub fn create_image(&self, id: &str, record: ImageRecord) -> StoreResult<()> {
        self.images.update(|images| {
            images.insert(id.to_string(), record);
        })
    }

    pub fn image(&self, id: &str) -> Option<ImageRecord> {
        self.images.load().remove(id)
    }

    pub fn images(&self) -> Documents<ImageRecord> {
        self.images.load()
    }

    // ==================== Support Requests ====================

    pub fn create_support_request(&self, id: &str, request: SupportRequest) -> StoreResult<()> {
        self.support.update(|requests| {
            requests.insert(id.to_string(), request);
        })
    }

    pub fn support_requests(&self) -> Documents<SupportRequest> {
        self.support.load()
    }
}
