/// Durable, user-scoped key-value storage for tracker state. The tracker only
/// ever touches a single key; stores never delete or enumerate keys.
use crate::config::PropertyStoreType;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const APP_DIR: &str = "beacon";
const PROPERTIES_FILE: &str = "properties.json";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not decode property file {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("could not encode properties: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no user-scoped property location: neither XDG_CONFIG_HOME nor HOME is set")]
    NoUserDirectory,
}

pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Volatile store, useful for tests and short-lived processes where the
/// identifier does not need to survive a restart.
#[derive(Default)]
pub struct MemoryPropertyStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Properties persisted as a flat JSON object in a single file. A missing
/// file reads as an empty store. Writes rewrite the whole file.
pub struct FilesystemPropertyStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FilesystemPropertyStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FilesystemPropertyStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The store shared by every process running as the current user.
    pub fn user_default() -> Result<Self, StoreError> {
        Ok(Self::new(user_default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })
    }
}

impl PropertyStore for FilesystemPropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();

        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &values)?;
        writer.flush()?;

        tracing::debug!(path = ?self.path, key, "Stored property");

        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/beacon/properties.json`, or `$HOME/.config/beacon/properties.json`.
pub fn user_default_path() -> Result<PathBuf, StoreError> {
    let base = match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::var_os("HOME")
            .filter(|v| !v.is_empty())
            .map(|home| PathBuf::from(home).join(".config"))
            .ok_or(StoreError::NoUserDirectory)?,
    };

    Ok(base.join(APP_DIR).join(PROPERTIES_FILE))
}

pub fn get_store(store_type: &PropertyStoreType) -> Result<Arc<dyn PropertyStore>, StoreError> {
    let store: Arc<dyn PropertyStore> = match store_type {
        PropertyStoreType::Filesystem { path } => Arc::new(FilesystemPropertyStore::new(path)),
        PropertyStoreType::Memory => Arc::new(MemoryPropertyStore::new()),
        PropertyStoreType::User => Arc::new(FilesystemPropertyStore::user_default()?),
    };
    Ok(store)
}
