use directories::ProjectDirs;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const EVENTS_KEY: &str = "weekgrid-events";
pub const TASKS_KEY: &str = "weekgrid-tasks";
pub const COLORS_KEY: &str = "weekgrid-colors";

const PROJECT_DIR: &str = ".weekgrid";
const DATA_FILE: &str = "calendar.yml";

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("reading {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("writing {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("parsing {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("serializing calendar data: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("no data directory available on this platform")]
    NoDataDir,
}

/// Key-value persistence for the schedule's serialized form.
pub trait Persistence {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn save(&mut self, key: &str, value: Value) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub scope: StoreScope,
}

impl StoreLocation {
    pub fn scope_label(&self) -> &'static str {
        match self.scope {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
        }
    }
}

/// All keys live in a single YAML document on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    location: StoreLocation,
}

impl FileStore {
    pub fn new(location: StoreLocation) -> Self {
        FileStore { location }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    fn read_document(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        let path = &self.location.path;
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(path).map_err(|source| StorageError::Read {
            path: path.clone(),
            source,
        })?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_yaml::from_str(&data).map_err(|source| StorageError::Parse {
            path: path.clone(),
            source,
        })
    }

    fn write_document(&self, doc: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let path = &self.location.path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = serde_yaml::to_string(doc)?;
        fs::write(path, serialized).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })
    }
}

impl Persistence for FileStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.read_document()?.remove(key))
    }

    fn save(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut doc = self.read_document()?;
        doc.insert(key.to_string(), value);
        self.write_document(&doc)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let mut doc = self.read_document()?;
        if doc.remove(key).is_some() {
            self.write_document(&doc)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    data: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.data.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }
}

/// Creates `.weekgrid/calendar.yml` under the current directory if missing.
pub fn init_project_store() -> Result<StoreLocation, StorageError> {
    let cwd = env::current_dir().map_err(|source| StorageError::Read {
        path: PathBuf::from("."),
        source,
    })?;
    let dir = cwd.join(PROJECT_DIR);
    fs::create_dir_all(&dir).map_err(|source| StorageError::Write {
        path: dir.clone(),
        source,
    })?;
    let path = dir.join(DATA_FILE);
    if !path.exists() {
        fs::write(&path, "").map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;
    }
    Ok(StoreLocation {
        path,
        scope: StoreScope::Project,
    })
}

/// Nearest project store above `start`, else the per-user data file.
pub fn locate_store(start: &Path) -> Result<StoreLocation, StorageError> {
    if let Some(project_path) = find_project_store(start) {
        return Ok(StoreLocation {
            path: project_path,
            scope: StoreScope::Project,
        });
    }
    Ok(StoreLocation {
        path: global_store_path()?,
        scope: StoreScope::Global,
    })
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR).join(DATA_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_store_path() -> Result<PathBuf, StorageError> {
    let dirs = ProjectDirs::from("", "", "weekgrid").ok_or(StorageError::NoDataDir)?;
    Ok(dirs.data_dir().join(DATA_FILE))
}
