use directories::ProjectDirs;
use doc_model::StoredRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const LIBRARY_FILE_NAME: &str = "pdf-library.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persisted metadata for the whole library. Every save replaces the
/// previous contents in full.
pub trait MetadataStore {
    fn load_all(&self) -> Result<Vec<StoredRecord>, StorageError>;
    fn save_all(&mut self, records: &[StoredRecord]) -> Result<(), StorageError>;
}

impl<S: MetadataStore + ?Sized> MetadataStore for Box<S> {
    fn load_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
        (**self).load_all()
    }

    fn save_all(&mut self, records: &[StoredRecord]) -> Result<(), StorageError> {
        (**self).save_all(records)
    }
}

pub fn default_data_root() -> Result<PathBuf, StorageError> {
    let dirs =
        ProjectDirs::from("dev", "PdfShelf", "PdfShelf").ok_or(StorageError::NoDataDirectory)?;

    Ok(dirs.data_local_dir().to_path_buf())
}

/// Stores the library as a single JSON array file under a data root.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn from_default_project() -> Result<Self, StorageError> {
        Ok(Self { root: default_data_root()? })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn library_path(&self) -> PathBuf {
        self.root.join(LIBRARY_FILE_NAME)
    }
}

impl MetadataStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
        let path = self.library_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(&path)?;
        let records: Vec<StoredRecord> = serde_json::from_slice(&bytes)?;

        debug!(count = records.len(), path = %path.display(), "loaded library metadata");
        Ok(records)
    }

    fn save_all(&mut self, records: &[StoredRecord]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let bytes = serde_json::to_vec(records)?;
        let path = self.library_path();
        fs::write(&path, bytes)?;

        debug!(count = records.len(), path = %path.display(), "saved library metadata");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<StoredRecord>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<StoredRecord>) -> Self {
        Self { records, saves: 0 }
    }

    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }

    /// Number of `save_all` calls so far.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl MetadataStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
        Ok(self.records.clone())
    }

    fn save_all(&mut self, records: &[StoredRecord]) -> Result<(), StorageError> {
        self.records = records.to_vec();
        self.saves += 1;
        Ok(())
    }
}
