//! Whole-document JSON storage.
//!
//! A store holds exactly one document. Callers load the full document, change
//! it in memory and save it back; there is no partial update.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored document is unreadable: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store is unavailable")]
    Unavailable,
}

/// Persistence seam for a single JSON document.
#[async_trait]
pub trait DocumentStore<T>: Send + Sync
where
    T: Default + Send + Sync,
{
    /// Read the current document. A missing document is `T::default()`;
    /// anything unreadable is an error.
    async fn try_load(&self) -> Result<T, StoreError>;

    /// Read the current document, degrading to `T::default()` when it cannot
    /// be read. Never use the result as the base of a `save`.
    async fn load(&self) -> T {
        match self.try_load().await {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(error = %err, "document unreadable, treating as empty");
                T::default()
            }
        }
    }

    /// Replace the persisted document.
    async fn save(&self, document: &T) -> Result<(), StoreError>;
}

/// Flat-file store writing pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl<T> DocumentStore<T> for JsonFileStore
where
    T: Default + Serialize + DeserializeOwned + Send + Sync,
{
    async fn try_load(&self) -> Result<T, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "data file missing, starting empty");
                return Ok(T::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|err| {
            tracing::warn!(path = %self.path.display(), error = %err, "data file is corrupt");
            StoreError::Corrupt(err)
        })
    }

    async fn save(&self, document: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        // Readers never observe a half-written file.
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| self.write_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "document saved");
        Ok(())
    }
}

/// In-memory store. Holds the serialized form so loads never alias saved values.
#[derive(Debug, Default)]
pub struct MemoryStore {
    json: Mutex<Option<String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an initial document.
    pub fn with_document<T: Serialize>(document: &T) -> Result<Self, StoreError> {
        Ok(Self::with_raw(serde_json::to_string(document)?))
    }

    /// Seed the store with raw text, which need not be valid for any document type.
    pub fn with_raw(json: impl Into<String>) -> Self {
        let store = Self::new();
        *store.lock() = Some(json.into());
        store
    }

    /// Make every subsequent `save` fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock still holds a complete document.
        self.json.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<T> DocumentStore<T> for MemoryStore
where
    T: Default + Serialize + DeserializeOwned + Send + Sync,
{
    async fn try_load(&self) -> Result<T, StoreError> {
        match self.lock().as_deref() {
            Some(json) => serde_json::from_str(json).map_err(StoreError::Corrupt),
            None => Ok(T::default()),
        }
    }

    async fn save(&self, document: &T) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        let json = serde_json::to_string(document)?;
        *self.lock() = Some(json);
        Ok(())
    }
}
