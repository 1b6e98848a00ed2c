//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Existence check failed for {name}")]
    CollisionProbe {
        name: String,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Readable byte stream returned by [`Storage::open`].
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Input accepted by [`Storage::write`]: a reader that can be rewound.
pub trait SeekableReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized> SeekableReader for T {}

/// Storage abstraction trait
///
/// All storage backends (S3-compatible object stores, local filesystem) must
/// implement this trait. Every method takes the caller's logical name and
/// derives the backend key itself; nothing about existing keys is cached.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Normalized key for a logical name, using this backend's naming rules.
    fn get_name(&self, name: &str) -> String;

    /// Fully resolved location: an absolute filesystem path, or an object URL
    /// (plain, presigned or on a custom domain).
    async fn get_path(&self, name: &str) -> StorageResult<String>;

    /// Size in bytes of the stored object.
    ///
    /// Returns `StorageError::NotFound` if nothing is stored under the name.
    async fn get_size(&self, name: &str) -> StorageResult<u64>;

    /// Open the stored object for reading from offset 0.
    ///
    /// Returns `StorageError::NotFound` if nothing is stored under the name.
    async fn open(&self, name: &str) -> StorageResult<BoxedReader>;

    /// Write `reader` (rewound to offset 0 first) under `name`.
    ///
    /// Returns the key that was actually written, after sanitization and, when
    /// overwriting is disabled, collision resolution.
    async fn write(&self, reader: &mut dyn SeekableReader, name: &str) -> StorageResult<String>;

    /// Delete the stored object. Deleting a missing key is not an error.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    /// Check whether a sanitized key is currently stored.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Whether `write` may replace an existing object of the same key.
    fn overwrite_existing_files(&self) -> bool;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
