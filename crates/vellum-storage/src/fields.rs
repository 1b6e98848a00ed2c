//! Upload adapters that turn an uploaded file into a stored name and back.
//!
//! These sit in front of the backends: they detect empty uploads, validate
//! images, and produce the value an application would persist (the final
//! stored name). Storage errors pass through unchanged; only these adapters
//! raise `FieldError::Validation`.

use crate::handle::{StorageFile, StorageImage};
use crate::traits::{SeekableReader, Storage, StorageError};
use image::ImageReader;
use std::io::{Cursor, SeekFrom};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded file: the client-supplied filename plus its content.
pub struct UploadFile {
    pub filename: String,
    pub file: Box<dyn SeekableReader>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, file: Box<dyn SeekableReader>) -> Self {
        Self {
            filename: filename.into(),
            file,
        }
    }

    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::new(filename, Box::new(Cursor::new(data.into())))
    }

    /// Whether the upload has no content. Leaves the reader at offset 0.
    async fn is_empty(&mut self) -> Result<bool, FieldError> {
        let mut probe = [0u8; 1];
        let read = self.file.read(&mut probe).await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(read == 0)
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Stores arbitrary files.
#[derive(Clone)]
pub struct FileField {
    storage: Arc<dyn Storage>,
}

impl FileField {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store an upload and return the name it was stored under.
    ///
    /// A missing or empty upload stores nothing and yields `None`.
    pub async fn store(&self, upload: Option<UploadFile>) -> Result<Option<String>, FieldError> {
        let Some(mut upload) = upload else {
            return Ok(None);
        };
        if upload.is_empty().await? {
            tracing::debug!(filename = %upload.filename, "Empty upload ignored");
            return Ok(None);
        }

        let mut file = StorageFile::new(upload.filename, Arc::clone(&self.storage));
        file.write(upload.file.as_mut()).await?;
        Ok(Some(file.name()))
    }

    /// Handle for a previously stored name.
    pub fn load(&self, value: Option<String>) -> Option<StorageFile> {
        value.map(|name| StorageFile::new(name, Arc::clone(&self.storage)))
    }
}

/// Stores images after checking that the payload decodes as one.
#[derive(Clone)]
pub struct ImageField {
    storage: Arc<dyn Storage>,
}

impl ImageField {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Validate and store an uploaded image, returning its stored name.
    ///
    /// A missing or empty upload yields `None`; content that is not a
    /// recognizable image fails with `FieldError::Validation`.
    pub async fn store(&self, upload: Option<UploadFile>) -> Result<Option<String>, FieldError> {
        let Some(mut upload) = upload else {
            return Ok(None);
        };
        if upload.is_empty().await? {
            tracing::debug!(filename = %upload.filename, "Empty upload ignored");
            return Ok(None);
        }

        let mut data = Vec::new();
        upload.file.read_to_end(&mut data).await?;
        let (width, height) = image_dimensions(&data).map_err(|e| {
            tracing::debug!(filename = %upload.filename, error = %e, "Rejected invalid image");
            e
        })?;

        let mut image = StorageImage::new(
            upload.filename,
            Arc::clone(&self.storage),
            height,
            width,
        );
        image.write(upload.file.as_mut()).await?;
        Ok(Some(image.name()))
    }

    /// Handle for a previously stored image, with dimensions read back from
    /// the stored bytes.
    pub async fn load(&self, value: Option<String>) -> Result<Option<StorageImage>, FieldError> {
        let Some(name) = value else {
            return Ok(None);
        };

        let mut reader = self.storage.open(&name).await?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let (width, height) = image_dimensions(&data)?;

        Ok(Some(StorageImage::new(
            name,
            Arc::clone(&self.storage),
            height,
            width,
        )))
    }
}

/// `(width, height)` of an encoded image, with the format guessed from its signature.
fn image_dimensions(data: &[u8]) -> Result<(u32, u32), FieldError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| FieldError::Validation("Invalid image file".to_string()))?
        .into_dimensions()
        .map_err(|_| FieldError::Validation("Invalid image file".to_string()))
}
