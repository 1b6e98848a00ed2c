//! File handles bound to a storage backend.

use crate::traits::{BoxedReader, SeekableReader, Storage, StorageResult};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A logical file name bound to a backend.
///
/// The handle is a view, not a cache: `name`, `path` and `size` ask the
/// backend every time, so they always reflect what is stored right now.
#[derive(Clone)]
pub struct StorageFile {
    name: String,
    storage: Arc<dyn Storage>,
}

impl StorageFile {
    pub fn new(name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            name: name.into(),
            storage,
        }
    }

    /// File name including extension, as the backend normalizes it.
    pub fn name(&self) -> String {
        self.storage.get_name(&self.name)
    }

    /// Complete file path or URL.
    pub async fn path(&self) -> StorageResult<String> {
        self.storage.get_path(&self.name).await
    }

    /// File size in bytes.
    pub async fn size(&self) -> StorageResult<u64> {
        self.storage.get_size(&self.name).await
    }

    /// Open a reader over the stored bytes.
    pub async fn open(&self) -> StorageResult<BoxedReader> {
        self.storage.open(&self.name).await
    }

    /// Write `reader` to the backend under this handle's name.
    ///
    /// If the backend stored it under a different key (sanitized, or renamed
    /// to avoid an overwrite), the handle takes that key as its name.
    pub async fn write(&mut self, reader: &mut dyn SeekableReader) -> StorageResult<String> {
        let key = self.storage.write(reader, &self.name).await?;
        self.name.clone_from(&key);
        Ok(key)
    }

    pub async fn delete(&self) -> StorageResult<()> {
        self.storage.delete(&self.name).await
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl Display for StorageFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.name())
    }
}

impl std::fmt::Debug for StorageFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StorageFile")
            .field("name", &self.name)
            .field("backend", &self.storage.backend_type())
            .finish()
    }
}

/// A [`StorageFile`] with image dimensions.
///
/// Height and width are supplied by whoever decoded the image; the backend
/// never looks at image bytes.
#[derive(Clone, Debug)]
pub struct StorageImage {
    file: StorageFile,
    height: u32,
    width: u32,
}

impl StorageImage {
    pub fn new(
        name: impl Into<String>,
        storage: Arc<dyn Storage>,
        height: u32,
        width: u32,
    ) -> Self {
        Self {
            file: StorageFile::new(name, storage),
            height,
            width,
        }
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn into_file(self) -> StorageFile {
        self.file
    }
}

impl Deref for StorageImage {
    type Target = StorageFile;

    fn deref(&self) -> &StorageFile {
        &self.file
    }
}

impl DerefMut for StorageImage {
    fn deref_mut(&mut self) -> &mut StorageFile {
        &mut self.file
    }
}

impl Display for StorageImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.file, f)
    }
}
