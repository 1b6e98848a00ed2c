use crate::collision::available_name;
use crate::sanitize::secure_filename;
use crate::traits::{BoxedReader, SeekableReader, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;
use vellum_core::LocalStorageConfig;

/// Size of the buffer used to stream uploads to disk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem storage implementation
///
/// All files live flat in the root directory under their sanitized names.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    overwrite_existing_files: bool,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// The root directory (and its parents) is created if it does not exist.
    pub async fn new(config: LocalStorageConfig) -> StorageResult<Self> {
        let base_path = config.root_path;

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %base_path.display(),
            overwrite_existing_files = config.overwrite_existing_files,
            "Local storage ready"
        );

        Ok(LocalStorage {
            base_path,
            overwrite_existing_files: config.overwrite_existing_files,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Filesystem path for a logical name.
    ///
    /// The name is sanitized first, so the result is always a direct child of
    /// the root directory.
    fn key_to_path(&self, name: &str) -> PathBuf {
        self.base_path.join(self.get_name(name))
    }

    /// Hidden sibling used while a write is in progress.
    ///
    /// Sanitized keys never start with a dot, so this can't shadow a stored file.
    fn temp_path(&self, key: &str) -> PathBuf {
        self.base_path
            .join(format!(".{}.{}.tmp", key, Uuid::new_v4().simple()))
    }

    async fn write_chunks(
        reader: &mut dyn SeekableReader,
        file: &mut fs::File,
        path: &Path,
    ) -> StorageResult<u64> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to read upload stream: {}", e))
            })?;
            if n == 0 {
                break;
            }

            file.write_all(&buf[..n]).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
            })?;
            written += n as u64;
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(written)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn get_name(&self, name: &str) -> String {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        secure_filename(&file_name)
    }

    async fn get_path(&self, name: &str) -> StorageResult<String> {
        Ok(self.key_to_path(name).to_string_lossy().into_owned())
    }

    async fn get_size(&self, name: &str) -> StorageResult<u64> {
        let path = self.key_to_path(name);
        let meta = fs::metadata(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::BackendError(format!(
                "Failed to stat file {}: {}",
                path.display(),
                e
            )),
        })?;

        if !meta.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        Ok(meta.len())
    }

    async fn open(&self, name: &str) -> StorageResult<BoxedReader> {
        if self.get_name(name).is_empty() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let path = self.key_to_path(name);

        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::DownloadFailed(format!(
                "Failed to open file {}: {}",
                path.display(),
                e
            )),
        })?;

        let meta = file.metadata().await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to stat file {}: {}", path.display(), e))
        })?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        tracing::debug!(path = %path.display(), key = %name, "Local storage open");

        Ok(Box::pin(file))
    }

    async fn write(&self, reader: &mut dyn SeekableReader, name: &str) -> StorageResult<String> {
        let key = available_name(self, name).await?;
        let path = self.base_path.join(&key);

        let is_dir = match fs::metadata(&path).await {
            Ok(meta) => meta.is_dir(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                return Err(StorageError::BackendError(format!(
                    "Failed to stat destination {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if is_dir {
            tracing::warn!(
                path = %path.display(),
                key = %key,
                "Destination is a directory, skipping write"
            );
            return Ok(key);
        }

        let start = std::time::Instant::now();

        reader.seek(SeekFrom::Start(0)).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to rewind upload stream: {}", e))
        })?;

        let temp_path = self.temp_path(&key);
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        let written = match Self::write_chunks(reader, &mut file, &temp_path).await {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&temp_path).await;
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage write failed"
                );
                return Err(e);
            }
        };
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(key)
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.key_to_path(name);
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::info!(
            path = %path.display(),
            key = %name,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.base_path.join(key);
        fs::try_exists(&path).await.map_err(|e| {
            StorageError::BackendError(format!("Failed to check {}: {}", path.display(), e))
        })
    }

    fn overwrite_existing_files(&self) -> bool {
        self.overwrite_existing_files
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    async fn storage_in(dir: &Path, overwrite: bool) -> LocalStorage {
        LocalStorage::new(LocalStorageConfig::new(dir).with_overwrite_existing_files(overwrite))
            .await
            .unwrap()
    }

    async fn read_all(storage: &LocalStorage, name: &str) -> Vec<u8> {
        let mut reader = storage.open(name).await.unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        data
    }

    #[tokio::test]
    async fn test_new_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("media");
        let storage = storage_in(&root, true).await;

        assert!(root.is_dir());
        assert_eq!(storage.base_path(), root.as_path());
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }

    #[tokio::test]
    async fn test_local_storage_write_open() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        let mut input = Cursor::new(b"test data".to_vec());
        let key = storage.write(&mut input, "test.txt").await.unwrap();

        assert_eq!(key, "test.txt");
        assert_eq!(read_all(&storage, &key).await, b"test data");
        assert_eq!(storage.get_size(&key).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_write_rewinds_input() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        let mut input = Cursor::new(b"abcdef".to_vec());
        input.set_position(4);
        storage.write(&mut input, "rewound.bin").await.unwrap();

        assert_eq!(read_all(&storage, "rewound.bin").await, b"abcdef");
    }

    #[tokio::test]
    async fn test_path_traversal_is_neutralized() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        let mut input = Cursor::new(b"x".to_vec());
        let key = storage.write(&mut input, "../../etc/passwd").await.unwrap();

        assert_eq!(key, "passwd");
        assert!(dir.path().join("passwd").is_file());
        assert_eq!(
            storage.get_path("../../etc/passwd").await.unwrap(),
            dir.path().join("passwd").to_string_lossy()
        );
    }

    #[tokio::test]
    async fn test_get_name_uses_basename() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        assert_eq!(storage.get_name("uploads/My Photo.JPG"), "My_Photo.JPG");
        assert_eq!(storage.get_name("example.txt"), "example.txt");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        assert!(matches!(
            storage.get_size("missing.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.open("missing.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_unusable_name_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        for name in ["???", "", "..", "/"] {
            assert!(
                matches!(storage.open(name).await, Err(StorageError::NotFound(_))),
                "name {:?} should not open the root",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_open_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;
        std::fs::create_dir(dir.path().join("folder")).unwrap();

        assert!(matches!(
            storage.get_size("folder").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.open("folder").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_surfaces_destination_stat_errors() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let storage = storage_in(&root, true).await;
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root bypasses permission bits, so there is nothing to observe.
        let blocked = std::fs::metadata(root.join("x.txt"))
            .map(|_| false)
            .unwrap_or_else(|e| e.kind() == ErrorKind::PermissionDenied);

        let result = storage
            .write(&mut Cursor::new(b"data".to_vec()), "x.txt")
            .await;
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o755)).unwrap();

        if blocked {
            assert!(matches!(result, Err(StorageError::BackendError(_))));
        }
    }

    #[tokio::test]
    async fn test_local_storage_delete() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        let mut input = Cursor::new(b"bye".to_vec());
        let key = storage.write(&mut input, "gone.txt").await.unwrap();
        storage.delete(&key).await.unwrap();

        assert!(!storage.exists(&key).await.unwrap());
        assert!(storage.get_size(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        let result = storage.delete("nonexistent.txt").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        storage
            .write(&mut Cursor::new(b"first".to_vec()), "same.txt")
            .await
            .unwrap();
        let key = storage
            .write(&mut Cursor::new(b"second".to_vec()), "same.txt")
            .await
            .unwrap();

        assert_eq!(key, "same.txt");
        assert_eq!(read_all(&storage, "same.txt").await, b"second");
    }

    #[tokio::test]
    async fn test_no_overwrite_keeps_both() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), false).await;

        let first = storage
            .write(&mut Cursor::new(b"first".to_vec()), "same.txt")
            .await
            .unwrap();
        let second = storage
            .write(&mut Cursor::new(b"second".to_vec()), "same.txt")
            .await
            .unwrap();

        assert_eq!(first, "same.txt");
        assert_eq!(second, "same_1.txt");
        assert_eq!(read_all(&storage, &first).await, b"first");
        assert_eq!(read_all(&storage, &second).await, b"second");
    }

    #[tokio::test]
    async fn test_directory_destination_is_skipped() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;
        std::fs::create_dir(dir.path().join("folder")).unwrap();

        let key = storage
            .write(&mut Cursor::new(b"data".to_vec()), "folder")
            .await
            .unwrap();

        assert_eq!(key, "folder");
        assert!(dir.path().join("folder").is_dir());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path(), true).await;

        storage
            .write(&mut Cursor::new(vec![7u8; CHUNK_SIZE * 2 + 5]), "big.bin")
            .await
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["big.bin".to_string()]);
    }
}
