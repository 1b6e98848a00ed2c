//! Filename collision resolution.
//!
//! When a backend is configured not to overwrite existing files, the desired
//! key is probed with [`Storage::exists`] and, while taken, retried as
//! `{stem}_{n}{suffix}` with `n = 1, 2, ...`. The first write of a name keeps
//! it unsuffixed.
//!
//! The probe and the following write are separate calls against the medium,
//! so two concurrent writers of the same name can both pick the same free
//! key; the later write wins. No locking is done here.

use crate::sanitize::split_extension;
use crate::traits::{Storage, StorageError, StorageResult};

/// Resolve `name` to the key a write should use on `storage`.
///
/// With overwriting allowed this is just `storage.get_name(name)`. Otherwise
/// the returned key did not exist at the time it was probed. A failing
/// probe aborts with `StorageError::CollisionProbe` instead of being treated
/// as "free".
pub async fn available_name<S>(storage: &S, name: &str) -> StorageResult<String>
where
    S: Storage + ?Sized,
{
    let key = storage.get_name(name);
    if key.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "{:?} has no usable characters",
            name
        )));
    }

    if storage.overwrite_existing_files() {
        return Ok(key);
    }

    let (dir, file_name) = match key.rfind('/') {
        Some(idx) => key.split_at(idx + 1),
        None => ("", key.as_str()),
    };
    let (stem, suffix) = split_extension(file_name);

    let mut candidate = key.clone();
    let mut counter: u64 = 0;

    while probe(storage, &candidate).await? {
        counter += 1;
        candidate = storage.get_name(&format!("{}{}_{}{}", dir, stem, counter, suffix));
        tracing::debug!(
            requested = %key,
            candidate = %candidate,
            attempt = counter,
            "Key taken, trying next suffix"
        );
    }

    if counter > 0 {
        tracing::info!(
            requested = %key,
            resolved = %candidate,
            "Renamed upload to avoid overwriting an existing file"
        );
    }

    Ok(candidate)
}

async fn probe<S>(storage: &S, key: &str) -> StorageResult<bool>
where
    S: Storage + ?Sized,
{
    storage.exists(key).await.map_err(|e| {
        tracing::error!(key = %key, error = %e, "Existence check failed during name resolution");
        StorageError::CollisionProbe {
            name: key.to_string(),
            source: Box::new(e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::secure_filename;
    use crate::traits::{BoxedReader, SeekableReader};
    use crate::StorageBackend;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory key set; only the methods name resolution touches do anything.
    struct KeySet {
        keys: Mutex<HashSet<String>>,
        overwrite: bool,
        fail_probe: bool,
    }

    impl KeySet {
        fn new(keys: &[&str], overwrite: bool) -> Self {
            Self {
                keys: Mutex::new(keys.iter().map(|k| k.to_string()).collect()),
                overwrite,
                fail_probe: false,
            }
        }
    }

    #[async_trait]
    impl Storage for KeySet {
        fn get_name(&self, name: &str) -> String {
            name.split('/')
                .map(secure_filename)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("/")
        }

        async fn get_path(&self, name: &str) -> StorageResult<String> {
            Ok(self.get_name(name))
        }

        async fn get_size(&self, name: &str) -> StorageResult<u64> {
            Err(StorageError::NotFound(name.to_string()))
        }

        async fn open(&self, name: &str) -> StorageResult<BoxedReader> {
            Err(StorageError::NotFound(name.to_string()))
        }

        async fn write(
            &self,
            _reader: &mut dyn SeekableReader,
            name: &str,
        ) -> StorageResult<String> {
            let key = available_name(self, name).await?;
            self.keys.lock().unwrap().insert(key.clone());
            Ok(key)
        }

        async fn delete(&self, name: &str) -> StorageResult<()> {
            self.keys.lock().unwrap().remove(&self.get_name(name));
            Ok(())
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            if self.fail_probe {
                return Err(StorageError::BackendError("permission denied".to_string()));
            }
            Ok(self.keys.lock().unwrap().contains(key))
        }

        fn overwrite_existing_files(&self) -> bool {
            self.overwrite
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Local
        }
    }

    #[tokio::test]
    async fn overwrite_allowed_skips_probe() {
        let storage = KeySet {
            fail_probe: true,
            ..KeySet::new(&["report.pdf"], true)
        };
        assert_eq!(available_name(&storage, "report.pdf").await.unwrap(), "report.pdf");
    }

    #[tokio::test]
    async fn free_name_is_kept() {
        let storage = KeySet::new(&[], false);
        assert_eq!(
            available_name(&storage, "my report.pdf").await.unwrap(),
            "my_report.pdf"
        );
    }

    #[tokio::test]
    async fn taken_names_get_next_suffix() {
        let storage = KeySet::new(&["photo.jpg", "photo_1.jpg", "photo_2.jpg"], false);
        assert_eq!(available_name(&storage, "photo.jpg").await.unwrap(), "photo_3.jpg");
    }

    #[tokio::test]
    async fn suffix_goes_before_last_extension() {
        let storage = KeySet::new(&["backup.tar.gz"], false);
        assert_eq!(
            available_name(&storage, "backup.tar.gz").await.unwrap(),
            "backup.tar_1.gz"
        );

        let storage = KeySet::new(&["Makefile"], false);
        assert_eq!(available_name(&storage, "Makefile").await.unwrap(), "Makefile_1");
    }

    #[tokio::test]
    async fn prefix_directories_are_preserved() {
        let storage = KeySet::new(&["docs.v2/readme.md"], false);
        assert_eq!(
            available_name(&storage, "docs.v2/readme.md").await.unwrap(),
            "docs.v2/readme_1.md"
        );
    }

    #[tokio::test]
    async fn repeated_writes_are_suffixed_in_order() {
        let storage = KeySet::new(&[], false);
        let mut reader = std::io::Cursor::new(Vec::new());

        let mut names = Vec::new();
        for _ in 0..3 {
            names.push(storage.write(&mut reader, "duplicate.txt").await.unwrap());
        }

        assert_eq!(names, ["duplicate.txt", "duplicate_1.txt", "duplicate_2.txt"]);
    }

    #[tokio::test]
    async fn probe_failure_aborts() {
        let storage = KeySet {
            fail_probe: true,
            ..KeySet::new(&[], false)
        };
        let err = available_name(&storage, "file.txt").await.unwrap_err();
        match err {
            StorageError::CollisionProbe { name, source } => {
                assert_eq!(name, "file.txt");
                assert!(matches!(*source, StorageError::BackendError(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let storage = KeySet::new(&[], false);
        let err = available_name(&storage, "???").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
