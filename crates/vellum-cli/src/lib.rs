use serde::Serialize;
use vellum_storage::{StorageFile, StorageResult};

/// What `vellum stat` and `vellum put` print for a stored file.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
}

impl FileInfo {
    pub async fn of(file: &StorageFile) -> StorageResult<Self> {
        Ok(Self {
            name: file.name(),
            path: file.path().await?,
            size: file.size().await?,
        })
    }
}

/// Default logical name for a local file: its final path component.
pub fn default_name(path: &std::path::Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Initialize tracing for CLI binaries.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;
    use vellum_core::LocalStorageConfig;
    use vellum_storage::LocalStorage;

    #[test]
    fn default_name_is_basename() {
        assert_eq!(
            default_name(Path::new("/home/me/Report 2024.pdf")).as_deref(),
            Some("Report 2024.pdf")
        );
        assert_eq!(default_name(Path::new("/")), None);
    }

    #[tokio::test]
    async fn file_info_serializes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abcd").unwrap();
        let storage = LocalStorage::new(LocalStorageConfig::new(dir.path()))
            .await
            .unwrap();

        let info = FileInfo::of(&StorageFile::new("a.txt", Arc::new(storage)))
            .await
            .unwrap();

        assert_eq!(info.name, "a.txt");
        assert_eq!(info.size, 4);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["size"], 4);
        assert_eq!(json["path"], dir.path().join("a.txt").to_string_lossy().into_owned());
    }
}
