use crate::collision::available_name;
use crate::sanitize::secure_filename;
use crate::traits::{BoxedReader, SeekableReader, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ClientOptions, ObjectStore, ObjectStoreExt, Result as ObjectResult};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use vellum_core::S3StorageConfig;

const ACL_HEADER: &str = "x-amz-acl";

/// S3-compatible object store implementation
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn ObjectStore>,
    signer: Option<AmazonS3>,
    config: S3StorageConfig,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Builds an S3 client for `scheme://endpoint_host` with path-style
    /// addressing. Nothing is sent over the network until the first operation.
    /// An endpoint that carries a URL scheme, an empty bucket, or client
    /// settings the SDK rejects fail with `StorageError::ConfigError`.
    pub fn new(config: S3StorageConfig) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let endpoint = format!("{}://{}", config.http_scheme(), config.endpoint_host);

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(config.bucket.clone())
            .with_region(config.region.clone())
            .with_endpoint(endpoint.clone())
            .with_allow_http(!config.use_ssl)
            .with_virtual_hosted_style_request(false);

        if !config.access_key.is_empty() {
            builder = builder
                .with_access_key_id(config.access_key.clone())
                .with_secret_access_key(config.secret_key.clone());
        }

        if let Some(ref acl) = config.default_acl {
            let value = HeaderValue::from_str(acl).map_err(|e| {
                StorageError::ConfigError(format!("Invalid default ACL {:?}: {}", acl, e))
            })?;
            let mut headers = HeaderMap::new();
            headers.insert(HeaderName::from_static(ACL_HEADER), value);
            builder = builder.with_client_options(ClientOptions::new().with_default_headers(headers));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        tracing::info!(
            bucket = %config.bucket,
            endpoint = %endpoint,
            querystring_auth = config.querystring_auth,
            custom_domain = config.custom_domain.as_deref().unwrap_or(""),
            overwrite_existing_files = config.overwrite_existing_files,
            "S3 storage ready"
        );

        Ok(S3Storage {
            store: Arc::new(store.clone()),
            signer: Some(store),
            config,
        })
    }

    /// Wrap an already constructed object store.
    ///
    /// The store has no URL signer, so a configuration asking for presigned
    /// URLs is rejected with `StorageError::ConfigError`.
    pub fn with_store(config: S3StorageConfig, store: Arc<dyn ObjectStore>) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        if config.querystring_auth {
            return Err(StorageError::ConfigError(
                "Query string authentication requires a signing S3 client".to_string(),
            ));
        }

        Ok(S3Storage {
            store,
            signer: None,
            config,
        })
    }

    pub fn config(&self) -> &S3StorageConfig {
        &self.config
    }

    /// Plain object URL: {scheme}://{endpoint}/{bucket}/{key}
    fn generate_url(&self, key: &str) -> String {
        format!(
            "{}://{}/{}/{}",
            self.config.http_scheme(),
            self.config.endpoint_host.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }

    async fn presigned_url(&self, key: &str) -> StorageResult<String> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            StorageError::ConfigError("No signing client configured".to_string())
        })?;

        let location = Path::from(key.to_string());
        let url_result: ObjectResult<_> = signer
            .signed_url(Method::GET, &location, self.config.querystring_expire)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(url)
    }
}

#[async_trait]
impl Storage for S3Storage {
    /// Keys keep their `/`-separated prefix; each component is sanitized and
    /// empty components (including `..` and `.`) are dropped.
    fn get_name(&self, name: &str) -> String {
        name.split(['/', '\\'])
            .map(secure_filename)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn get_path(&self, name: &str) -> StorageResult<String> {
        let key = self.get_name(name);

        if let Some(ref domain) = self.config.custom_domain {
            return Ok(format!(
                "{}://{}/{}",
                self.config.http_scheme(),
                domain.trim_end_matches('/'),
                key
            ));
        }

        if self.config.querystring_auth {
            return self.presigned_url(&key).await;
        }

        Ok(self.generate_url(&key))
    }

    async fn get_size(&self, name: &str) -> StorageResult<u64> {
        let key = self.get_name(name);
        let location = Path::from(key.clone());

        let meta = self.store.head(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.clone()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.config.bucket,
                    key = %key,
                    "S3 head failed"
                );
                StorageError::BackendError(other.to_string())
            }
        })?;

        Ok(meta.size)
    }

    async fn open(&self, name: &str) -> StorageResult<BoxedReader> {
        let start = std::time::Instant::now();
        let key = self.get_name(name);
        let location = Path::from(key.clone());

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.clone()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.config.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        tracing::debug!(
            bucket = %self.config.bucket,
            key = %key,
            size_bytes = result.meta.size,
            "S3 open"
        );

        Ok(Box::pin(StreamReader::new(result.into_stream())))
    }

    async fn write(&self, reader: &mut dyn SeekableReader, name: &str) -> StorageResult<String> {
        let key = available_name(self, name).await?;
        let start = std::time::Instant::now();

        reader.seek(SeekFrom::Start(0)).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to rewind upload stream: {}", e))
        })?;

        let location = Path::from(key.clone());
        let mut writer = BufWriter::new(Arc::clone(&self.store), location);

        let uploaded = match tokio::io::copy(reader, &mut writer).await {
            Ok(size) => writer.shutdown().await.map(|_| size),
            Err(e) => Err(e),
        };

        let size = match uploaded {
            Ok(size) => size,
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(
                        error = %abort_err,
                        key = %key,
                        "Failed to abort S3 upload"
                    );
                }
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                return Err(StorageError::UploadFailed(e.to_string()));
            }
        };

        tracing::info!(
            bucket = %self.config.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(key)
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let key = self.get_name(name);
        let location = Path::from(key.clone());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.config.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Path::from(key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn overwrite_existing_files(&self) -> bool {
        self.config.overwrite_existing_files
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
