//! Configuration module
//!
//! This module provides configuration structures for the storage backends.
//! Values are explicit struct fields; environment variables are only consulted
//! when a configuration is built (`from_env`, `S3StorageConfig::new`), never
//! cached process-wide.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const DEFAULT_REGION: &str = "us-east-1";
const QUERYSTRING_EXPIRE_SECS: u64 = 3600;

/// Filesystem backend configuration
#[derive(Clone, Debug)]
pub struct LocalStorageConfig {
    pub root_path: PathBuf,
    pub overwrite_existing_files: bool,
}

impl LocalStorageConfig {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            overwrite_existing_files: true,
        }
    }

    pub fn with_overwrite_existing_files(mut self, overwrite: bool) -> Self {
        self.overwrite_existing_files = overwrite;
        self
    }
}

/// S3-compatible object store configuration
#[derive(Clone)]
pub struct S3StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Endpoint host without a URL scheme (e.g. "s3.eu-west-1.amazonaws.com", "localhost:9000")
    pub endpoint_host: String,
    pub use_ssl: bool,
    /// Canned ACL applied to uploaded objects (e.g. "public-read"). Objects are private when unset.
    pub default_acl: Option<String>,
    /// Serve presigned GET URLs instead of plain object URLs
    pub querystring_auth: bool,
    pub querystring_expire: Duration,
    /// Domain used for serving object URLs (e.g. a CDN in front of the bucket)
    pub custom_domain: Option<String>,
    pub region: String,
    pub overwrite_existing_files: bool,
}

impl std::fmt::Debug for S3StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3StorageConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("endpoint_host", &self.endpoint_host)
            .field("use_ssl", &self.use_ssl)
            .field("default_acl", &self.default_acl)
            .field("querystring_auth", &self.querystring_auth)
            .field("querystring_expire", &self.querystring_expire)
            .field("custom_domain", &self.custom_domain)
            .field("region", &self.region)
            .field("overwrite_existing_files", &self.overwrite_existing_files)
            .finish()
    }
}

impl S3StorageConfig {
    /// Create a configuration for `bucket` served from `endpoint_host`.
    ///
    /// Credentials default to `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
    /// as they are set when this is called.
    pub fn new(bucket: impl Into<String>, endpoint_host: impl Into<String>) -> Self {
        Self {
            access_key: env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_key: env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            bucket: bucket.into(),
            endpoint_host: endpoint_host.into(),
            use_ssl: true,
            default_acl: None,
            querystring_auth: false,
            querystring_expire: Duration::from_secs(QUERYSTRING_EXPIRE_SECS),
            custom_domain: None,
            region: DEFAULT_REGION.to_string(),
            overwrite_existing_files: true,
        }
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    pub fn with_use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_default_acl(mut self, acl: impl Into<String>) -> Self {
        self.default_acl = Some(acl.into());
        self
    }

    pub fn with_querystring_auth(mut self, enabled: bool) -> Self {
        self.querystring_auth = enabled;
        self
    }

    pub fn with_querystring_expire(mut self, expire: Duration) -> Self {
        self.querystring_expire = expire;
        self
    }

    pub fn with_custom_domain(mut self, domain: impl Into<String>) -> Self {
        self.custom_domain = Some(domain.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_overwrite_existing_files(mut self, overwrite: bool) -> Self {
        self.overwrite_existing_files = overwrite;
        self
    }

    /// "https" or "http" depending on `use_ssl`
    pub fn http_scheme(&self) -> &'static str {
        if self.use_ssl {
            "https"
        } else {
            "http"
        }
    }

    /// Check the settings that can be rejected without talking to the endpoint.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let endpoint = self.endpoint_host.trim().to_lowercase();
        if endpoint.contains("://") {
            return Err(anyhow::anyhow!(
                "S3 endpoint host must not contain a URL scheme: {}",
                self.endpoint_host
            ));
        }

        if endpoint.is_empty() {
            return Err(anyhow::anyhow!("S3 endpoint host must be set"));
        }

        if self.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("S3 bucket name must be set"));
        }

        Ok(())
    }
}

/// Storage configuration: the selected backend plus its settings.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local: Option<LocalStorageConfig>,
    pub s3: Option<S3StorageConfig>,
}

impl StorageConfig {
    pub fn local(config: LocalStorageConfig) -> Self {
        Self {
            backend: StorageBackend::Local,
            local: Some(config),
            s3: None,
        }
    }

    pub fn s3(config: S3StorageConfig) -> Self {
        Self {
            backend: StorageBackend::S3,
            local: None,
            s3: Some(config),
        }
    }

    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let overwrite_existing_files =
            parse_bool(&lookup, "STORAGE_OVERWRITE_EXISTING_FILES", true)?;

        let config = match backend {
            StorageBackend::Local => {
                let root_path = lookup("LOCAL_STORAGE_PATH").ok_or_else(|| {
                    anyhow::anyhow!("LOCAL_STORAGE_PATH must be set for the local backend")
                })?;

                Self::local(
                    LocalStorageConfig::new(root_path)
                        .with_overwrite_existing_files(overwrite_existing_files),
                )
            }
            StorageBackend::S3 => {
                let bucket = lookup("AWS_S3_BUCKET_NAME").ok_or_else(|| {
                    anyhow::anyhow!("AWS_S3_BUCKET_NAME must be set for the s3 backend")
                })?;
                let endpoint_host = lookup("AWS_S3_ENDPOINT_URL").ok_or_else(|| {
                    anyhow::anyhow!("AWS_S3_ENDPOINT_URL must be set for the s3 backend")
                })?;
                let querystring_expire = lookup("AWS_QUERYSTRING_EXPIRE")
                    .map(|s| {
                        s.trim().parse::<u64>().map_err(|_| {
                            anyhow::anyhow!("AWS_QUERYSTRING_EXPIRE must be a number of seconds")
                        })
                    })
                    .transpose()?
                    .unwrap_or(QUERYSTRING_EXPIRE_SECS);

                let s3 = S3StorageConfig {
                    access_key: lookup("AWS_ACCESS_KEY_ID").unwrap_or_default(),
                    secret_key: lookup("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
                    bucket,
                    endpoint_host,
                    use_ssl: parse_bool(&lookup, "AWS_S3_USE_SSL", true)?,
                    default_acl: lookup("AWS_DEFAULT_ACL").filter(|s| !s.trim().is_empty()),
                    querystring_auth: parse_bool(&lookup, "AWS_QUERYSTRING_AUTH", false)?,
                    querystring_expire: Duration::from_secs(querystring_expire),
                    custom_domain: lookup("AWS_S3_CUSTOM_DOMAIN")
                        .filter(|s| !s.trim().is_empty()),
                    region: lookup("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                    overwrite_existing_files,
                };

                Self::s3(s3)
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.backend {
            StorageBackend::Local => {
                if self.local.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH to be set"
                    ));
                }
            }
            StorageBackend::S3 => match self.s3 {
                Some(ref s3) => s3.validate()?,
                None => {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=s3 requires the AWS_S3_* settings"
                    ))
                }
            },
        }
        Ok(())
    }

    pub fn overwrite_existing_files(&self) -> bool {
        match self.backend {
            StorageBackend::Local => self
                .local
                .as_ref()
                .map(|c| c.overwrite_existing_files)
                .unwrap_or(true),
            StorageBackend::S3 => self
                .s3
                .as_ref()
                .map(|c| c.overwrite_existing_files)
                .unwrap_or(true),
        }
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!("{} must be a boolean, got {:?}", key, value)),
        },
    }
}
