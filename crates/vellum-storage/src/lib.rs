//! Vellum Storage Library
//!
//! This crate stores uploaded files under logical names and resolves those
//! names back to a reader, a path or URL, and a size, whether the bytes live
//! on the local filesystem or in an S3-compatible object store.
//!
//! # Naming
//!
//! Every backend runs logical names through [`secure_filename`] before
//! touching the medium. The local backend stores files flat under the root
//! directory; the S3 backend keeps `/`-separated prefixes and sanitizes each
//! component.
//!
//! When a backend is configured with `overwrite_existing_files = false`, a
//! write whose key is already taken is stored as `{stem}_{n}{suffix}` instead
//! (see [`collision`]); the key actually written is returned to the caller.

pub mod collision;
pub mod factory;
pub mod fields;
pub mod handle;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod sanitize;
pub mod traits;

// Re-export commonly used types
pub use collision::available_name;
pub use factory::create_storage;
pub use fields::{FieldError, FileField, ImageField, UploadFile};
pub use handle::{StorageFile, StorageImage};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use sanitize::secure_filename;
pub use traits::{BoxedReader, SeekableReader, Storage, StorageError, StorageResult};
pub use vellum_core::StorageBackend;
