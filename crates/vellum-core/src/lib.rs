//! Vellum Core Library
//!
//! This crate provides the backend kind and the configuration structures
//! shared by the storage library and the command-line tool.

pub mod config;
pub mod storage_types;

// Re-export commonly used types
pub use config::{LocalStorageConfig, S3StorageConfig, StorageConfig};
pub use storage_types::StorageBackend;
