// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Storage error types.

use std::sync::Arc;

use crate::time::TimeError;

/// Errors that can occur in storage operations.
///
/// Cloneable so that a failed reader can hand the same error to every later
/// caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("storage corruption: {0}")]
    Corruption(String),

    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("invalid time encoding: {0}")]
    InvalidTime(#[from] TimeError),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
