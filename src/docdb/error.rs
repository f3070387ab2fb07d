// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Document read error types.

use crate::storage::StorageError;
use crate::time::TimeError;
use crate::txn::TxnError;

/// Errors surfaced by document reads.
///
/// Values are cheap to clone so an iterator can latch the first failure and
/// return it from every later call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DocDbError {
    #[error("corruption: {0}")]
    Corruption(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("transaction error: {0}")]
    Txn(TxnError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("time error: {0}")]
    Time(#[from] TimeError),
}

impl From<StorageError> for DocDbError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Corruption(msg) | StorageError::InvalidKeyEncoding(msg) => {
                Self::Corruption(msg)
            }
            StorageError::InvalidTime(e) => Self::Corruption(e.to_string()),
            other => Self::Storage(other),
        }
    }
}

impl From<TxnError> for DocDbError {
    fn from(e: TxnError) -> Self {
        match e {
            TxnError::Storage(e) => e.into(),
            other => Self::Txn(other),
        }
    }
}

impl DocDbError {
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }
}
