// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction error types.

use crate::storage::StorageError;

use super::TxnId;

/// Errors that can occur while resolving transaction state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TxnError {
    #[error("timed out waiting for status of transaction {txn_id}")]
    StatusLookupTimeout { txn_id: TxnId },

    #[error("status lookup for transaction {txn_id} failed: {message}")]
    StatusLookupFailure { txn_id: TxnId, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
