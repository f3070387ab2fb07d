// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-read memo of transaction outcomes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::time::{HybridTime, ReadHybridTime};

use super::error::TxnError;
use super::{TransactionStatus, TransactionStatusResolver, TxnId};

/// Memoizes status lookups for the lifetime of one read.
///
/// Final outcomes (committed or aborted) are cached. Pending answers are not,
/// so a later lookup within the same read can observe the transaction settle.
pub struct TransactionStatusCache {
    resolver: Arc<dyn TransactionStatusResolver>,
    read_time: ReadHybridTime,
    deadline: Instant,
    resolved: HashMap<TxnId, Option<HybridTime>>,
}

impl TransactionStatusCache {
    pub fn new(
        resolver: Arc<dyn TransactionStatusResolver>,
        read_time: ReadHybridTime,
        deadline: Instant,
    ) -> Self {
        Self {
            resolver,
            read_time,
            deadline,
            resolved: HashMap::new(),
        }
    }

    /// Returns the commit time of `txn_id`, or `None` if it has not committed.
    pub fn commit_time(&mut self, txn_id: TxnId) -> Result<Option<HybridTime>, TxnError> {
        if let Some(cached) = self.resolved.get(&txn_id) {
            return Ok(*cached);
        }

        let status = self.resolver.resolve(txn_id, &self.read_time, self.deadline)?;
        debug!(txn_id = %txn_id, status = ?status, "Resolved transaction status");
        if status.is_final() {
            self.resolved.insert(txn_id, status.commit_time());
        }
        Ok(status.commit_time())
    }

    /// Number of memoized outcomes.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

impl std::fmt::Debug for TransactionStatusCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStatusCache")
            .field("read_time", &self.read_time)
            .field("resolved", &self.resolved)
            .finish()
    }
}
