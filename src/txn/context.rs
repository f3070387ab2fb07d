// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-read transaction context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::time::ReadHybridTime;

use super::{TransactionStatusResolver, TxnId};

/// Default time budget for the status lookups of one read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Identifies the reading transaction, if any, and how to resolve others.
#[derive(Clone)]
pub struct TransactionOperationContext {
    pub txn_id: Option<TxnId>,
    pub resolver: Arc<dyn TransactionStatusResolver>,
}

impl TransactionOperationContext {
    /// Context for a non-transactional read.
    pub fn new(resolver: Arc<dyn TransactionStatusResolver>) -> Self {
        Self {
            txn_id: None,
            resolver,
        }
    }

    /// Context for a read made by `txn_id`, which sees its own intents.
    pub fn for_transaction(txn_id: TxnId, resolver: Arc<dyn TransactionStatusResolver>) -> Self {
        Self {
            txn_id: Some(txn_id),
            resolver,
        }
    }
}

impl std::fmt::Debug for TransactionOperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionOperationContext")
            .field("txn_id", &self.txn_id)
            .finish_non_exhaustive()
    }
}

/// The snapshot and deadline of one read.
#[derive(Debug, Clone, Copy)]
pub struct ReadOperationData {
    pub read_time: ReadHybridTime,
    pub deadline: Instant,
}

impl ReadOperationData {
    pub fn new(read_time: ReadHybridTime, deadline: Instant) -> Self {
        Self {
            read_time,
            deadline,
        }
    }

    /// Reads at `read_time` with [`DEFAULT_READ_TIMEOUT`] from now.
    pub fn from_read_time(read_time: ReadHybridTime) -> Self {
        Self::new(read_time, Instant::now() + DEFAULT_READ_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::HybridTime;
    use crate::txn::InMemoryStatusResolver;

    #[test]
    fn test_contexts() {
        let resolver: Arc<dyn TransactionStatusResolver> = Arc::new(InMemoryStatusResolver::new());
        assert_eq!(TransactionOperationContext::new(Arc::clone(&resolver)).txn_id, None);
        let ctx = TransactionOperationContext::for_transaction(TxnId(7), resolver);
        assert_eq!(ctx.txn_id, Some(TxnId(7)));
        assert!(format!("{:?}", ctx).contains("TxnId(7)"));
    }

    #[test]
    fn test_default_deadline_is_in_the_future() {
        let data = ReadOperationData::from_read_time(ReadHybridTime::single_time(HybridTime::new(5)));
        assert!(data.deadline > Instant::now());
        assert_eq!(data.read_time.read, HybridTime::new(5));
    }
}
