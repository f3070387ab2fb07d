// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction status resolution.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, instrument, trace};

use crate::time::{HybridTime, ReadHybridTime};

use super::error::TxnError;
use super::{TransactionStatus, TxnId};

/// Answers whether a transaction committed, and when.
///
/// Lookups may block waiting for an in-flight transaction to settle, but never
/// past `deadline`. Running out of time is an error, not a pending answer.
pub trait TransactionStatusResolver: Send + Sync {
    fn resolve(
        &self,
        txn_id: TxnId,
        read_time: &ReadHybridTime,
        deadline: Instant,
    ) -> Result<TransactionStatus, TxnError>;
}

enum Registration {
    Status(TransactionStatus),
    Failing(String),
}

/// In-process transaction registry.
///
/// Pending lookups wait up to `pending_wait` (bounded by the caller's
/// deadline) for the transaction to commit or abort before answering
/// [`TransactionStatus::Pending`]. Unknown transactions have been cleaned up
/// after aborting and resolve as [`TransactionStatus::Aborted`].
pub struct InMemoryStatusResolver {
    registry: Mutex<HashMap<TxnId, Registration>>,
    changed: Condvar,
    pending_wait: Duration,
}

impl Default for InMemoryStatusResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStatusResolver {
    /// Creates a registry that answers pending lookups immediately.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
            pending_wait: Duration::ZERO,
        }
    }

    /// Sets how long a lookup waits for a pending transaction to settle.
    pub fn with_pending_wait(mut self, pending_wait: Duration) -> Self {
        self.pending_wait = pending_wait;
        self
    }

    /// Registers a running transaction.
    pub fn begin(&self, txn_id: TxnId) {
        self.register(txn_id, Registration::Status(TransactionStatus::Pending));
    }

    pub fn commit(&self, txn_id: TxnId, commit_time: HybridTime) {
        debug!(txn_id = %txn_id, commit_time = %commit_time, "Transaction committed");
        self.register(
            txn_id,
            Registration::Status(TransactionStatus::Committed(commit_time)),
        );
    }

    pub fn abort(&self, txn_id: TxnId) {
        debug!(txn_id = %txn_id, "Transaction aborted");
        self.register(txn_id, Registration::Status(TransactionStatus::Aborted));
    }

    /// Makes every lookup of `txn_id` fail with `message`.
    pub fn fail_lookups(&self, txn_id: TxnId, message: impl Into<String>) {
        self.register(txn_id, Registration::Failing(message.into()));
    }

    /// Returns the registered status without waiting.
    pub fn status(&self, txn_id: TxnId) -> Option<TransactionStatus> {
        match self.registry.lock().get(&txn_id) {
            Some(Registration::Status(status)) => Some(*status),
            Some(Registration::Failing(_)) | None => None,
        }
    }

    fn register(&self, txn_id: TxnId, registration: Registration) {
        self.registry.lock().insert(txn_id, registration);
        self.changed.notify_all();
    }
}

impl TransactionStatusResolver for InMemoryStatusResolver {
    #[instrument(skip(self, read_time), fields(read = %read_time.read))]
    fn resolve(
        &self,
        txn_id: TxnId,
        read_time: &ReadHybridTime,
        deadline: Instant,
    ) -> Result<TransactionStatus, TxnError> {
        let wait_until = deadline.min(Instant::now() + self.pending_wait);
        let mut registry = self.registry.lock();
        loop {
            match registry.get(&txn_id) {
                None => {
                    trace!(txn_id = %txn_id, "Unknown transaction, treating as aborted");
                    return Ok(TransactionStatus::Aborted);
                }
                Some(Registration::Failing(message)) => {
                    return Err(TxnError::StatusLookupFailure {
                        txn_id,
                        message: message.clone(),
                    });
                }
                Some(Registration::Status(status)) if status.is_final() => return Ok(*status),
                Some(Registration::Status(_)) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TxnError::StatusLookupTimeout { txn_id });
            }
            if now >= wait_until {
                return Ok(TransactionStatus::Pending);
            }
            self.changed.wait_until(&mut registry, wait_until);
        }
    }
}
