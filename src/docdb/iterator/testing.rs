// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for iterator tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::docdb::{DocWriteBatch, IteratorConfig};
use crate::storage::{DocKey, KeyComponent, MemCursor, MemDocDb, SubDocKey};
use crate::time::{DocHybridTime, HybridTime, ReadHybridTime};
use crate::txn::{InMemoryStatusResolver, ReadOperationData, TransactionOperationContext, TxnId};

use super::IntentAwareIterator;

pub type Entry = (Vec<u8>, Vec<u8>, u64);

/// Encoded key of the document `name`.
pub fn key(name: &str) -> Vec<u8> {
    SubDocKey::new(DocKey::new(vec![name.into()]), vec![]).encode()
}

/// Encoded key of column `column` of document `name`.
pub fn sub_key(name: &str, column: i64) -> Vec<u8> {
    SubDocKey::new(DocKey::new(vec![name.into()]), vec![KeyComponent::Int64(column)]).encode()
}

pub fn ht(value: u64) -> HybridTime {
    HybridTime::new(value)
}

pub fn dht(value: u64) -> DocHybridTime {
    DocHybridTime::new(ht(value), 0)
}

pub fn read_at(read: u64) -> ReadHybridTime {
    ReadHybridTime::single_time(ht(read))
}

pub fn limits(read: u64, local_limit: u64, global_limit: u64) -> ReadHybridTime {
    ReadHybridTime::from_limits(ht(read), ht(local_limit), ht(global_limit))
}

pub struct Fixture {
    pub db: MemDocDb,
    pub resolver: Arc<InMemoryStatusResolver>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            db: MemDocDb::new(),
            resolver: Arc::new(InMemoryStatusResolver::new()),
        }
    }

    pub fn write(&self, build: impl FnOnce(&mut DocWriteBatch)) {
        let mut batch = DocWriteBatch::new();
        build(&mut batch);
        self.db.apply(&batch);
    }

    pub fn iter(&self, read_time: ReadHybridTime) -> IntentAwareIterator<MemCursor> {
        self.iter_with(read_time, None, IteratorConfig::default())
    }

    pub fn iter_with(
        &self,
        read_time: ReadHybridTime,
        txn_id: Option<TxnId>,
        config: IteratorConfig,
    ) -> IntentAwareIterator<MemCursor> {
        self.build(
            ReadOperationData::new(read_time, Instant::now() + Duration::from_secs(30)),
            txn_id,
            config,
        )
    }

    pub fn iter_with_deadline(
        &self,
        read_time: ReadHybridTime,
        deadline: Instant,
    ) -> IntentAwareIterator<MemCursor> {
        self.build(
            ReadOperationData::new(read_time, deadline),
            None,
            IteratorConfig::default(),
        )
    }

    fn build(
        &self,
        read_op: ReadOperationData,
        txn_id: Option<TxnId>,
        config: IteratorConfig,
    ) -> IntentAwareIterator<MemCursor> {
        let resolver = Arc::clone(&self.resolver);
        let txn_context = match txn_id {
            Some(txn_id) => TransactionOperationContext::for_transaction(txn_id, resolver),
            None => TransactionOperationContext::new(resolver),
        };
        let snapshot = self.db.snapshot();
        IntentAwareIterator::from_snapshot(&snapshot, &read_op, Some(txn_context), config)
    }
}

/// Owned copy of the current entry: key, value and hybrid time.
pub fn entry(iter: &IntentAwareIterator<MemCursor>) -> Option<Entry> {
    iter.fetch().unwrap().map(|e| {
        (
            e.key.to_vec(),
            e.value.to_vec(),
            e.write_time.decode().hybrid_time().value(),
        )
    })
}

/// Every entry from the start, in order.
pub fn collect_forward(iter: &mut IntentAwareIterator<MemCursor>) -> Vec<Entry> {
    let mut out = Vec::new();
    iter.seek(&[]);
    while let Some(e) = entry(iter) {
        out.push(e);
        iter.next();
    }
    out
}
