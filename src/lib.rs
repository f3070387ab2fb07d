// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! IntentDB: snapshot-consistent reads over MVCC document storage with in-flight transactions
//!
//! Committed records and the provisional writes of running transactions live
//! in two separate ordered key spaces. This crate reads both as one linear,
//! snapshot-consistent view, resolving each provisional write against the
//! status of its transaction.

pub mod docdb;
pub mod storage;
pub mod time;
pub mod txn;

pub use docdb::{
    DocDbError, DocWriteBatch, FetchedEntry, FullValue, IntentAwareIterator, IteratorConfig,
    MergeOperator,
};
pub use storage::{
    DocDbSnapshot, DocKey, KvCursor, MemDocDb, RocksDocDb, StorageError, SubDocKey,
};
pub use time::{DocHybridTime, EncodedDocHybridTime, HybridTime, ReadHybridTime, TimeError};
pub use txn::{
    InMemoryStatusResolver, ReadOperationData, TransactionOperationContext, TransactionStatus,
    TransactionStatusResolver, TxnError, TxnId,
};
