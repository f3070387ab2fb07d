// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Document reads at a snapshot.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use intentdb::docdb::{DocWriteBatch, IntentAwareIterator, IteratorConfig};
//! use intentdb::storage::{DocKey, MemDocDb, SubDocKey};
//! use intentdb::time::{DocHybridTime, HybridTime, ReadHybridTime};
//! use intentdb::txn::{
//!     InMemoryStatusResolver, IntentTypeSet, ReadOperationData, TransactionOperationContext,
//!     TxnId,
//! };
//!
//! let db = MemDocDb::new();
//! let resolver = Arc::new(InMemoryStatusResolver::new());
//! let key = SubDocKey::new(DocKey::new(vec!["k".into()]), vec![]).encode();
//! let at = |ht| DocHybridTime::new(HybridTime::new(ht), 0);
//!
//! let mut batch = DocWriteBatch::new();
//! batch.put(&key, at(10), b"v1");
//! batch.put_intent(&key, IntentTypeSet::STRONG_WRITE, TxnId(1), at(25), b"t1");
//! db.apply(&batch);
//! resolver.begin(TxnId(1));
//!
//! let read = ReadOperationData::from_read_time(ReadHybridTime::single_time(HybridTime::new(15)));
//! let snapshot = db.snapshot();
//! let mut iter = IntentAwareIterator::from_snapshot(
//!     &snapshot,
//!     &read,
//!     Some(TransactionOperationContext::new(resolver)),
//!     IteratorConfig::default(),
//! );
//!
//! iter.seek(&key);
//! let entry = iter.fetch().unwrap().unwrap();
//! assert_eq!(entry.value, b"v1");
//! ```

mod config;
mod error;
mod iterator;
mod merge;
mod write_batch;

pub use config::IteratorConfig;
pub use error::DocDbError;
pub use iterator::{FetchedEntry, FullValue, IntentAwareIterator};
pub use merge::{AppendOperator, MergeOperator};
pub use write_batch::DocWriteBatch;
