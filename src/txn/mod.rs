// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction state as seen by readers.
//!
//! Readers never take part in the commit protocol. They only need to know,
//! for each provisional record they meet, whether its transaction committed
//! and at what time. That answer comes from a [`TransactionStatusResolver`]
//! and is memoized per read by a [`TransactionStatusCache`].
//!
//! # Key Concepts
//!
//! ## Intents
//!
//! A transaction writes provisional records ("intents") into a separate key
//! space. Each intent names its transaction and the time it was written. Once
//! the transaction commits, its intents become visible at the commit time,
//! until they are applied into the regular space.
//!
//! ## Reading your own writes
//!
//! A reader running inside a transaction sees that transaction's intents at
//! their own write time, bounded by `in_txn_limit`, without any status lookup.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use intentdb::time::{HybridTime, ReadHybridTime};
//! use intentdb::txn::{
//!     InMemoryStatusResolver, ReadOperationData, TransactionStatusCache, TxnId,
//! };
//!
//! let resolver = Arc::new(InMemoryStatusResolver::new());
//! resolver.commit(TxnId(1), HybridTime::new(12));
//!
//! let read = ReadOperationData::from_read_time(ReadHybridTime::single_time(HybridTime::new(15)));
//! let mut cache = TransactionStatusCache::new(resolver, read.read_time, read.deadline);
//! assert_eq!(cache.commit_time(TxnId(1)).unwrap(), Some(HybridTime::new(12)));
//! ```

mod context;
mod error;
pub mod intent;
mod resolver;
mod status_cache;
mod transaction;

pub use context::{ReadOperationData, TransactionOperationContext, DEFAULT_READ_TIMEOUT};
pub use error::TxnError;
pub use intent::{DecodedStrongWriteIntent, IntentTypeSet};
pub use resolver::{InMemoryStatusResolver, TransactionStatusResolver};
pub use status_cache::TransactionStatusCache;
pub use transaction::{TransactionStatus, TxnId};
