// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Two-space document storage.
//!
//! A document database keeps two physically separate, byte-ordered key spaces:
//!
//! - **regular**: committed records, `[sub doc key][#][encoded commit time]`
//! - **intents**: provisional records of in-flight transactions, plus
//!   transaction metadata and reverse index entries under [`key::TRANSACTION_ID`]
//!
//! Both are read through [`KvCursor`]s opened on a [`DocDbSnapshot`], so a
//! reader sees one immutable point-in-time view of each space.
//!
//! # Example
//!
//! ```
//! use intentdb::storage::{DocDbSnapshot, KvCursor, MemDocDb, Space, WriteBatch};
//!
//! let db = MemDocDb::new();
//! let mut batch = WriteBatch::new();
//! batch.put(Space::Regular, b"a".to_vec(), b"1".to_vec());
//! db.apply(&batch);
//!
//! let snapshot = db.snapshot();
//! let mut cursor = snapshot.regular_cursor();
//! cursor.seek(b"a");
//! assert_eq!(cursor.value(), b"1");
//! ```

mod batch;
mod cursor;
mod error;
pub mod key;
mod memory;
mod rocks;
pub mod value;

pub use batch::{Space, WriteBatch, WriteOp};
pub use cursor::{BoundedCursor, Direction, DocDbSnapshot, KvCursor};
pub use error::StorageError;
pub use key::{DocKey, KeyComponent, SubDocKey};
pub use memory::{MemCursor, MemDocDb, MemSnapshot};
pub use rocks::{DurabilityMode, RocksCursor, RocksDocDb, RocksSnapshot};
