// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory document database.
//!
//! Each key space is a `BTreeMap` behind a `RwLock`. Snapshots copy both maps
//! into immutable sorted arrays, so cursors never observe later writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{DocDbSnapshot, KvCursor, Space, StorageError, WriteBatch, WriteOp};

type Entries = Arc<Vec<(Vec<u8>, Vec<u8>)>>;

/// Two in-memory key spaces with snapshot reads.
#[derive(Default)]
pub struct MemDocDb {
    regular: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    intents: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemDocDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every mutation of `batch` under both write locks.
    pub fn apply<B: AsRef<WriteBatch>>(&self, batch: &B) {
        let mut regular = self.regular.write();
        let mut intents = self.intents.write();
        for op in batch.as_ref().ops() {
            match op {
                WriteOp::Put { space, key, value } => {
                    let map = match space {
                        Space::Regular => &mut *regular,
                        Space::Intents => &mut *intents,
                    };
                    map.insert(key.clone(), value.clone());
                }
                WriteOp::Delete { space, key } => {
                    let map = match space {
                        Space::Regular => &mut *regular,
                        Space::Intents => &mut *intents,
                    };
                    map.remove(key);
                }
            }
        }
    }

    /// Captures both spaces.
    ///
    /// Intents are captured before regular records. A transaction applied in
    /// between is then seen either as an intent or as a regular record, never
    /// as neither.
    pub fn snapshot(&self) -> MemSnapshot {
        let intents = Arc::new(Self::copy(&self.intents));
        let regular = Arc::new(Self::copy(&self.regular));
        MemSnapshot { regular, intents }
    }

    pub fn len(&self, space: Space) -> usize {
        match space {
            Space::Regular => self.regular.read().len(),
            Space::Intents => self.intents.read().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regular.read().is_empty() && self.intents.read().is_empty()
    }

    fn copy(map: &RwLock<BTreeMap<Vec<u8>, Vec<u8>>>) -> Vec<(Vec<u8>, Vec<u8>)> {
        map.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Immutable view of both spaces of a [`MemDocDb`].
#[derive(Clone)]
pub struct MemSnapshot {
    regular: Entries,
    intents: Entries,
}

impl DocDbSnapshot for MemSnapshot {
    type Cursor<'a> = MemCursor;

    fn regular_cursor(&self) -> MemCursor {
        MemCursor::new(Arc::clone(&self.regular))
    }

    fn intents_cursor(&self) -> MemCursor {
        MemCursor::new(Arc::clone(&self.intents))
    }
}

/// Cursor over a sorted, immutable entry array.
pub struct MemCursor {
    entries: Entries,
    pos: Option<usize>,
}

impl MemCursor {
    /// Creates an unpositioned cursor. `entries` must be sorted by key.
    pub fn new(entries: Entries) -> Self {
        Self { entries, pos: None }
    }

    #[inline]
    fn entry(&self) -> Option<&(Vec<u8>, Vec<u8>)> {
        self.pos.and_then(|pos| self.entries.get(pos))
    }
}

impl KvCursor for MemCursor {
    fn seek(&mut self, target: &[u8]) {
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() < target);
        self.pos = (idx < self.entries.len()).then_some(idx);
    }

    fn seek_to_first(&mut self) {
        self.pos = (!self.entries.is_empty()).then_some(0);
    }

    fn seek_to_last(&mut self) {
        self.pos = self.entries.len().checked_sub(1);
    }

    fn next(&mut self) {
        let len = self.entries.len();
        self.pos = self.pos.map(|pos| pos + 1).filter(|&pos| pos < len);
    }

    fn prev(&mut self) {
        self.pos = self.pos.and_then(|pos| pos.checked_sub(1));
    }

    fn valid(&self) -> bool {
        self.entry().is_some()
    }

    fn key(&self) -> &[u8] {
        self.entry().map_or(&[][..], |(k, _)| k.as_slice())
    }

    fn value(&self) -> &[u8] {
        self.entry().map_or(&[][..], |(_, v)| v.as_slice())
    }

    fn status(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
