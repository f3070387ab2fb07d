// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Ordered byte cursors over one key space.

use super::StorageError;

/// Direction of a cursor step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A seekable cursor over byte-ordered key/value pairs.
///
/// Implementations iterate a fixed point-in-time view. `key` and `value`
/// return empty slices when the cursor is not valid. A cursor that stops being
/// valid because of an engine error reports it through `status`.
pub trait KvCursor {
    /// Positions at the first entry with key `>= target`.
    fn seek(&mut self, target: &[u8]);

    fn seek_to_first(&mut self);

    fn seek_to_last(&mut self);

    fn next(&mut self);

    fn prev(&mut self);

    fn valid(&self) -> bool;

    fn key(&self) -> &[u8];

    fn value(&self) -> &[u8];

    fn status(&self) -> Result<(), StorageError>;

    /// Moves one entry in `direction`.
    #[inline]
    fn step(&mut self, direction: Direction) {
        match direction {
            Direction::Forward => self.next(),
            Direction::Backward => self.prev(),
        }
    }
}

impl<C: KvCursor + ?Sized> KvCursor for Box<C> {
    fn seek(&mut self, target: &[u8]) {
        (**self).seek(target)
    }

    fn seek_to_first(&mut self) {
        (**self).seek_to_first()
    }

    fn seek_to_last(&mut self) {
        (**self).seek_to_last()
    }

    fn next(&mut self) {
        (**self).next()
    }

    fn prev(&mut self) {
        (**self).prev()
    }

    fn valid(&self) -> bool {
        (**self).valid()
    }

    fn key(&self) -> &[u8] {
        (**self).key()
    }

    fn value(&self) -> &[u8] {
        (**self).value()
    }

    fn status(&self) -> Result<(), StorageError> {
        (**self).status()
    }
}

/// A point-in-time view of both key spaces.
pub trait DocDbSnapshot {
    type Cursor<'a>: KvCursor
    where
        Self: 'a;

    /// Opens a cursor over committed records.
    fn regular_cursor(&self) -> Self::Cursor<'_>;

    /// Opens a cursor over provisional records.
    fn intents_cursor(&self) -> Self::Cursor<'_>;
}

/// Wraps a cursor with an adjustable exclusive upper bound.
///
/// Entries at or past the bound are reported as invalid. The bound can be
/// moved at any time, and validity is re-evaluated against the new bound
/// without repositioning: raising the bound revives a cursor that stopped at
/// the old one.
pub struct BoundedCursor<C> {
    inner: C,
    upper_bound: Vec<u8>,
}

impl<C: KvCursor> BoundedCursor<C> {
    /// Creates an unbounded cursor.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            upper_bound: Vec::new(),
        }
    }

    /// Returns the current exclusive bound. Empty means unbounded.
    pub fn upper_bound(&self) -> &[u8] {
        &self.upper_bound
    }

    /// Sets the bound to the concatenation of `parts`, reusing the bound buffer.
    pub fn set_upper_bound(&mut self, parts: &[&[u8]]) {
        self.upper_bound.clear();
        for part in parts {
            self.upper_bound.extend_from_slice(part);
        }
    }

    pub fn clear_upper_bound(&mut self) {
        self.upper_bound.clear();
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    #[inline]
    fn within_bound(&self, key: &[u8]) -> bool {
        self.upper_bound.is_empty() || key < self.upper_bound.as_slice()
    }
}

impl<C: KvCursor> KvCursor for BoundedCursor<C> {
    #[inline]
    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target);
    }

    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    /// Positions at the last entry below the bound.
    fn seek_to_last(&mut self) {
        if self.upper_bound.is_empty() {
            self.inner.seek_to_last();
            return;
        }
        self.inner.seek(&self.upper_bound);
        if self.inner.valid() {
            self.inner.prev();
        } else if self.inner.status().is_ok() {
            self.inner.seek_to_last();
        }
    }

    #[inline]
    fn next(&mut self) {
        self.inner.next();
    }

    #[inline]
    fn prev(&mut self) {
        self.inner.prev();
    }

    #[inline]
    fn valid(&self) -> bool {
        self.inner.valid() && self.within_bound(self.inner.key())
    }

    #[inline]
    fn key(&self) -> &[u8] {
        if self.valid() {
            self.inner.key()
        } else {
            &[]
        }
    }

    #[inline]
    fn value(&self) -> &[u8] {
        if self.valid() {
            self.inner.value()
        } else {
            &[]
        }
    }

    fn status(&self) -> Result<(), StorageError> {
        self.inner.status()
    }
}
