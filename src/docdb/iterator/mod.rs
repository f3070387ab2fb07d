// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Snapshot-consistent iteration over committed records and intents.
//!
//! [`IntentAwareIterator`] merges two cursors into one view at a read time:
//!
//! 1. The regular cursor is moved past records the snapshot cannot see.
//! 2. The intents cursor is moved to the intents of the same key region, and
//!    the newest visible one is resolved (see [`crate::txn`]).
//! 3. The two candidates are compared as stored keys. The smaller one, which
//!    is the lower key or the newer version of the same key, is exposed
//!    through [`IntentAwareIterator::fetch`].
//!
//! The first error met (a malformed record, a failed status lookup or a cursor
//! I/O error) is latched. From then on every positioning call is a no-op and
//! `fetch` returns that error.

mod intents;
mod queries;
mod skip;
#[cfg(test)]
mod testing;

use std::cell::Cell;

use tracing::{debug, trace};

use crate::storage::key::{
    debug_key_to_string, doc_key_encoded_size, GREATER_THAN_INTENT_TYPE, MAX_BYTE,
    PAST_HYBRID_TIME, TIME_SUFFIX_SIZE,
};
use crate::storage::{BoundedCursor, Direction, DocDbSnapshot, KvCursor};
use crate::time::{EncodedDocHybridTime, EncodedReadHybridTime, HybridTime};
use crate::txn::intent::STRONG_WRITE_SUFFIX;
use crate::txn::{ReadOperationData, TransactionOperationContext};

use super::{DocDbError, IteratorConfig};
use intents::IntentSource;

pub use queries::FullValue;

/// The entry under the iterator.
///
/// Borrows the iterator, so it cannot outlive the next positioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchedEntry<'a> {
    /// Logical key, without the time suffix.
    pub key: &'a [u8],
    pub value: &'a [u8],
    pub write_time: EncodedDocHybridTime,
    /// True if the reading transaction wrote this entry itself.
    pub same_transaction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntrySource {
    Regular,
    Intent,
}

/// A visible record under the regular cursor.
#[derive(Debug, Clone, Copy)]
struct RegularEntry {
    write_time: EncodedDocHybridTime,
    /// Start of the value body inside the stored value.
    value_offset: usize,
}

/// Merging iterator over the regular and intents spaces at one read time.
pub struct IntentAwareIterator<C> {
    read_time: EncodedReadHybridTime,
    config: IteratorConfig,
    regular: BoundedCursor<C>,
    regular_entry: Option<RegularEntry>,
    intents: Option<IntentSource<C>>,
    /// Inclusive bound on stored keys. Empty means unbounded.
    upper_bound: Vec<u8>,
    max_seen: EncodedDocHybridTime,
    /// Cleared for good by the first backward positioning.
    fast_skip: bool,
    status: Option<DocDbError>,
    key_buffer: Vec<u8>,
    seek_buffer: Vec<u8>,
    need_fetch: Cell<bool>,
}

impl<C: KvCursor> IntentAwareIterator<C> {
    /// Creates an iterator over committed records only.
    pub fn new(regular: C, read_op: &ReadOperationData, config: IteratorConfig) -> Self {
        Self::build(regular, None, read_op, config)
    }

    /// Creates an iterator that also resolves intents from `intents`.
    pub fn with_intents(
        regular: C,
        intents: C,
        read_op: &ReadOperationData,
        txn_context: TransactionOperationContext,
        config: IteratorConfig,
    ) -> Self {
        let source = IntentSource::new(intents, txn_context, read_op);
        Self::build(regular, Some(source), read_op, config)
    }

    /// Opens both cursors on `snapshot`, intents first. Without a transaction
    /// context the intents space is not read at all.
    pub fn from_snapshot<'a, S>(
        snapshot: &'a S,
        read_op: &ReadOperationData,
        txn_context: Option<TransactionOperationContext>,
        config: IteratorConfig,
    ) -> Self
    where
        S: DocDbSnapshot<Cursor<'a> = C> + 'a,
    {
        match txn_context {
            Some(txn_context) => {
                let intents = snapshot.intents_cursor();
                let regular = snapshot.regular_cursor();
                Self::with_intents(regular, intents, read_op, txn_context, config)
            }
            None => Self::new(snapshot.regular_cursor(), read_op, config),
        }
    }

    fn build(
        regular: C,
        intents: Option<IntentSource<C>>,
        read_op: &ReadOperationData,
        config: IteratorConfig,
    ) -> Self {
        trace!(read_time = %read_op.read_time, "Creating intent aware iterator");
        Self {
            read_time: EncodedReadHybridTime::from(&read_op.read_time),
            config,
            regular: BoundedCursor::new(regular),
            regular_entry: None,
            intents,
            upper_bound: Vec::new(),
            max_seen: EncodedDocHybridTime::MIN,
            fast_skip: true,
            status: None,
            key_buffer: Vec::new(),
            seek_buffer: Vec::new(),
            need_fetch: Cell::new(false),
        }
    }

    /// Positions at the first entry at or after `key`.
    pub fn seek(&mut self, key: &[u8]) {
        self.seek_triggered();
        self.seek_internal(key);
    }

    /// Like [`seek`](Self::seek), but the intents cursor starts at the strong
    /// write intents of `key`, past the intents that only lock it.
    pub fn seek_full(&mut self, key: &[u8]) {
        self.seek_triggered();
        self.seek_with_intent_suffix(key, &STRONG_WRITE_SUFFIX);
    }

    /// Positions at the first entry at or after `key`, never moving backward.
    pub fn seek_forward(&mut self, key: &[u8]) {
        self.seek_triggered();
        self.seek_forward_internal(key, &[], &STRONG_WRITE_SUFFIX, key.len());
    }

    /// Positions past every version and intent of `key`. Sub-keys of `key`
    /// are still ahead.
    pub fn seek_past_sub_key(&mut self, key: &[u8]) {
        self.seek_triggered();
        self.seek_forward_internal(
            key,
            &[PAST_HYBRID_TIME],
            &[GREATER_THAN_INTENT_TYPE],
            key.len() + 1,
        );
    }

    /// Positions past `key` and everything nested under it.
    pub fn seek_out_of_sub_doc(&mut self, key: &[u8]) {
        self.seek_triggered();
        self.seek_forward_internal(key, &[MAX_BYTE], &[MAX_BYTE], key.len() + 1);
    }

    /// Moves to the next logical key.
    pub fn next(&mut self) {
        self.seek_triggered();
        if self.status.is_some() {
            return;
        }
        let Some(source) = self.winner(false) else {
            return;
        };
        let mut key = std::mem::take(&mut self.key_buffer);
        key.clear();
        key.extend_from_slice(self.source_key(source));
        trace!(key = %debug_key_to_string(&key), source = ?source, "Next");

        if source == EntrySource::Regular {
            self.regular.next();
            self.skip_future_records(Direction::Forward);
        }
        self.seek_forward_internal(
            &key,
            &[PAST_HYBRID_TIME],
            &[GREATER_THAN_INTENT_TYPE],
            key.len() + 1,
        );
        self.key_buffer = key;
    }

    /// Moves to the previous logical key.
    pub fn prev(&mut self) {
        if self.status.is_some() {
            return;
        }
        let Some(source) = self.winner(false) else {
            return;
        };
        let key = self.source_key(source).to_vec();
        self.prev_sub_doc_key(&key);
    }

    /// Positions at the latest logical key strictly before `key`.
    pub fn prev_sub_doc_key(&mut self, key: &[u8]) {
        self.seek_triggered();
        if !self.prepare_prev(key) {
            self.fill_entry();
            return;
        }
        let latest = self.latest_key_to_buffer();
        self.seek_internal(&latest);
        self.key_buffer = latest;
    }

    /// Positions at the start of the latest document strictly before `key`.
    pub fn prev_doc_key(&mut self, key: &[u8]) {
        self.seek_triggered();
        if !self.prepare_prev(key) {
            self.fill_entry();
            return;
        }
        self.seek_to_latest_doc_key();
    }

    /// Positions at the start of the last document within the upper bound.
    pub fn seek_to_last_doc_key(&mut self) {
        self.seek_triggered();
        if self.status.is_some() {
            return;
        }
        self.regular.seek_to_last();
        self.skip_future_records(Direction::Backward);
        if let Some(intents) = self.intents.as_mut() {
            intents.reset_upper_bound(&self.upper_bound);
            intents.cursor.seek_to_last();
        }
        self.seek_to_suitable_intent(Direction::Backward);
        if self.has_current_entry() {
            self.seek_to_latest_doc_key();
        } else {
            self.fill_entry();
        }
    }

    /// Returns the current entry, or `None` once exhausted.
    pub fn fetch(&self) -> Result<Option<FetchedEntry<'_>>, DocDbError> {
        self.check_status()?;
        self.need_fetch.set(false);
        let entry = self.winner(false).map(|source| match source {
            EntrySource::Regular => {
                let (key, value) = self.regular_key_value();
                FetchedEntry {
                    key,
                    value,
                    write_time: self.regular_write_time(),
                    same_transaction: false,
                }
            }
            EntrySource::Intent => self.intent_entry(),
        });
        Ok(entry)
    }

    /// Returns true if the iterator rests on an entry.
    pub fn has_current_entry(&self) -> bool {
        self.status.is_none()
            && (self.regular_entry.is_some()
                || self.intents.as_ref().is_some_and(|i| i.resolved.valid().is_some()))
    }

    /// Latest write time among the entries this iterator has returned.
    pub fn max_seen_ht(&self) -> HybridTime {
        self.max_seen.decode().hybrid_time()
    }

    /// Returns the time to restart the read at if an entry later than the read
    /// time was returned.
    pub fn restart_read_ht(&self) -> Option<HybridTime> {
        if self.max_seen > self.read_time.read {
            Some(self.max_seen_ht())
        } else {
            None
        }
    }

    /// Sets the inclusive upper bound on stored keys and returns the previous
    /// one. An empty bound means unbounded. Call [`revalidate`](Self::revalidate)
    /// to apply it to the current position.
    pub fn set_upper_bound(&mut self, bound: &[u8]) -> Vec<u8> {
        let previous = std::mem::replace(&mut self.upper_bound, bound.to_vec());
        if bound.is_empty() {
            self.regular.clear_upper_bound();
        } else {
            self.regular.set_upper_bound(&[bound, &[0]]);
        }
        if self.regular_entry.is_some() && !self.regular.valid() {
            self.regular_entry = None;
        }
        previous
    }

    /// Re-evaluates the current position against the upper bound without
    /// moving backward.
    pub fn revalidate(&mut self) {
        if self.status.is_some() {
            return;
        }
        self.skip_future_records(Direction::Forward);
        self.update_intent_upper_bound();
        self.revalidate_intent();
        self.fill_entry();
    }

    /// Logs the iterator state at debug level.
    pub fn debug_dump(&self) {
        let intent = self.intents.as_ref().and_then(|i| {
            i.resolved
                .record()
                .map(|record| (debug_key_to_string(&record.prefix), i.txn_dht, i.same_txn_dht))
        });
        let regular = self
            .regular_entry
            .map_or_else(String::new, |_| debug_key_to_string(self.regular.key()));
        debug!(
            read_time = ?self.read_time,
            status = ?self.status,
            regular = %regular,
            intent = ?intent,
            upper_bound = %debug_key_to_string(&self.upper_bound),
            max_seen = %self.max_seen,
            fast_skip = self.fast_skip,
            "Intent aware iterator state"
        );
    }

    fn seek_internal(&mut self, key: &[u8]) {
        self.seek_with_intent_suffix(key, &[]);
    }

    fn seek_with_intent_suffix(&mut self, key: &[u8], intent_suffix: &[u8]) {
        if self.status.is_some() {
            return;
        }
        trace!(key = %debug_key_to_string(key), "Seek");
        self.regular.seek(key);
        self.skip_future_records(Direction::Forward);
        self.update_intent_upper_bound();
        if let Some(intents) = self.intents.as_mut() {
            intents.seek_buffer.clear();
            intents.seek_buffer.extend_from_slice(key);
            intents.seek_buffer.extend_from_slice(intent_suffix);
            intents.cursor.seek(&intents.seek_buffer);
        }
        self.seek_to_suitable_intent(Direction::Forward);
        self.fill_entry();
    }

    /// Moves both sources forward to `key`, extended by a suffix per source.
    /// The resolved intent is kept if its key is at least the first
    /// `intent_prefix_len` bytes of the intents target.
    fn seek_forward_internal(
        &mut self,
        key: &[u8],
        regular_suffix: &[u8],
        intent_suffix: &[u8],
        intent_prefix_len: usize,
    ) {
        if self.status.is_some() {
            return;
        }
        let mut target = std::mem::take(&mut self.seek_buffer);
        target.clear();
        target.extend_from_slice(key);
        target.extend_from_slice(regular_suffix);
        self.seek_forward_regular(&target);
        self.seek_buffer = target;

        if let Some(intents) = self.intents.as_mut() {
            intents.seek_buffer.clear();
            intents.seek_buffer.extend_from_slice(key);
            intents.seek_buffer.extend_from_slice(intent_suffix);
        }
        self.intent_seek_forward(intent_prefix_len);
        self.fill_entry();
    }

    fn seek_forward_regular(&mut self, target: &[u8]) {
        if self.regular_entry.is_none() || self.regular.key() < target {
            self.regular.seek(target);
        }
        self.skip_future_records(Direction::Forward);
    }

    /// Positions both cursors on the latest visible entries before `key`.
    /// Returns false if there are none.
    fn prepare_prev(&mut self, key: &[u8]) -> bool {
        if self.status.is_some() {
            return false;
        }
        trace!(key = %debug_key_to_string(key), "Prepare prev");
        self.fast_skip = false;

        self.regular.seek(key);
        if self.regular.valid() {
            self.regular.prev();
        } else if self.check_regular_status().is_ok() {
            self.regular.seek_to_last();
        }
        self.skip_future_records(Direction::Backward);

        if let Some(intents) = self.intents.as_mut() {
            intents.reset_upper_bound(&self.upper_bound);
            intents.cursor.seek(key);
            if intents.cursor.valid() {
                intents.cursor.prev();
            } else if let Err(e) = intents.cursor.status() {
                self.status = Some(e.into());
                return false;
            } else {
                intents.cursor.seek_to_last();
            }
        }
        self.seek_to_suitable_intent(Direction::Backward);
        self.has_current_entry()
    }

    /// Seeks to the start of the document holding the latest candidate.
    fn seek_to_latest_doc_key(&mut self) {
        let latest = self.latest_key_to_buffer();
        match doc_key_encoded_size(&latest) {
            Ok(size) => self.seek_internal(&latest[..size]),
            Err(e) => self.status = Some(e.into()),
        }
        self.key_buffer = latest;
    }

    /// Copies the greater logical key of the two candidates into the key
    /// buffer, which the caller takes and must hand back.
    fn latest_key_to_buffer(&mut self) -> Vec<u8> {
        let mut key = std::mem::take(&mut self.key_buffer);
        key.clear();
        if let Some(source) = self.winner(true) {
            key.extend_from_slice(self.source_key(source));
        }
        key
    }

    /// Picks the candidate that comes first in `descending` or ascending order.
    fn winner(&self, descending: bool) -> Option<EntrySource> {
        if self.status.is_some() {
            return None;
        }
        let intent_key = self
            .intents
            .as_ref()
            .filter(|i| i.resolved.valid().is_some())
            .map(|i| i.encoded_key.as_slice());
        match (self.regular_entry.is_some(), intent_key) {
            (false, None) => None,
            (true, None) => Some(EntrySource::Regular),
            (false, Some(_)) => Some(EntrySource::Intent),
            (true, Some(intent_key)) => {
                if (self.regular.key() < intent_key) != descending {
                    Some(EntrySource::Regular)
                } else {
                    Some(EntrySource::Intent)
                }
            }
        }
    }

    fn source_key(&self, source: EntrySource) -> &[u8] {
        match source {
            EntrySource::Regular => self.regular_key_value().0,
            EntrySource::Intent => self.intent_entry().key,
        }
    }

    fn regular_key_value(&self) -> (&[u8], &[u8]) {
        let stored = self.regular.key();
        let key = &stored[..stored.len().saturating_sub(TIME_SUFFIX_SIZE)];
        (key, self.regular_value())
    }

    fn intent_entry(&self) -> FetchedEntry<'_> {
        match self.intents.as_ref() {
            Some(intents) => {
                let (key, value) = intents
                    .resolved
                    .valid()
                    .map_or((&[][..], &[][..]), |r| (r.prefix.as_slice(), r.value.as_slice()));
                FetchedEntry {
                    key,
                    value,
                    write_time: intents.write_time(),
                    same_transaction: intents.same_transaction(),
                }
            }
            None => FetchedEntry {
                key: &[],
                value: &[],
                write_time: EncodedDocHybridTime::MIN,
                same_transaction: false,
            },
        }
    }

    /// Records the winner's time as seen.
    fn fill_entry(&mut self) {
        let winner = self.winner(false);
        match winner {
            Some(EntrySource::Regular) => self.max_seen.make_at_least(self.regular_write_time()),
            Some(EntrySource::Intent) => {
                if let Some(intents) = self.intents.as_ref() {
                    self.max_seen.make_at_least(intents.txn_dht);
                }
            }
            None => trace!("No entry"),
        }
        if self.config.check_fetch_before_seek {
            self.need_fetch.set(winner.is_some());
        }
    }

    fn check_status(&self) -> Result<(), DocDbError> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn check_regular_status(&mut self) -> Result<(), DocDbError> {
        if let Err(e) = self.regular.status() {
            let e = DocDbError::from(e);
            self.status = Some(e.clone());
            return Err(e);
        }
        Ok(())
    }

    #[inline]
    fn seek_triggered(&self) {
        if self.config.check_fetch_before_seek {
            debug_assert!(
                !self.need_fetch.get(),
                "iterator repositioned before its entry was fetched"
            );
        }
    }
}

impl<C> std::fmt::Debug for IntentAwareIterator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentAwareIterator")
            .field("read_time", &self.read_time)
            .field("upper_bound", &debug_key_to_string(&self.upper_bound))
            .field("max_seen", &self.max_seen)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use tempfile::TempDir;

    use super::testing::*;
    use super::*;
    use crate::docdb::DocWriteBatch;
    use crate::storage::{MemCursor, RocksDocDb, StorageError};
    use crate::txn::{IntentTypeSet, TxnId};

    const T1: TxnId = TxnId(1);

    /// Regular cursor that turns into an I/O failure after `steps_left` steps.
    struct FaultyCursor {
        inner: MemCursor,
        steps_left: usize,
        failed: bool,
    }

    impl KvCursor for FaultyCursor {
        fn seek(&mut self, target: &[u8]) {
            self.inner.seek(target);
        }

        fn seek_to_first(&mut self) {
            self.inner.seek_to_first();
        }

        fn seek_to_last(&mut self) {
            self.inner.seek_to_last();
        }

        fn next(&mut self) {
            if self.steps_left == 0 {
                self.failed = true;
                return;
            }
            self.steps_left -= 1;
            self.inner.next();
        }

        fn prev(&mut self) {
            self.inner.prev();
        }

        fn valid(&self) -> bool {
            !self.failed && self.inner.valid()
        }

        fn key(&self) -> &[u8] {
            if self.failed {
                &[]
            } else {
                self.inner.key()
            }
        }

        fn value(&self) -> &[u8] {
            if self.failed {
                &[]
            } else {
                self.inner.value()
            }
        }

        fn status(&self) -> Result<(), StorageError> {
            if self.failed {
                Err(io::Error::other("disk read failed").into())
            } else {
                Ok(())
            }
        }
    }

    fn two_versions() -> Fixture {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("k"), dht(10), b"v1");
            b.put(&key("k"), dht(20), b"v2");
        });
        fixture
    }

    fn pending_intent_on_k(fixture: &Fixture) {
        fixture.write(|b| {
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, T1, dht(25), b"t1");
        });
        fixture.resolver.begin(T1);
    }

    #[test]
    fn test_reads_version_at_snapshot() {
        let fixture = two_versions();
        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"v1".to_vec(), 10)));
        assert_eq!(iter.restart_read_ht(), None);
    }

    #[test]
    fn test_pending_intent_is_invisible() {
        let fixture = two_versions();
        pending_intent_on_k(&fixture);

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"v1".to_vec(), 10)));
    }

    #[test]
    fn test_reseek_sees_late_commit() {
        let fixture = two_versions();
        pending_intent_on_k(&fixture);

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"v1".to_vec(), 10)));

        fixture.resolver.commit(T1, ht(12));
        iter.seek(&key("k"));
        let fetched = iter.fetch().unwrap().unwrap();
        assert_eq!(fetched.key, key("k").as_slice());
        assert_eq!(fetched.value, b"t1");
        assert_eq!(fetched.write_time.decode().hybrid_time(), ht(12));
        assert!(!fetched.same_transaction);
    }

    #[test]
    fn test_commit_after_read_time_is_invisible() {
        let fixture = two_versions();
        pending_intent_on_k(&fixture);
        fixture.resolver.commit(T1, ht(16));

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"v1".to_vec(), 10)));
    }

    #[test]
    fn test_seek_is_idempotent() {
        let fixture = two_versions();
        fixture.write(|b| b.put(&key("m"), dht(3), b"m3"));
        let mut iter = fixture.iter(read_at(30));

        iter.seek(&key("l"));
        let first = entry(&iter);
        iter.seek(&key("l"));
        assert_eq!(entry(&iter), first);
        assert_eq!(first, Some((key("m"), b"m3".to_vec(), 3)));
    }

    #[test]
    fn test_next_visits_keys_in_order() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(1), b"a1");
            b.put(&key("b"), dht(1), b"b1");
            b.put(&key("b"), dht(2), b"b2");
            b.put_intent(&key("bb"), IntentTypeSet::STRONG_WRITE, T1, dht(3), b"bb");
            b.put(&key("c"), dht(1), b"c1");
        });
        fixture.resolver.commit(T1, ht(2));

        let mut iter = fixture.iter(read_at(10));
        let entries = collect_forward(&mut iter);
        assert_eq!(
            entries,
            vec![
                (key("a"), b"a1".to_vec(), 1),
                (key("b"), b"b2".to_vec(), 2),
                (key("bb"), b"bb".to_vec(), 2),
                (key("c"), b"c1".to_vec(), 1),
            ]
        );
    }

    #[test]
    fn test_prev_walks_back_across_sources() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(1), b"a1");
            b.put(&key("b"), dht(1), b"b1");
            b.put_intent(&key("bb"), IntentTypeSet::STRONG_WRITE, T1, dht(3), b"bb");
            b.put(&key("c"), dht(1), b"c1");
        });
        fixture.resolver.commit(T1, ht(2));

        let mut iter = fixture.iter(read_at(10));
        iter.seek_to_last_doc_key();
        let mut seen = Vec::new();
        while let Some((k, _, _)) = entry(&iter) {
            seen.push(k);
            iter.prev();
        }
        assert_eq!(seen, vec![key("c"), key("bb"), key("b"), key("a")]);
    }

    #[test]
    fn test_sub_document_positioning() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("q"), dht(1), b"q");
            b.put(&key("r"), dht(1), b"r");
            b.put(&sub_key("r", 1), dht(1), b"r1");
            b.put(&sub_key("r", 2), dht(1), b"r2");
            b.put(&key("s"), dht(1), b"s");
        });
        let mut iter = fixture.iter(read_at(10));

        iter.seek(&key("r"));
        assert_eq!(entry(&iter).map(|e| e.0), Some(key("r")));

        iter.seek_past_sub_key(&key("r"));
        assert_eq!(entry(&iter).map(|e| e.0), Some(sub_key("r", 1)));

        iter.seek_out_of_sub_doc(&key("r"));
        assert_eq!(entry(&iter).map(|e| e.0), Some(key("s")));

        iter.prev_doc_key(&key("s"));
        assert_eq!(entry(&iter).map(|e| e.0), Some(key("r")));

        iter.prev_sub_doc_key(&key("s"));
        assert_eq!(entry(&iter).map(|e| e.0), Some(sub_key("r", 2)));

        iter.prev_doc_key(&key("q"));
        assert!(!iter.has_current_entry());
        assert_eq!(entry(&iter), None);
    }

    #[test]
    fn test_seek_to_last_doc_key_lands_on_document_start() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(1), b"a");
            b.put(&key("z"), dht(1), b"z");
            b.put(&sub_key("z", 7), dht(1), b"z7");
        });
        let mut iter = fixture.iter(read_at(10));
        iter.seek_to_last_doc_key();
        assert_eq!(entry(&iter), Some((key("z"), b"z".to_vec(), 1)));
    }

    #[test]
    fn test_seek_forward_never_moves_back() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(1), b"a");
            b.put(&key("c"), dht(1), b"c");
        });
        let mut iter = fixture.iter(read_at(10));
        iter.seek(&key("c"));
        iter.seek_forward(&key("a"));
        assert_eq!(entry(&iter).map(|e| e.0), Some(key("c")));
        iter.seek_forward(&key("d"));
        assert_eq!(entry(&iter), None);
    }

    #[test]
    fn test_upper_bound_and_revalidate() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(1), b"a");
            b.put(&key("b"), dht(1), b"b");
            b.put(&key("c"), dht(1), b"c");
            b.put_intent(&key("c"), IntentTypeSet::STRONG_WRITE, T1, dht(5), b"c-t1");
        });
        fixture.resolver.commit(T1, ht(4));

        let mut iter = fixture.iter(read_at(10));
        let bound = [key("b").as_slice(), &[MAX_BYTE]].concat();
        assert!(iter.set_upper_bound(&bound).is_empty());

        iter.seek(&key("a"));
        assert_eq!(entry(&iter).map(|e| e.0), Some(key("a")));
        iter.next();
        assert_eq!(entry(&iter).map(|e| e.0), Some(key("b")));
        iter.next();
        assert_eq!(entry(&iter), None);

        assert_eq!(iter.set_upper_bound(&[]), bound);
        iter.revalidate();
        assert_eq!(entry(&iter), Some((key("c"), b"c-t1".to_vec(), 4)));
    }

    #[test]
    fn test_restart_time_tracks_uncertain_reads() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(10), b"a");
            b.put(&key("b"), dht(18), b"b");
        });
        let mut iter = fixture.iter(limits(15, 20, 20));
        iter.seek(&key("a"));
        assert_eq!(iter.restart_read_ht(), None);
        assert_eq!(iter.max_seen_ht(), ht(10));
        iter.next();
        assert_eq!(entry(&iter).map(|e| e.2), Some(18));
        assert_eq!(iter.restart_read_ht(), Some(ht(18)));
    }

    #[test]
    fn test_own_intents_are_flagged() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("k"), dht(10), b"v1");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, T1, dht(30), b"mine");
        });
        fixture.resolver.begin(T1);

        let mut iter = fixture.iter_with(read_at(15), Some(T1), IteratorConfig::default());
        iter.seek(&key("k"));
        let fetched = iter.fetch().unwrap().unwrap();
        assert_eq!(fetched.value, b"mine");
        assert!(fetched.same_transaction);
    }

    #[test]
    fn test_regular_only_iterator_ignores_intents() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("k"), dht(10), b"v1");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, T1, dht(12), b"t1");
        });
        fixture.resolver.commit(T1, ht(12));

        let snapshot = fixture.db.snapshot();
        let read_op = ReadOperationData::from_read_time(read_at(20));
        let mut iter =
            IntentAwareIterator::new(snapshot.regular_cursor(), &read_op, IteratorConfig::default());
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"v1".to_vec(), 10)));

        let mut iter =
            IntentAwareIterator::from_snapshot(&snapshot, &read_op, None, IteratorConfig::default());
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"v1".to_vec(), 10)));
    }

    #[test]
    fn test_cursor_failure_is_sticky() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(1), b"a");
            b.put(&key("b"), dht(1), b"b");
        });
        let snapshot = fixture.db.snapshot();
        let cursor = FaultyCursor {
            inner: snapshot.regular_cursor(),
            steps_left: 0,
            failed: false,
        };
        let read_op = ReadOperationData::from_read_time(read_at(10));
        let mut iter = IntentAwareIterator::new(cursor, &read_op, IteratorConfig::default());

        iter.seek(&key("a"));
        assert_eq!(iter.fetch().unwrap().map(|e| e.value.to_vec()), Some(b"a".to_vec()));

        iter.next();
        let err = iter.fetch().unwrap_err();
        assert!(matches!(err, DocDbError::Storage(StorageError::Io(_))), "{err:?}");
        assert!(!iter.has_current_entry());

        iter.seek(&key("a"));
        assert!(iter.fetch().is_err());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "repositioned before its entry was fetched")]
    fn test_fetch_check_catches_unread_entry() {
        let fixture = two_versions();
        let config = IteratorConfig::default().with_fetch_check(true);
        let mut iter = fixture.iter_with(read_at(15), None, config);
        iter.seek(&key("k"));
        iter.seek(&key("k"));
    }

    #[test]
    fn test_fetch_check_allows_fetched_entry() {
        let fixture = two_versions();
        let config = IteratorConfig::default().with_fetch_check(true);
        let mut iter = fixture.iter_with(read_at(15), None, config);
        iter.seek(&key("k"));
        assert!(entry(&iter).is_some());
        iter.next();
        assert_eq!(entry(&iter), None);
        iter.seek(&key("k"));
    }

    #[test]
    fn test_rocksdb_snapshot_read() {
        let dir = TempDir::new().unwrap();
        let db = RocksDocDb::open(dir.path()).unwrap();
        let resolver = std::sync::Arc::new(crate::txn::InMemoryStatusResolver::new());

        let mut batch = DocWriteBatch::new();
        batch.put(&key("k"), dht(10), b"v1");
        batch.put(&key("k"), dht(20), b"v2");
        batch.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, T1, dht(25), b"t1");
        batch.put(&key("m"), dht(5), b"m5");
        db.apply(&batch).unwrap();
        resolver.commit(T1, ht(12));

        let snapshot = db.snapshot();
        let mut later = DocWriteBatch::new();
        later.put(&key("l"), dht(1), b"late");
        db.apply(&later).unwrap();

        let read_op = ReadOperationData::from_read_time(read_at(15));
        let mut iter = IntentAwareIterator::from_snapshot(
            &snapshot,
            &read_op,
            Some(TransactionOperationContext::new(resolver)),
            IteratorConfig::default(),
        );

        let mut seen = Vec::new();
        iter.seek(&[]);
        while let Some(fetched) = iter.fetch().unwrap() {
            seen.push((fetched.key.to_vec(), fetched.value.to_vec()));
            iter.next();
        }
        assert_eq!(
            seen,
            vec![(key("k"), b"t1".to_vec()), (key("m"), b"m5".to_vec())]
        );
    }
}

#[cfg(test)]
mod proptests {
    use std::collections::{BTreeMap, BTreeSet};

    use proptest::prelude::*;

    use super::testing::*;
    use crate::txn::{IntentTypeSet, TxnId};

    const DOCS: u8 = 5;
    const TXNS: u64 = 4;

    /// Regular writes land at even times and commits at distinct odd times,
    /// so no two candidates of one key tie.
    fn commit_time(txn: u64) -> u64 {
        8 * txn + 3
    }

    fn doc(index: u8) -> String {
        format!("d{index}")
    }

    #[derive(Debug, Clone, Copy)]
    enum Outcome {
        Pending,
        Committed,
        Aborted,
    }

    fn arb_outcome() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            Just(Outcome::Pending),
            Just(Outcome::Committed),
            Just(Outcome::Aborted)
        ]
    }

    struct Case {
        fixture: Fixture,
        expected: Vec<Entry>,
    }

    fn build(
        regular: &BTreeSet<(u8, u64)>,
        intents: &BTreeSet<(u8, u64)>,
        outcomes: &[Outcome],
        read: u64,
    ) -> Case {
        let fixture = Fixture::new();
        let mut visible: BTreeMap<Vec<u8>, (u64, Vec<u8>)> = BTreeMap::new();
        let mut offer = |k: Vec<u8>, time: u64, value: Vec<u8>| {
            if time > read {
                return;
            }
            let slot = visible.entry(k).or_insert((0, Vec::new()));
            if time > slot.0 {
                *slot = (time, value);
            }
        };

        fixture.write(|b| {
            for &(d, t) in regular {
                let value = format!("r{d}-{t}").into_bytes();
                b.put(&key(&doc(d)), dht(t), &value);
                offer(key(&doc(d)), t, value);
            }
            for &(d, txn) in intents {
                let value = format!("t{txn}").into_bytes();
                b.put_intent(
                    &key(&doc(d)),
                    IntentTypeSet::STRONG_WRITE,
                    TxnId(txn + 1),
                    dht(100 + txn),
                    &value,
                );
                if matches!(outcomes[txn as usize], Outcome::Committed) {
                    offer(key(&doc(d)), commit_time(txn), value);
                }
            }
        });

        for (txn, outcome) in outcomes.iter().enumerate() {
            let txn = txn as u64;
            match outcome {
                Outcome::Pending => fixture.resolver.begin(TxnId(txn + 1)),
                Outcome::Committed => fixture.resolver.commit(TxnId(txn + 1), ht(commit_time(txn))),
                Outcome::Aborted => fixture.resolver.abort(TxnId(txn + 1)),
            }
        }

        let expected = visible
            .into_iter()
            .map(|(k, (time, value))| (k, value, time))
            .collect();
        Case { fixture, expected }
    }

    type Layout = (BTreeSet<(u8, u64)>, BTreeSet<(u8, u64)>, Vec<Outcome>, u64);

    fn arb_case() -> impl Strategy<Value = Layout> {
        (
            prop::collection::btree_set((0..DOCS, (1..20u64).prop_map(|t| t * 2)), 0..20),
            prop::collection::btree_set((0..DOCS, 0..TXNS), 0..10),
            prop::collection::vec(arb_outcome(), TXNS as usize),
            1..45u64,
        )
    }

    proptest! {
        #[test]
        fn forward_scan_matches_snapshot_model(
            (regular, intents, outcomes, read) in arb_case()
        ) {
            let case = build(&regular, &intents, &outcomes, read);
            let mut iter = case.fixture.iter(read_at(read));
            let entries = collect_forward(&mut iter);

            prop_assert_eq!(&entries, &case.expected);
            prop_assert!(entries.iter().all(|(_, _, time)| *time <= read));
            prop_assert_eq!(iter.restart_read_ht(), None);
        }

        #[test]
        fn backward_scan_mirrors_forward_scan(
            (regular, intents, outcomes, read) in arb_case()
        ) {
            let case = build(&regular, &intents, &outcomes, read);
            let mut iter = case.fixture.iter(read_at(read));

            let mut backward = Vec::new();
            iter.seek_to_last_doc_key();
            while let Some(e) = entry(&iter) {
                backward.push(e);
                iter.prev();
            }
            backward.reverse();

            prop_assert!(backward.windows(2).all(|w| w[0].0 < w[1].0));
            prop_assert_eq!(backward, case.expected);
        }
    }
}
