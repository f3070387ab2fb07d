// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Resolving the newest visible intent of a key.

use std::mem;

use tracing::{error, trace, warn};

use crate::docdb::DocDbError;
use crate::storage::key::{self, append_time_suffix, debug_key_to_string, MAX_BYTE, TIME_SUFFIX_SIZE};
use crate::storage::{BoundedCursor, Direction, KvCursor};
use crate::time::{EncodedDocHybridTime, EncodedReadHybridTime};
use crate::txn::intent::{
    decode_strong_write_intent, is_intent_for_same_key, STRONG_WRITE_SUFFIX,
};
use crate::txn::{
    ReadOperationData, TransactionOperationContext, TransactionStatusCache, TxnId,
};

use super::IntentAwareIterator;

/// Reusable buffers holding one resolved intent.
#[derive(Debug, Default)]
pub(super) struct IntentRecord {
    pub(super) prefix: Vec<u8>,
    pub(super) value: Vec<u8>,
}

/// A visible strong write intent, copied out of the intents cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct VisibleIntent {
    pub(super) same_transaction: bool,
    pub(super) time: EncodedDocHybridTime,
    pub(super) value: Vec<u8>,
}

impl VisibleIntent {
    /// Sort rank against other records of the same key. Own writes rank above
    /// everything else.
    pub(super) fn rank(&self) -> (bool, EncodedDocHybridTime) {
        (self.same_transaction, self.time)
    }
}

/// Outcome of resolving the intents of one key.
#[derive(Debug)]
pub(super) enum ResolvedIntent {
    NoIntent,
    /// Resolved, but the key lies past the scan bound.
    Invalid(IntentRecord),
    Valid(IntentRecord),
}

impl ResolvedIntent {
    pub(super) fn record(&self) -> Option<&IntentRecord> {
        match self {
            Self::NoIntent => None,
            Self::Invalid(record) | Self::Valid(record) => Some(record),
        }
    }

    pub(super) fn valid(&self) -> Option<&IntentRecord> {
        match self {
            Self::Valid(record) => Some(record),
            Self::NoIntent | Self::Invalid(_) => None,
        }
    }

    fn bounded(record: IntentRecord, upper_bound: &[u8]) -> Self {
        if upper_bound.is_empty() || record.prefix.as_slice() <= upper_bound {
            Self::Valid(record)
        } else {
            Self::Invalid(record)
        }
    }
}

/// The intents cursor and everything needed to interpret what it returns.
pub(super) struct IntentSource<C> {
    pub(super) cursor: BoundedCursor<C>,
    txn_id: Option<TxnId>,
    status_cache: TransactionStatusCache,
    pub(super) resolved: ResolvedIntent,
    spare: IntentRecord,
    /// Time of the resolved intent as seen from outside its transaction.
    pub(super) txn_dht: EncodedDocHybridTime,
    /// Time of the newest resolved intent written by the reader itself.
    pub(super) same_txn_dht: EncodedDocHybridTime,
    /// `[prefix][HYBRID_TIME][txn_dht]`, comparable with regular keys.
    pub(super) encoded_key: Vec<u8>,
    pub(super) seek_buffer: Vec<u8>,
}

impl<C: KvCursor> IntentSource<C> {
    pub(super) fn new(
        cursor: C,
        txn_context: TransactionOperationContext,
        read_op: &ReadOperationData,
    ) -> Self {
        Self {
            cursor: BoundedCursor::new(cursor),
            txn_id: txn_context.txn_id,
            status_cache: TransactionStatusCache::new(
                txn_context.resolver,
                read_op.read_time,
                read_op.deadline,
            ),
            resolved: ResolvedIntent::NoIntent,
            spare: IntentRecord::default(),
            txn_dht: EncodedDocHybridTime::MIN,
            same_txn_dht: EncodedDocHybridTime::MIN,
            encoded_key: Vec::new(),
            seek_buffer: Vec::new(),
        }
    }

    /// Time reported for the resolved intent.
    pub(super) fn write_time(&self) -> EncodedDocHybridTime {
        if self.same_txn_dht.is_min() {
            self.txn_dht
        } else {
            self.same_txn_dht
        }
    }

    pub(super) fn same_transaction(&self) -> bool {
        !self.same_txn_dht.is_min()
    }

    pub(super) fn reset_upper_bound(&mut self, scan_bound: &[u8]) {
        if scan_bound.is_empty() {
            self.cursor.clear_upper_bound();
        } else {
            self.cursor.set_upper_bound(&[scan_bound, &[0]]);
        }
    }

    fn clear_resolved(&mut self) {
        if let ResolvedIntent::Valid(record) | ResolvedIntent::Invalid(record) =
            mem::replace(&mut self.resolved, ResolvedIntent::NoIntent)
        {
            self.spare = record;
        }
        self.txn_dht = EncodedDocHybridTime::MIN;
        self.same_txn_dht = EncodedDocHybridTime::MIN;
    }

    /// Considers the intent under the cursor for the current key.
    fn process_intent(
        &mut self,
        read_time: &EncodedReadHybridTime,
        upper_bound: &[u8],
    ) -> Result<(), DocDbError> {
        let decoded = decode_strong_write_intent(
            self.cursor.key(),
            self.cursor.value(),
            self.txn_id,
            &mut self.status_cache,
        )?;

        let resolved_time = if decoded.same_transaction {
            self.same_txn_dht
        } else {
            self.txn_dht
        };
        if decoded.value_time <= resolved_time {
            trace!(value_time = %decoded.value_time, "Intent not newer than resolved");
            return Ok(());
        }
        if decoded.value_time > decoded.max_allowed_value_time(read_time) {
            trace!(value_time = %decoded.value_time, "Intent not visible at read time");
            return Ok(());
        }
        if !decoded.same_transaction && !self.same_txn_dht.is_min() {
            return Ok(());
        }

        let mut record = match mem::replace(&mut self.resolved, ResolvedIntent::NoIntent) {
            ResolvedIntent::NoIntent => {
                let mut record = mem::take(&mut self.spare);
                record.prefix.clear();
                record.prefix.extend_from_slice(decoded.intent_prefix);
                record
            }
            ResolvedIntent::Valid(record) | ResolvedIntent::Invalid(record) => record,
        };
        record.value.clear();
        record.value.extend_from_slice(decoded.intent_value);

        if decoded.same_transaction {
            self.same_txn_dht = decoded.value_time;
            // Own writes are pinned to the read time so that no foreign intent
            // or regular record written later can shadow them.
            self.txn_dht = read_time.read;
        } else {
            self.txn_dht = decoded.value_time;
        }
        self.resolved = ResolvedIntent::bounded(record, upper_bound);
        Ok(())
    }

    fn rebuild_encoded_key(&mut self) {
        if let Some(record) = self.resolved.record() {
            self.encoded_key.clear();
            self.encoded_key.extend_from_slice(&record.prefix);
            append_time_suffix(&mut self.encoded_key, &self.txn_dht);
        }
    }
}

impl<C: KvCursor> IntentAwareIterator<C> {
    /// Resolves the newest visible intent starting at the intents cursor,
    /// scanning in `direction` until the key changes after a resolution.
    pub(super) fn seek_to_suitable_intent(&mut self, direction: Direction) {
        if self.status.is_some() {
            return;
        }
        let Some(intents) = self.intents.as_mut() else {
            return;
        };
        intents.clear_resolved();

        while intents.cursor.valid() {
            let intent_key = intents.cursor.key();
            if intent_key.first() == Some(&key::TRANSACTION_ID) {
                // Transaction metadata and reverse index, never intents.
                match direction {
                    Direction::Forward => intents.cursor.seek(&[key::TRANSACTION_ID + 1]),
                    Direction::Backward => {
                        intents.cursor.set_upper_bound(&[&[key::TRANSACTION_ID]]);
                        intents.cursor.seek_to_last();
                    }
                }
                continue;
            }
            if let Some(record) = intents.resolved.record() {
                if !is_intent_for_same_key(intent_key, &record.prefix) {
                    break;
                }
            }

            if let Err(e) = intents.process_intent(&self.read_time, &self.upper_bound) {
                let intent_key = debug_key_to_string(intents.cursor.key());
                if e.is_corruption() {
                    error!(key = %intent_key, error = %e, "Malformed intent");
                } else {
                    warn!(key = %intent_key, error = %e, "Failed to resolve intent");
                }
                self.status = Some(e);
                return;
            }
            intents.cursor.step(direction);
        }

        if let Err(e) = intents.cursor.status() {
            self.status = Some(e.into());
            return;
        }
        intents.rebuild_encoded_key();
    }

    /// Limits the intents cursor to what can still merge before or with the
    /// regular candidate.
    pub(super) fn update_intent_upper_bound(&mut self) {
        let Some(intents) = self.intents.as_mut() else {
            return;
        };
        if self.regular_entry.is_some() {
            let regular_key = self.regular.key();
            let logical = &regular_key[..regular_key.len().saturating_sub(TIME_SUFFIX_SIZE)];
            intents.cursor.set_upper_bound(&[logical, &[MAX_BYTE]]);
        } else {
            intents.reset_upper_bound(&self.upper_bound);
        }
    }

    /// Seeks the intents cursor to its `seek_buffer` unless the resolved intent
    /// already lies at or past the first `prefix_len` bytes of it.
    pub(super) fn intent_seek_forward(&mut self, prefix_len: usize) {
        self.update_intent_upper_bound();
        let Some(intents) = self.intents.as_mut() else {
            return;
        };
        if let Some(record) = intents.resolved.record() {
            if record.prefix.as_slice() >= &intents.seek_buffer[..prefix_len] {
                return;
            }
        }
        intents.cursor.seek(&intents.seek_buffer);
        self.seek_to_suitable_intent(Direction::Forward);
    }

    /// Re-evaluates the resolved intent against the current scan bound, or
    /// resolves one from the current cursor position if there is none.
    pub(super) fn revalidate_intent(&mut self) {
        let Some(intents) = self.intents.as_mut() else {
            return;
        };
        match mem::replace(&mut intents.resolved, ResolvedIntent::NoIntent) {
            ResolvedIntent::NoIntent => self.seek_to_suitable_intent(Direction::Forward),
            ResolvedIntent::Valid(record) | ResolvedIntent::Invalid(record) => {
                intents.resolved = ResolvedIntent::bounded(record, &self.upper_bound);
            }
        }
    }

    /// Positions the intents cursor on the strong write intents of exactly
    /// `key`, bounded to that key and the scan bound.
    pub(super) fn seek_intents_of(&mut self, key: &[u8]) {
        let Some(intents) = self.intents.as_mut() else {
            return;
        };
        if self.upper_bound.is_empty() || key <= self.upper_bound.as_slice() {
            intents.cursor.set_upper_bound(&[key, &[MAX_BYTE]]);
        } else {
            intents.reset_upper_bound(&self.upper_bound);
        }
        intents.seek_buffer.clear();
        intents.seek_buffer.extend_from_slice(key);
        intents.seek_buffer.extend_from_slice(&STRONG_WRITE_SUFFIX);
        intents.cursor.seek(&intents.seek_buffer);
    }

    /// Collects every visible strong write intent of exactly `key`, newest
    /// first. Once the reader's own write is among them, foreign intents are
    /// dropped. The resolved intent is left stale, so callers reposition.
    pub(super) fn visible_intents_of(
        &mut self,
        key: &[u8],
    ) -> Result<Vec<VisibleIntent>, DocDbError> {
        self.check_status()?;
        self.seek_intents_of(key);
        let Some(intents) = self.intents.as_mut() else {
            return Ok(Vec::new());
        };

        let mut visible = Vec::new();
        while intents.cursor.valid() && is_intent_for_same_key(intents.cursor.key(), key) {
            let decoded = match decode_strong_write_intent(
                intents.cursor.key(),
                intents.cursor.value(),
                intents.txn_id,
                &mut intents.status_cache,
            ) {
                Ok(decoded) => decoded,
                Err(e) => {
                    let e = DocDbError::from(e);
                    let intent_key = debug_key_to_string(intents.cursor.key());
                    if e.is_corruption() {
                        error!(key = %intent_key, error = %e, "Malformed intent");
                    } else {
                        warn!(key = %intent_key, error = %e, "Failed to resolve intent");
                    }
                    self.status = Some(e.clone());
                    return Err(e);
                }
            };
            if !decoded.value_time.is_min()
                && decoded.value_time <= decoded.max_allowed_value_time(&self.read_time)
            {
                visible.push(VisibleIntent {
                    same_transaction: decoded.same_transaction,
                    time: decoded.value_time,
                    value: decoded.intent_value.to_vec(),
                });
            }
            intents.cursor.next();
        }
        if let Err(e) = intents.cursor.status() {
            let e = DocDbError::from(e);
            self.status = Some(e.clone());
            return Err(e);
        }

        if visible.iter().any(|intent| intent.same_transaction) {
            visible.retain(|intent| intent.same_transaction);
        }
        visible.sort_by(|a, b| b.rank().cmp(&a.rank()));
        trace!(key = %debug_key_to_string(key), count = visible.len(), "Collected visible intents");
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::docdb::{DocDbError, IteratorConfig};
    use crate::storage::Space;
    use crate::txn::{IntentTypeSet, TxnError, TxnId};

    #[test]
    fn test_committed_intent_is_visible() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("k"), dht(10), b"v1");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(1), dht(11), b"t1");
        });
        fixture.resolver.commit(TxnId(1), ht(12));

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"t1".to_vec(), 12)));
    }

    #[test]
    fn test_newest_committed_intent_wins() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(1), dht(3), b"t1");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(2), dht(4), b"t2");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(3), dht(5), b"t3");
        });
        fixture.resolver.commit(TxnId(1), ht(9));
        fixture.resolver.commit(TxnId(2), ht(7));
        fixture.resolver.commit(TxnId(3), ht(20));

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"t1".to_vec(), 9)));
    }

    #[test]
    fn test_own_intent_visible_past_read_time() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("k"), dht(10), b"old");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(7), dht(30), b"mine");
        });
        fixture.resolver.begin(TxnId(7));

        let mut iter = fixture.iter_with(read_at(15), Some(TxnId(7)), IteratorConfig::default());
        iter.seek(&key("k"));
        let fetched = iter.fetch().unwrap().unwrap();
        assert_eq!(fetched.key, key("k").as_slice());
        assert_eq!(fetched.value, b"mine");
        assert!(fetched.same_transaction);
        assert_eq!(fetched.write_time, dht(30).encode());
        assert_eq!(iter.restart_read_ht(), None);

        // Other readers do not see it.
        let mut other = fixture.iter(read_at(15));
        other.seek(&key("k"));
        assert_eq!(entry(&other), Some((key("k"), b"old".to_vec(), 10)));
    }

    #[test]
    fn test_own_intent_bounded_by_in_txn_limit() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(7), dht(20), b"early");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(7), dht(30), b"late");
        });
        fixture.resolver.begin(TxnId(7));

        let read_time = read_at(15).with_in_txn_limit(ht(25));
        let mut iter = fixture.iter_with(read_time, Some(TxnId(7)), IteratorConfig::default());
        iter.seek(&key("k"));
        let fetched = iter.fetch().unwrap().unwrap();
        assert_eq!(fetched.value, b"early");
        assert_eq!(fetched.write_time, dht(20).encode());
    }

    #[test]
    fn test_own_intent_shadows_foreign_commits() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(1), dht(2), b"theirs");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(7), dht(3), b"mine");
        });
        fixture.resolver.commit(TxnId(1), ht(14));
        fixture.resolver.begin(TxnId(7));

        let mut iter = fixture.iter_with(read_at(15), Some(TxnId(7)), IteratorConfig::default());
        iter.seek(&key("k"));
        assert_eq!(iter.fetch().unwrap().unwrap().value, b"mine");
    }

    #[test]
    fn test_weak_intents_and_row_locks_are_ignored() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("k"), dht(5), b"base");
            b.put_intent(&key("k"), IntentTypeSet::WEAK_WRITE, TxnId(1), dht(6), b"weak");
            b.put_row_lock(&key("k"), TxnId(2), dht(7));
        });
        fixture.resolver.commit(TxnId(1), ht(8));
        fixture.resolver.commit(TxnId(2), ht(9));

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"base".to_vec(), 5)));
    }

    #[test]
    fn test_transaction_region_skipped_forward() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put_transaction_metadata(TxnId(1), b"meta");
            b.put_transaction_metadata(TxnId(2), b"meta");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(1), dht(5), b"t1");
        });
        fixture.resolver.commit(TxnId(1), ht(6));

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert_eq!(entry(&iter), Some((key("k"), b"t1".to_vec(), 6)));
        iter.next();
        assert_eq!(entry(&iter), None);
        assert!(iter.fetch().is_ok());
    }

    #[test]
    fn test_transaction_region_skipped_backward() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put_intent(&key("a"), IntentTypeSet::STRONG_WRITE, TxnId(1), dht(5), b"ta");
            b.put_intent(&key("b"), IntentTypeSet::STRONG_WRITE, TxnId(1), dht(5), b"tb");
        });
        fixture.resolver.commit(TxnId(1), ht(6));

        let mut iter = fixture.iter(read_at(15));
        iter.seek_to_last_doc_key();
        assert_eq!(entry(&iter), Some((key("b"), b"tb".to_vec(), 6)));
    }

    #[test]
    fn test_corrupt_intent_is_sticky() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(1), b"a");
            let mut bad = key("k");
            bad.extend_from_slice(b"%\x08#short");
            b.put_raw(Space::Intents, bad, b"xx".to_vec());
        });

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("k"));
        assert!(matches!(iter.fetch(), Err(DocDbError::Corruption(_))));
        iter.seek(&key("a"));
        assert!(matches!(iter.fetch(), Err(DocDbError::Corruption(_))));
        assert!(!iter.has_current_entry());
    }

    #[test]
    fn test_status_failure_is_sticky() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put(&key("a"), dht(1), b"a");
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(1), dht(5), b"t1");
        });
        fixture.resolver.fail_lookups(TxnId(1), "coordinator unreachable");

        let mut iter = fixture.iter(read_at(15));
        iter.seek(&key("a"));
        assert!(iter.fetch().unwrap().is_some());
        iter.next();
        assert!(matches!(
            iter.fetch(),
            Err(DocDbError::Txn(TxnError::StatusLookupFailure { .. }))
        ));
        iter.seek(&key("a"));
        assert!(iter.fetch().is_err());
    }

    #[test]
    fn test_status_timeout_surfaces() {
        let fixture = Fixture::new();
        fixture.write(|b| {
            b.put_intent(&key("k"), IntentTypeSet::STRONG_WRITE, TxnId(1), dht(5), b"t1");
        });
        fixture.resolver.begin(TxnId(1));

        let mut iter = fixture.iter_with_deadline(read_at(15), std::time::Instant::now());
        iter.seek(&key("k"));
        assert!(matches!(
            iter.fetch(),
            Err(DocDbError::Txn(TxnError::StatusLookupTimeout { txn_id: TxnId(1) }))
        ));
    }
}
