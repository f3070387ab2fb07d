// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Point queries and merge chain folding on top of iterator positioning.

use std::mem;

use tracing::trace;

use crate::docdb::merge::{AppendOperator, MergeOperator};
use crate::docdb::DocDbError;
use crate::storage::key::{
    append_time_suffix, debug_key_to_string, has_time_suffix, TIME_SUFFIX_SIZE,
};
use crate::storage::value::merge_operand;
use crate::storage::{Direction, KvCursor};
use crate::time::{DocHybridTime, EncodedDocHybridTime, HybridTime, MAX_WRITE_ID};

use super::{EntrySource, IntentAwareIterator};

/// A value with every merge operand folded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullValue {
    pub value: Vec<u8>,
    /// Time of the newest record in the chain.
    pub write_time: EncodedDocHybridTime,
}

impl<C: KvCursor> IntentAwareIterator<C> {
    /// Returns the earliest visible write time of `key` later than `min_ht`,
    /// looking at both spaces.
    ///
    /// The iterator must be positioned at or before `key`. It is left near
    /// `key`, so callers reposition before iterating further.
    pub fn find_oldest_record(
        &mut self,
        key: &[u8],
        min_ht: HybridTime,
    ) -> Result<Option<HybridTime>, DocDbError> {
        self.check_status()?;
        if !self.has_current_entry() {
            return Ok(None);
        }
        let min_time = DocHybridTime::new(min_ht, MAX_WRITE_ID).encode();
        let mut oldest: Option<EncodedDocHybridTime> = None;

        if let Some(intent_time) = self.intent_time_for(key) {
            if intent_time > min_time {
                oldest = Some(intent_time);
            }
        }
        self.check_status()?;

        // Land on the oldest version newer than `min_time`, then skip forward
        // past the invisible ones. Never seeks backward.
        let mut target = mem::take(&mut self.seek_buffer);
        target.clear();
        target.extend_from_slice(key);
        append_time_suffix(&mut target, &min_time);
        if self.regular_entry.is_none() || self.regular.key() < target.as_slice() {
            self.regular.seek(&target);
        }
        self.seek_buffer = target;
        if self.regular.valid() {
            self.regular.prev();
        } else {
            self.check_regular_status()?;
            self.regular.seek_to_last();
        }
        self.skip_future_records(Direction::Forward);
        self.check_status()?;

        if let Some(regular_time) = self.regular_time_for(key) {
            if regular_time > min_time {
                oldest = Some(oldest.map_or(regular_time, |t| t.min(regular_time)));
            }
        }

        self.fill_entry();
        self.need_fetch.set(false);
        trace!(key = %debug_key_to_string(key), oldest = ?oldest, "Found oldest record");
        Ok(oldest.map(|t| t.decode().hybrid_time()))
    }

    /// Finds the newest visible write of `key` across both spaces.
    ///
    /// If it is later than `latest_time`, raises `latest_time` to it and copies
    /// its value into `value`. The iterator must be positioned at or before
    /// `key`. Does nothing once the iterator is exhausted.
    pub fn find_latest_record(
        &mut self,
        key: &[u8],
        latest_time: &mut EncodedDocHybridTime,
        value: Option<&mut Vec<u8>>,
    ) -> Result<(), DocDbError> {
        self.check_status()?;
        if key.is_empty() {
            return Err(DocDbError::InvalidArgument("empty key".to_string()));
        }
        if has_time_suffix(key) {
            return Err(DocDbError::InvalidArgument(format!(
                "key carries a time suffix: {}",
                debug_key_to_string(key)
            )));
        }

        if !self.has_current_entry() {
            return Ok(());
        }

        let mut found_later_intent = false;
        if let Some(intent_time) = self.intent_time_for(key) {
            if intent_time > *latest_time {
                *latest_time = intent_time;
                found_later_intent = true;
            }
        }
        self.check_status()?;

        let mut target = mem::take(&mut self.seek_buffer);
        target.clear();
        target.extend_from_slice(key);
        append_time_suffix(&mut target, &self.read_time.skip_limit);
        self.seek_forward_regular(&target);
        self.seek_buffer = target;
        self.check_status()?;

        let mut found_later_regular = false;
        if let Some(regular_time) = self.regular_time_for(key) {
            self.max_seen.make_at_least(regular_time);
            if regular_time > *latest_time {
                *latest_time = regular_time;
                found_later_regular = true;
            }
        }

        if let Some(out) = value {
            if found_later_regular {
                out.clear();
                out.extend_from_slice(self.regular_value());
            } else if found_later_intent {
                if let Some(record) = self.intents.as_ref().and_then(|i| i.resolved.valid()) {
                    out.clear();
                    out.extend_from_slice(&record.value);
                }
            }
        }

        self.fill_entry();
        self.need_fetch.set(false);
        Ok(())
    }

    /// Folds the merge chain starting at the current entry using
    /// [`AppendOperator`].
    pub fn next_full_value(&mut self) -> Result<Option<FullValue>, DocDbError> {
        self.next_full_value_with(&AppendOperator)
    }

    /// Folds the merge chain starting at the current entry.
    ///
    /// Older visible records of the same key, committed or intents, are read
    /// newest first while they are merge operands. The first full value
    /// becomes the base, and the walk stops there or once the key has no older
    /// records. The iterator is left on the starting entry.
    pub fn next_full_value_with(
        &mut self,
        merge_operator: &dyn MergeOperator,
    ) -> Result<Option<FullValue>, DocDbError> {
        let Some(entry) = self.fetch()? else {
            return Ok(None);
        };
        let Some(first_operand) = merge_operand(entry.value) else {
            return Ok(Some(FullValue {
                value: entry.value.to_vec(),
                write_time: entry.write_time,
            }));
        };
        let write_time = entry.write_time;
        let head_rank = (entry.same_transaction, entry.write_time);
        let mut operands = vec![first_operand.to_vec()];
        let key = entry.key.to_vec();

        if self.winner(false) == Some(EntrySource::Regular) {
            self.regular.next();
            self.skip_future_records(Direction::Forward);
        }
        let mut older_intents = self
            .visible_intents_of(&key)?
            .into_iter()
            .filter(|intent| intent.rank() < head_rank)
            .peekable();

        // Older records of the key come from both spaces, newest first.
        let mut base = None;
        loop {
            let regular_time = self.regular_time_for(&key);
            let take_intent = match (older_intents.peek(), regular_time) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(intent), Some(time)) => intent.rank() > (false, time),
            };
            if take_intent {
                let Some(intent) = older_intents.next() else {
                    break;
                };
                match merge_operand(&intent.value) {
                    Some(operand) => operands.push(operand.to_vec()),
                    None => {
                        base = Some(intent.value.clone());
                        break;
                    }
                }
            } else {
                let value = self.regular_value();
                match merge_operand(value) {
                    Some(operand) => operands.push(operand.to_vec()),
                    None => {
                        base = Some(value.to_vec());
                        break;
                    }
                }
                self.regular.next();
                self.skip_future_records(Direction::Forward);
            }
        }
        self.check_status()?;

        operands.reverse();
        let operand_refs: Vec<&[u8]> = operands.iter().map(Vec::as_slice).collect();
        let value = merge_operator.full_merge(&key, base.as_deref(), &operand_refs);
        trace!(
            key = %debug_key_to_string(&key),
            operands = operand_refs.len(),
            has_base = base.is_some(),
            "Folded merge chain"
        );

        self.seek_internal(&key);
        self.need_fetch.set(false);
        self.check_status()?;
        Ok(Some(FullValue { value, write_time }))
    }

    /// Write time of the newest visible intent of exactly `key`, as `fetch`
    /// would report it. Raises the seen time by its externally visible time.
    fn intent_time_for(&mut self, key: &[u8]) -> Option<EncodedDocHybridTime> {
        self.seek_intents_of(key);
        self.seek_to_suitable_intent(Direction::Forward);

        let intents = self.intents.as_ref()?;
        let write_time = match intents.resolved.valid() {
            Some(record) if record.prefix == key => intents.write_time(),
            _ => return None,
        };
        let txn_dht = intents.txn_dht;
        self.max_seen.make_at_least(txn_dht);
        Some(write_time)
    }

    /// Time of the regular candidate if it is a version of exactly `key`.
    fn regular_time_for(&self, key: &[u8]) -> Option<EncodedDocHybridTime> {
        let entry = self.regular_entry?;
        let stored = self.regular.key();
        let logical = &stored[..stored.len().saturating_sub(TIME_SUFFIX_SIZE)];
        (logical == key).then_some(entry.write_time)
    }

    /// Value body of the regular candidate. Empty if there is none.
    pub(super) fn regular_value(&self) -> &[u8] {
        match self.regular_entry {
            Some(entry) => self.regular.value().get(entry.value_offset..).unwrap_or(&[]),
            None => &[],
        }
    }
}
