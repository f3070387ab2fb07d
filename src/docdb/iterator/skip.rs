// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Skipping regular records the read snapshot cannot see.

use std::mem;

use tracing::{error, trace};

use crate::storage::key::{append_time_suffix, debug_key_to_string, hex, split_time_suffix};
use crate::storage::value::{applied_intent_time, APPLIED_VALUE_PREFIX_SIZE};
use crate::storage::{Direction, KvCursor};
use crate::time::EncodedDocHybridTime;

use super::{IntentAwareIterator, RegularEntry};

impl<C: KvCursor> IntentAwareIterator<C> {
    /// Moves the regular cursor in `direction` until it rests on a visible
    /// record, and makes that record the regular candidate.
    ///
    /// Going forward, after `max_next_calls_while_skipping_future_records`
    /// invisible records in a row the cursor seeks to the first version of the
    /// current key at or before `skip_limit`. Every record in between is later
    /// than any limit, so the landing position is the same as stepping there.
    pub(super) fn skip_future_records(&mut self, direction: Direction) {
        self.regular_entry = None;
        if self.status.is_some() {
            return;
        }

        let threshold = self.config.max_next_calls_while_skipping_future_records;
        let use_fast_skip = direction == Direction::Forward && self.fast_skip && threshold > 0;
        let mut invisible_steps = 0;

        while self.regular.valid() {
            let key = self.regular.key();
            let (logical, write_time) = match split_time_suffix(key) {
                Ok(parts) => parts,
                Err(e) => {
                    error!(key = %hex(key), error = %e, "Malformed regular key");
                    self.status = Some(e.into());
                    return;
                }
            };

            let value = self.regular.value();
            let (visible, value_offset) = match applied_intent_time(value) {
                Ok(Some(intent_time)) => {
                    let max_allowed = if intent_time <= self.read_time.local_limit {
                        self.read_time.global_limit
                    } else {
                        self.read_time.read
                    };
                    (write_time <= max_allowed, APPLIED_VALUE_PREFIX_SIZE)
                }
                Ok(None) => (write_time <= self.read_time.regular_limit, 0),
                Err(e) => {
                    error!(key = %debug_key_to_string(key), error = %e, "Malformed regular value");
                    self.status = Some(e.into());
                    return;
                }
            };

            if visible {
                self.regular_entry = Some(RegularEntry {
                    write_time,
                    value_offset,
                });
                return;
            }

            trace!(key = %debug_key_to_string(key), "Skipping future record");
            if use_fast_skip
                && invisible_steps >= threshold
                && self.read_time.skip_limit < write_time
            {
                let mut target = mem::take(&mut self.seek_buffer);
                target.clear();
                target.extend_from_slice(logical);
                append_time_suffix(&mut target, &self.read_time.skip_limit);
                self.regular.seek(&target);
                self.seek_buffer = target;
                invisible_steps = 0;
            } else {
                self.regular.step(direction);
                invisible_steps += 1;
            }
        }

        if let Err(e) = self.regular.status() {
            self.status = Some(e.into());
        }
    }

    /// Time of the current regular candidate, or `MIN` if there is none.
    pub(super) fn regular_write_time(&self) -> EncodedDocHybridTime {
        self.regular_entry
            .map_or(EncodedDocHybridTime::MIN, |entry| entry.write_time)
    }
}
