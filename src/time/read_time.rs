// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Read snapshots.
//!
//! A read is described by four hybrid times:
//!
//! - `read`: the snapshot time proper.
//! - `local_limit`: records written at or before this time on the serving node
//!   may be concurrent with the read and are treated as visible.
//! - `global_limit`: upper edge of the clock uncertainty window across nodes.
//! - `in_txn_limit`: a transaction does not see its own writes made after this time.
//!
//! `local_limit <= global_limit` is not assumed. Visibility checks pick the
//! limit to use based on where a candidate's provisional time falls.

use super::{DocHybridTime, EncodedDocHybridTime, HybridTime, MAX_WRITE_ID};

/// The hybrid times bounding one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHybridTime {
    pub read: HybridTime,
    pub local_limit: HybridTime,
    pub global_limit: HybridTime,
    pub in_txn_limit: HybridTime,
}

impl ReadHybridTime {
    /// A read with no uncertainty window: every limit equals `read`.
    pub fn single_time(read: HybridTime) -> Self {
        Self::from_limits(read, read, read)
    }

    /// A read with explicit uncertainty limits. `in_txn_limit` is unbounded.
    pub fn from_limits(read: HybridTime, local_limit: HybridTime, global_limit: HybridTime) -> Self {
        Self {
            read,
            local_limit,
            global_limit,
            in_txn_limit: HybridTime::MAX,
        }
    }

    /// Restricts which of its own writes the reading transaction may see.
    pub fn with_in_txn_limit(mut self, in_txn_limit: HybridTime) -> Self {
        self.in_txn_limit = in_txn_limit;
        self
    }

    /// `max(read, local_limit)`, the bound applied to plain committed records.
    #[inline]
    pub fn regular_limit(&self) -> HybridTime {
        self.read.max(self.local_limit)
    }
}

impl Default for ReadHybridTime {
    fn default() -> Self {
        Self::single_time(HybridTime::MAX)
    }
}

impl std::fmt::Display for ReadHybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ read: {} local_limit: {} global_limit: {} in_txn_limit: {} }}",
            self.read, self.local_limit, self.global_limit, self.in_txn_limit
        )
    }
}

/// [`ReadHybridTime`] with every limit encoded as `(limit, MAX_WRITE_ID)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedReadHybridTime {
    pub read: EncodedDocHybridTime,
    pub local_limit: EncodedDocHybridTime,
    pub global_limit: EncodedDocHybridTime,
    pub in_txn_limit: EncodedDocHybridTime,
    /// Encoded `max(read, local_limit)`.
    pub regular_limit: EncodedDocHybridTime,
    /// Encoded `max(global_limit, read, local_limit)`. Every record later than
    /// this is invisible regardless of how it was written, so seeking straight
    /// to it never skips a visible record.
    pub skip_limit: EncodedDocHybridTime,
}

impl From<&ReadHybridTime> for EncodedReadHybridTime {
    fn from(read_time: &ReadHybridTime) -> Self {
        let encode = |ht: HybridTime| DocHybridTime::new(ht, MAX_WRITE_ID).encode();
        let regular_limit = read_time.regular_limit();
        Self {
            read: encode(read_time.read),
            local_limit: encode(read_time.local_limit),
            global_limit: encode(read_time.global_limit),
            in_txn_limit: encode(read_time.in_txn_limit),
            regular_limit: encode(regular_limit),
            skip_limit: encode(regular_limit.max(read_time.global_limit)),
        }
    }
}
