// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Provisional record layout and decoding.
//!
//! Intent key: `[sub doc key][INTENT_TYPE_SET][type bits][HYBRID_TIME][intent time:12]`
//!
//! Intent value: `[TRANSACTION_ID][txn id:8 BE][WRITE_ID][write id:4 BE][body]`
//!
//! The intents space also holds per-transaction bookkeeping, all under keys
//! starting with [`key::TRANSACTION_ID`]:
//!
//! - metadata: `[TRANSACTION_ID][txn id]`
//! - reverse index: `[TRANSACTION_ID][txn id][HYBRID_TIME][intent time]`, whose
//!   value is the intent key it points at.

use std::ops::BitOr;

use tracing::trace;

use crate::storage::key::{self, hex, HYBRID_TIME, INTENT_TYPE_SET, TIME_SUFFIX_SIZE};
use crate::storage::value::{self, ROW_LOCK};
use crate::storage::StorageError;
use crate::time::{DocHybridTime, EncodedDocHybridTime, EncodedReadHybridTime, WriteId};

use super::{TransactionStatusCache, TxnError, TxnId};

/// Bitset describing what an intent locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntentTypeSet(u8);

impl IntentTypeSet {
    pub const WEAK_READ: Self = Self(1);
    pub const WEAK_WRITE: Self = Self(2);
    pub const STRONG_READ: Self = Self(4);
    pub const STRONG_WRITE: Self = Self(8);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Only strong write intents carry a value that readers may observe.
    #[inline]
    pub fn is_strong_write(self) -> bool {
        self.contains(Self::STRONG_WRITE)
    }
}

impl BitOr for IntentTypeSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Appending this to a logical key seeks to its strong write intents, past
/// intents that only lock it for reading.
pub const STRONG_WRITE_SUFFIX: [u8; 2] = [INTENT_TYPE_SET, IntentTypeSet::STRONG_WRITE.bits()];

/// Size of the intent value header preceding the body.
pub const INTENT_VALUE_HEADER_SIZE: usize = 1 + TxnId::ENCODED_SIZE + 1 + 4;

const INTENT_KEY_SUFFIX_SIZE: usize = 2 + TIME_SUFFIX_SIZE;

pub fn encode_intent_key(prefix: &[u8], types: IntentTypeSet, time: &DocHybridTime) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + INTENT_KEY_SUFFIX_SIZE);
    out.extend_from_slice(prefix);
    out.push(INTENT_TYPE_SET);
    out.push(types.bits());
    key::append_time_suffix(&mut out, &time.encode());
    out
}

/// A decoded intent key, borrowing the logical prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedIntentKey<'a> {
    pub prefix: &'a [u8],
    pub types: IntentTypeSet,
    pub time: EncodedDocHybridTime,
}

pub fn decode_intent_key(key: &[u8]) -> Result<DecodedIntentKey<'_>, StorageError> {
    let prefix_len = key.len().checked_sub(INTENT_KEY_SUFFIX_SIZE).ok_or_else(|| {
        StorageError::Corruption(format!("intent key too short: {}", hex(key)))
    })?;
    if key[prefix_len] != INTENT_TYPE_SET || key[prefix_len + 2] != HYBRID_TIME {
        return Err(StorageError::Corruption(format!(
            "malformed intent key: {}",
            hex(key)
        )));
    }
    Ok(DecodedIntentKey {
        prefix: &key[..prefix_len],
        types: IntentTypeSet::from_bits(key[prefix_len + 1]),
        time: EncodedDocHybridTime::from_slice(&key[prefix_len + 3..])?,
    })
}

pub fn encode_intent_value(txn_id: TxnId, write_id: WriteId, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(INTENT_VALUE_HEADER_SIZE + body.len());
    out.push(value::TRANSACTION_ID);
    out.extend_from_slice(&txn_id.to_be_bytes());
    out.push(value::WRITE_ID);
    out.extend_from_slice(&write_id.to_be_bytes());
    out.extend_from_slice(body);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedIntentValue<'a> {
    pub txn_id: TxnId,
    pub write_id: WriteId,
    pub body: &'a [u8],
}

pub fn decode_intent_value(value: &[u8]) -> Result<DecodedIntentValue<'_>, StorageError> {
    let malformed = || StorageError::Corruption(format!("malformed intent value: {}", hex(value)));
    if value.len() < INTENT_VALUE_HEADER_SIZE
        || value[0] != value::TRANSACTION_ID
        || value[1 + TxnId::ENCODED_SIZE] != value::WRITE_ID
    {
        return Err(malformed());
    }
    let txn_bytes: [u8; TxnId::ENCODED_SIZE] = value[1..1 + TxnId::ENCODED_SIZE]
        .try_into()
        .map_err(|_| malformed())?;
    let write_id_bytes: [u8; 4] = value[2 + TxnId::ENCODED_SIZE..INTENT_VALUE_HEADER_SIZE]
        .try_into()
        .map_err(|_| malformed())?;
    Ok(DecodedIntentValue {
        txn_id: TxnId::from_be_bytes(txn_bytes),
        write_id: WriteId::from_be_bytes(write_id_bytes),
        body: &value[INTENT_VALUE_HEADER_SIZE..],
    })
}

pub fn transaction_metadata_key(txn_id: TxnId) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + TxnId::ENCODED_SIZE);
    out.push(key::TRANSACTION_ID);
    out.extend_from_slice(&txn_id.to_be_bytes());
    out
}

pub fn reverse_index_key(txn_id: TxnId, time: &DocHybridTime) -> Vec<u8> {
    let mut out = transaction_metadata_key(txn_id);
    key::append_time_suffix(&mut out, &time.encode());
    out
}

/// Returns true if `key` is an intent on exactly the logical key `prefix`.
#[inline]
pub fn is_intent_for_same_key(key: &[u8], prefix: &[u8]) -> bool {
    key.len() > prefix.len() && key.starts_with(prefix) && key[prefix.len()] == INTENT_TYPE_SET
}

/// A strong write intent decoded against the reader's transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedStrongWriteIntent<'a> {
    /// Logical key the intent writes.
    pub intent_prefix: &'a [u8],
    /// Value body, without the intent value header.
    pub intent_value: &'a [u8],
    /// Time the intent was written.
    pub intent_time: EncodedDocHybridTime,
    /// Time at which the written value becomes visible. `MIN` if never visible
    /// to this reader.
    pub value_time: EncodedDocHybridTime,
    pub same_transaction: bool,
}

impl DecodedStrongWriteIntent<'_> {
    /// The latest `value_time` this read may observe.
    ///
    /// Own writes are bounded by `in_txn_limit`. Foreign intents written past
    /// `local_limit` cannot be concurrent with the read and must commit by
    /// `read`. Earlier ones may, so they are allowed up to `global_limit`.
    pub fn max_allowed_value_time(&self, read_time: &EncodedReadHybridTime) -> EncodedDocHybridTime {
        if self.same_transaction {
            read_time.in_txn_limit
        } else if self.intent_time > read_time.local_limit {
            read_time.read
        } else {
            read_time.global_limit
        }
    }
}

/// Decodes the intent at `key`/`value`, resolving its owner's commit time
/// through `status_cache` unless the reader wrote it.
///
/// Weak intents and row locks decode with `value_time = MIN` and never surface.
pub fn decode_strong_write_intent<'a>(
    key: &'a [u8],
    value: &'a [u8],
    txn_id: Option<TxnId>,
    status_cache: &mut TransactionStatusCache,
) -> Result<DecodedStrongWriteIntent<'a>, TxnError> {
    let decoded_key = decode_intent_key(key)?;
    let decoded_value = decode_intent_value(value)?;
    let same_transaction = txn_id == Some(decoded_value.txn_id);

    let value_time = if !decoded_key.types.is_strong_write()
        || decoded_value.body.first() == Some(&ROW_LOCK)
    {
        EncodedDocHybridTime::MIN
    } else if same_transaction {
        decoded_key.time
    } else {
        match status_cache.commit_time(decoded_value.txn_id)? {
            Some(commit_ht) => DocHybridTime::new(commit_ht, decoded_value.write_id).encode(),
            None => EncodedDocHybridTime::MIN,
        }
    };

    trace!(
        txn_id = %decoded_value.txn_id,
        intent_time = %decoded_key.time,
        value_time = %value_time,
        same_transaction,
        "Decoded intent"
    );

    Ok(DecodedStrongWriteIntent {
        intent_prefix: decoded_key.prefix,
        intent_value: decoded_value.body,
        intent_time: decoded_key.time,
        value_time,
        same_transaction,
    })
}
