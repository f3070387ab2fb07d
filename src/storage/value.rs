// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Stored value markers.
//!
//! Values in the regular space are either a plain body, a body written by an
//! applied transaction (`[HYBRID_TIME][intent time:12][body]`), or a merge
//! operand (`[MERGE_RECORD][operand]`).

use crate::time::{EncodedDocHybridTime, ENCODED_DOC_HT_SIZE};

use super::key::{hex, HYBRID_TIME};
use super::StorageError;

/// Marks a value as a merge operand to be folded onto older records.
pub const MERGE_RECORD: u8 = b'k';
/// Marks an intent body that only locks the row and carries no value.
pub const ROW_LOCK: u8 = b'l';
/// Precedes the transaction id in an intent value.
pub const TRANSACTION_ID: u8 = b'x';
/// Precedes the write id in an intent value.
pub const WRITE_ID: u8 = b'w';

/// Size of the `[HYBRID_TIME][intent time]` prefix of an applied value.
pub const APPLIED_VALUE_PREFIX_SIZE: usize = 1 + ENCODED_DOC_HT_SIZE;

/// Encodes a value written by a transaction whose intent was made at `intent_time`.
pub fn encode_applied_value(intent_time: &EncodedDocHybridTime, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(APPLIED_VALUE_PREFIX_SIZE + body.len());
    out.push(HYBRID_TIME);
    out.extend_from_slice(intent_time.as_slice());
    out.extend_from_slice(body);
    out
}

/// Returns the intent time embedded in a value written by a transaction, or
/// `None` for a plain value.
#[inline]
pub fn applied_intent_time(value: &[u8]) -> Result<Option<EncodedDocHybridTime>, StorageError> {
    if value.first() != Some(&HYBRID_TIME) {
        return Ok(None);
    }
    EncodedDocHybridTime::from_start(&value[1..])
        .map(Some)
        .map_err(|_| {
            StorageError::Corruption(format!(
                "truncated intent time in applied value: {}",
                hex(value)
            ))
        })
}

/// Encodes a merge operand.
pub fn encode_merge_record(operand: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + operand.len());
    out.push(MERGE_RECORD);
    out.extend_from_slice(operand);
    out
}

#[inline]
pub fn is_merge_record(value: &[u8]) -> bool {
    value.first() == Some(&MERGE_RECORD)
}

/// Returns the operand of a merge record, or `None` if `value` is a full value.
#[inline]
pub fn merge_operand(value: &[u8]) -> Option<&[u8]> {
    if is_merge_record(value) {
        Some(&value[1..])
    } else {
        None
    }
}
