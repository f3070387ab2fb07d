// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Builds raw write batches from document-level mutations.

use crate::storage::key::append_time_suffix;
use crate::storage::value::{encode_applied_value, encode_merge_record, ROW_LOCK};
use crate::storage::{Space, WriteBatch};
use crate::time::DocHybridTime;
use crate::txn::intent::{
    encode_intent_key, encode_intent_value, reverse_index_key, transaction_metadata_key,
};
use crate::txn::{IntentTypeSet, TxnId};

/// Document-level mutations lowered onto both key spaces.
///
/// `key` arguments are encoded logical keys (see
/// [`SubDocKey::encode`](crate::storage::SubDocKey::encode)). Value bodies are
/// opaque except for their first byte, which must not be one of the markers in
/// [`storage::value`](crate::storage::value).
#[derive(Debug, Clone, Default)]
pub struct DocWriteBatch {
    batch: WriteBatch,
}

impl DocWriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a committed value at `time`.
    pub fn put(&mut self, key: &[u8], time: DocHybridTime, value: &[u8]) {
        self.batch
            .put(Space::Regular, Self::regular_key(key, &time), value.to_vec());
    }

    /// Writes a value applied from a transaction that committed at
    /// `commit_time` after writing its intent at `intent_time`.
    pub fn put_applied(
        &mut self,
        key: &[u8],
        commit_time: DocHybridTime,
        intent_time: DocHybridTime,
        body: &[u8],
    ) {
        self.batch.put(
            Space::Regular,
            Self::regular_key(key, &commit_time),
            encode_applied_value(&intent_time.encode(), body),
        );
    }

    /// Writes a merge operand at `time`.
    pub fn put_merge(&mut self, key: &[u8], time: DocHybridTime, operand: &[u8]) {
        self.batch.put(
            Space::Regular,
            Self::regular_key(key, &time),
            encode_merge_record(operand),
        );
    }

    /// Writes an intent of `txn_id` plus its reverse index entry.
    pub fn put_intent(
        &mut self,
        key: &[u8],
        types: IntentTypeSet,
        txn_id: TxnId,
        time: DocHybridTime,
        body: &[u8],
    ) {
        let intent_key = encode_intent_key(key, types, &time);
        self.batch.put(
            Space::Intents,
            reverse_index_key(txn_id, &time),
            intent_key.clone(),
        );
        self.batch.put(
            Space::Intents,
            intent_key,
            encode_intent_value(txn_id, time.write_id(), body),
        );
    }

    /// Locks the row at `key` for `txn_id` without writing a value.
    pub fn put_row_lock(&mut self, key: &[u8], txn_id: TxnId, time: DocHybridTime) {
        self.put_intent(key, IntentTypeSet::STRONG_WRITE, txn_id, time, &[ROW_LOCK]);
    }

    /// Removes an intent and its reverse index entry, as done once its
    /// transaction is applied or aborted.
    pub fn delete_intent(
        &mut self,
        key: &[u8],
        types: IntentTypeSet,
        txn_id: TxnId,
        time: DocHybridTime,
    ) {
        self.batch
            .delete(Space::Intents, encode_intent_key(key, types, &time));
        self.batch
            .delete(Space::Intents, reverse_index_key(txn_id, &time));
    }

    pub fn put_transaction_metadata(&mut self, txn_id: TxnId, metadata: &[u8]) {
        self.batch.put(
            Space::Intents,
            transaction_metadata_key(txn_id),
            metadata.to_vec(),
        );
    }

    /// Writes raw bytes, bypassing every encoding.
    pub fn put_raw(&mut self, space: Space, key: Vec<u8>, value: Vec<u8>) {
        self.batch.put(space, key, value);
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn into_inner(self) -> WriteBatch {
        self.batch
    }

    fn regular_key(key: &[u8], time: &DocHybridTime) -> Vec<u8> {
        let mut out = key.to_vec();
        append_time_suffix(&mut out, &time.encode());
        out
    }
}

impl AsRef<WriteBatch> for DocWriteBatch {
    fn as_ref(&self) -> &WriteBatch {
        &self.batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::key::split_time_suffix;
    use crate::storage::value::applied_intent_time;
    use crate::storage::{DocKey, SubDocKey, WriteOp};
    use crate::time::HybridTime;
    use crate::txn::intent::decode_intent_value;

    fn dht(ht: u64) -> DocHybridTime {
        DocHybridTime::new(HybridTime::new(ht), 0)
    }

    fn row_key() -> Vec<u8> {
        SubDocKey::new(DocKey::new(vec!["k".into()]), vec![]).encode()
    }

    #[test]
    fn test_put_applied_layout() {
        let mut batch = DocWriteBatch::new();
        batch.put_applied(&row_key(), dht(12), dht(25), b"v");
        let WriteOp::Put { space, key, value } = &batch.as_ref().ops()[0] else {
            panic!("expected a put");
        };
        assert_eq!(*space, Space::Regular);
        let (logical, time) = split_time_suffix(key).unwrap();
        assert_eq!(logical, row_key().as_slice());
        assert_eq!(time.decode(), dht(12));
        assert_eq!(applied_intent_time(value).unwrap(), Some(dht(25).encode()));
    }

    #[test]
    fn test_put_intent_writes_reverse_index() {
        let mut batch = DocWriteBatch::new();
        batch.put_intent(&row_key(), IntentTypeSet::STRONG_WRITE, TxnId(3), dht(25), b"v");
        assert_eq!(batch.len(), 2);
        let ops = batch.as_ref().ops();
        let (WriteOp::Put { key: reverse, value: target, .. }, WriteOp::Put { key, value, .. }) =
            (&ops[0], &ops[1])
        else {
            panic!("expected puts");
        };
        assert_eq!(reverse, &reverse_index_key(TxnId(3), &dht(25)));
        assert_eq!(target, key);
        assert_eq!(decode_intent_value(value).unwrap().txn_id, TxnId(3));
    }

    #[test]
    fn test_delete_intent() {
        let mut batch = DocWriteBatch::new();
        batch.delete_intent(&row_key(), IntentTypeSet::STRONG_WRITE, TxnId(3), dht(25));
        assert!(batch
            .as_ref()
            .ops()
            .iter()
            .all(|op| matches!(op, WriteOp::Delete { space: Space::Intents, .. })));
    }
}
