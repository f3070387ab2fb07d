// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction identity and outcome.

use crate::time::HybridTime;

/// Unique transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl TxnId {
    pub const ENCODED_SIZE: usize = 8;

    #[inline]
    pub fn to_be_bytes(self) -> [u8; Self::ENCODED_SIZE] {
        self.0.to_be_bytes()
    }

    #[inline]
    pub fn from_be_bytes(bytes: [u8; Self::ENCODED_SIZE]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The queryable outcome of a transaction as seen by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Committed at the given time.
    Committed(HybridTime),
    /// Still running, or committing with an undecided commit time.
    Pending,
    Aborted,
}

impl TransactionStatus {
    /// Returns the commit time if the transaction committed.
    #[inline]
    pub fn commit_time(&self) -> Option<HybridTime> {
        match self {
            Self::Committed(ht) => Some(*ht),
            Self::Pending | Self::Aborted => None,
        }
    }

    /// Returns true once the outcome can no longer change.
    #[inline]
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}
