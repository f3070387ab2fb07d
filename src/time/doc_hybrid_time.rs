// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Document hybrid time and its byte-comparable encoding.
//!
//! Format: `[!hybrid_time:u64 BE][!write_id:u32 BE]`
//!
//! Both components are bit-inverted so that later times sort first under a
//! plain byte-order comparator. A prefix scan over one logical key therefore
//! visits its versions newest-first.

use super::{HybridTime, TimeError};

/// Ordinal distinguishing multiple writes at the same hybrid time.
pub type WriteId = u32;

/// Largest write id. Limits are encoded with it so that every write at the
/// limit's hybrid time compares at or below the limit.
pub const MAX_WRITE_ID: WriteId = u32::MAX;

/// Size in bytes of an [`EncodedDocHybridTime`].
pub const ENCODED_DOC_HT_SIZE: usize = 12;

/// A hybrid time plus the write id of the record within that time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DocHybridTime {
    hybrid_time: HybridTime,
    write_id: WriteId,
}

impl DocHybridTime {
    pub const MIN: Self = Self {
        hybrid_time: HybridTime::MIN,
        write_id: 0,
    };

    pub const MAX: Self = Self {
        hybrid_time: HybridTime::MAX,
        write_id: MAX_WRITE_ID,
    };

    #[inline]
    pub const fn new(hybrid_time: HybridTime, write_id: WriteId) -> Self {
        Self {
            hybrid_time,
            write_id,
        }
    }

    #[inline]
    pub fn hybrid_time(&self) -> HybridTime {
        self.hybrid_time
    }

    #[inline]
    pub fn write_id(&self) -> WriteId {
        self.write_id
    }

    /// Encodes this time into its byte-comparable form.
    #[inline]
    pub fn encode(&self) -> EncodedDocHybridTime {
        let mut bytes = [0u8; ENCODED_DOC_HT_SIZE];
        bytes[..8].copy_from_slice(&(!self.hybrid_time.value()).to_be_bytes());
        bytes[8..].copy_from_slice(&(!self.write_id).to_be_bytes());
        EncodedDocHybridTime(bytes)
    }
}

impl std::fmt::Display for DocHybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.write_id == 0 {
            write!(f, "{}", self.hybrid_time)
        } else {
            write!(f, "{} w: {}", self.hybrid_time, self.write_id)
        }
    }
}

/// The 12-byte encoded form of a [`DocHybridTime`].
///
/// `Ord` on this type follows *time* order, which is the reverse of the byte
/// order of [`EncodedDocHybridTime::as_slice`]. Use the slice when comparing
/// against raw keys, and the type when comparing times.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedDocHybridTime([u8; ENCODED_DOC_HT_SIZE]);

impl EncodedDocHybridTime {
    pub const MIN: Self = Self([0xff; ENCODED_DOC_HT_SIZE]);
    pub const MAX: Self = Self([0x00; ENCODED_DOC_HT_SIZE]);

    /// Reads an encoded time from exactly [`ENCODED_DOC_HT_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TimeError> {
        let array: [u8; ENCODED_DOC_HT_SIZE] =
            bytes.try_into().map_err(|_| TimeError::InvalidEncodedSize {
                expected: ENCODED_DOC_HT_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Reads the encoded time occupying the last bytes of `bytes`.
    pub fn from_end(bytes: &[u8]) -> Result<Self, TimeError> {
        let start = bytes
            .len()
            .checked_sub(ENCODED_DOC_HT_SIZE)
            .ok_or(TimeError::InvalidEncodedSize {
                expected: ENCODED_DOC_HT_SIZE,
                actual: bytes.len(),
            })?;
        Self::from_slice(&bytes[start..])
    }

    /// Reads the encoded time occupying the first bytes of `bytes`.
    pub fn from_start(bytes: &[u8]) -> Result<Self, TimeError> {
        let prefix = bytes
            .get(..ENCODED_DOC_HT_SIZE)
            .ok_or(TimeError::InvalidEncodedSize {
                expected: ENCODED_DOC_HT_SIZE,
                actual: bytes.len(),
            })?;
        Self::from_slice(prefix)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn is_min(&self) -> bool {
        *self == Self::MIN
    }

    /// Decodes back into a [`DocHybridTime`].
    #[inline]
    pub fn decode(&self) -> DocHybridTime {
        let mut ht = [0u8; 8];
        ht.copy_from_slice(&self.0[..8]);
        let mut write_id = [0u8; 4];
        write_id.copy_from_slice(&self.0[8..]);
        DocHybridTime::new(
            HybridTime::new(!u64::from_be_bytes(ht)),
            !u32::from_be_bytes(write_id),
        )
    }

    /// Raises `self` to `other` if `other` is a later time.
    #[inline]
    pub fn make_at_least(&mut self, other: EncodedDocHybridTime) {
        if other > *self {
            *self = other;
        }
    }
}

impl Default for EncodedDocHybridTime {
    fn default() -> Self {
        Self::MIN
    }
}

impl From<DocHybridTime> for EncodedDocHybridTime {
    fn from(time: DocHybridTime) -> Self {
        time.encode()
    }
}

impl PartialOrd for EncodedDocHybridTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EncodedDocHybridTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.0.cmp(&self.0)
    }
}

impl std::fmt::Debug for EncodedDocHybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedDocHybridTime({})", self.decode())
    }
}

impl std::fmt::Display for EncodedDocHybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.decode())
    }
}
