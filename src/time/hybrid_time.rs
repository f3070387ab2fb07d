// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid time: a physical microsecond clock reading combined with a logical counter.

/// A totally ordered hybrid timestamp.
///
/// The upper 52 bits hold physical microseconds since the Unix epoch, the lower
/// [`HybridTime::LOGICAL_BITS`] bits hold a logical counter that disambiguates
/// events within the same microsecond. Records in both key spaces are versioned
/// with these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HybridTime(u64);

impl HybridTime {
    /// Number of low bits reserved for the logical component.
    pub const LOGICAL_BITS: u32 = 12;

    /// The smallest representable time. Nothing is ever visible at `MIN`.
    pub const MIN: Self = Self(0);

    /// The largest representable time.
    pub const MAX: Self = Self(u64::MAX);

    const LOGICAL_MASK: u64 = (1 << Self::LOGICAL_BITS) - 1;

    /// Creates a hybrid time from its raw representation.
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Creates a hybrid time from a physical reading and a logical counter.
    ///
    /// The logical counter is truncated to [`HybridTime::LOGICAL_BITS`] bits.
    #[inline]
    pub fn from_micros_and_logical(micros: u64, logical: u64) -> Self {
        Self((micros << Self::LOGICAL_BITS) | (logical & Self::LOGICAL_MASK))
    }

    /// Returns the raw representation.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the physical component in microseconds.
    #[inline]
    pub fn physical_micros(&self) -> u64 {
        self.0 >> Self::LOGICAL_BITS
    }

    /// Returns the logical component.
    #[inline]
    pub fn logical(&self) -> u64 {
        self.0 & Self::LOGICAL_MASK
    }

    #[inline]
    pub fn is_min(&self) -> bool {
        self.0 == Self::MIN.0
    }

    #[inline]
    pub fn is_max(&self) -> bool {
        self.0 == Self::MAX.0
    }

    /// Raises `self` to `other` if `other` is later.
    #[inline]
    pub fn make_at_least(&mut self, other: HybridTime) {
        if other > *self {
            *self = other;
        }
    }

    /// Lowers `self` to `other` if `other` is earlier.
    #[inline]
    pub fn make_at_most(&mut self, other: HybridTime) {
        if other < *self {
            *self = other;
        }
    }
}

impl From<u64> for HybridTime {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for HybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::MIN => write!(f, "<min>"),
            Self::MAX => write!(f, "<max>"),
            _ => write!(f, "{{ physical: {} logical: {} }}", self.physical_micros(), self.logical()),
        }
    }
}
