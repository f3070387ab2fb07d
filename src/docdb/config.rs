// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Configuration for document iterators.

/// Tuning knobs for [`IntentAwareIterator`](super::IntentAwareIterator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorConfig {
    /// Consecutive invisible records stepped over before the skipper seeks
    /// straight past the remaining future versions of a key. 0 disables seeking.
    pub max_next_calls_while_skipping_future_records: usize,
    /// Debug builds assert that every positioned entry is fetched before the
    /// iterator moves again.
    pub check_fetch_before_seek: bool,
}

impl Default for IteratorConfig {
    fn default() -> Self {
        Self {
            max_next_calls_while_skipping_future_records: 3,
            check_fetch_before_seek: false,
        }
    }
}

impl IteratorConfig {
    /// Sets the step count after which skipping switches to seeking.
    pub fn with_skip_threshold(mut self, threshold: usize) -> Self {
        self.max_next_calls_while_skipping_future_records = threshold;
        self
    }

    /// Enables the debug-build fetch-before-seek assertion.
    pub fn with_fetch_check(mut self, enabled: bool) -> Self {
        self.check_fetch_before_seek = enabled;
        self
    }
}
