// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Error types for hybrid time decoding.

/// Errors that can occur while decoding encoded hybrid times.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("invalid encoded hybrid time: expected {expected} bytes, got {actual}")]
    InvalidEncodedSize { expected: usize, actual: usize },
}
