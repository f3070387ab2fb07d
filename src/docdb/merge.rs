// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Folding merge records into full values.

/// Combines a base value with the merge operands written on top of it.
pub trait MergeOperator {
    /// Folds `operands`, ordered oldest first, onto `base`. `base` is `None`
    /// when the chain ran out before reaching a full value.
    fn full_merge(&self, key: &[u8], base: Option<&[u8]>, operands: &[&[u8]]) -> Vec<u8>;
}

/// Concatenates the base and every operand in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOperator;

impl MergeOperator for AppendOperator {
    fn full_merge(&self, _key: &[u8], base: Option<&[u8]>, operands: &[&[u8]]) -> Vec<u8> {
        let len = base.map_or(0, <[u8]>::len) + operands.iter().map(|op| op.len()).sum::<usize>();
        let mut out = Vec::with_capacity(len);
        if let Some(base) = base {
            out.extend_from_slice(base);
        }
        for operand in operands {
            out.extend_from_slice(operand);
        }
        out
    }
}
