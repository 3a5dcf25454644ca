// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for blob parsing and network validation.

/// Errors raised while interpreting a graph blob.
///
/// Every variant is fatal to context initialisation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The header does not start with a supported revision tag.
    #[error("unsupported blob revision {found:#010x} (expected {expected:#010x})")]
    UnsupportedRevision { found: u32, expected: u32 },

    /// A read ran past the end of the blob or of a block.
    #[error("truncated {context}: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        context: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A block, buffer or list index points outside its table.
    #[error("{context} index {index} out of range (count {count})")]
    IndexOutOfRange {
        context: &'static str,
        index: i64,
        count: usize,
    },

    /// The block offset table is not monotonically non-decreasing.
    #[error("block {block} starts at {offset}, before the previous block")]
    DecreasingOffset { block: usize, offset: usize },

    /// A count, dimension or id that must be non-negative is negative.
    #[error("negative {context}: {value}")]
    Negative { context: &'static str, value: i64 },

    /// A variable record's id does not match its position in the table.
    #[error("variable at position {position} declares id {id}")]
    VariableIdMismatch { position: usize, id: i64 },

    /// A variable uses an element type code this runtime cannot store.
    #[error("variable {variable}: unsupported element type code {code} (frac bits {frac_bits})")]
    UnsupportedElementType {
        variable: usize,
        code: u32,
        frac_bits: u32,
    },

    /// A variable's element count does not fit in `usize`.
    #[error("variable {variable}: shape element count overflows")]
    ShapeOverflow { variable: usize },

    /// A constant variable's data block is shorter than its shape requires.
    #[error("variable {variable}: constant data holds {actual} bytes, shape needs {expected}")]
    ConstantTooShort {
        variable: usize,
        expected: usize,
        actual: usize,
    },

    /// A variable does not fit in the arena buffer it is bound to.
    #[error("variable {variable} needs {needed} bytes, buffer {buffer} holds {capacity}")]
    BufferTooSmall {
        variable: usize,
        buffer: usize,
        needed: usize,
        capacity: usize,
    },

    /// A function lists a variable id that does not exist.
    #[error("function {function}: {port} references missing variable {variable}")]
    MissingVariable {
        function: usize,
        port: &'static str,
        variable: usize,
    },

    /// A graph input or output is bound to constant blob data.
    #[error("graph {kind} {index} (variable {variable}) is bound to constant data")]
    ConstantIo {
        kind: &'static str,
        index: usize,
        variable: usize,
    },

    /// A function's parameter area cannot be decoded for its type.
    #[error("function {function} ({function_type}): malformed parameters: {detail}")]
    MalformedParams {
        function: usize,
        function_type: String,
        detail: String,
    },
}
