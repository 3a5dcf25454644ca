// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for shape arithmetic and kernel bodies.

use crate::Shape;

/// Errors raised by shape arithmetic and slice kernels.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TensorError {
    /// A slice handed to a kernel has the wrong number of elements.
    #[error("length mismatch in {op}: expected {expected} elements, got {actual}")]
    LengthMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Two shapes are incompatible for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// An axis is outside the rank of the shape it applies to.
    #[error("axis {axis} out of range for rank {rank} in {op}")]
    InvalidAxis {
        op: &'static str,
        axis: usize,
        rank: usize,
    },

    /// An operator parameter is outside its valid domain.
    #[error("invalid parameter for {op}: {detail}")]
    InvalidParameter { op: &'static str, detail: String },
}
