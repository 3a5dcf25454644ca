// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel bodies over pre-allocated `f32` slices.
//!
//! Every function here writes into a caller-provided output slice and never
//! allocates, so the runtime can call them from `forward` on the fast path.
//! Generic (type-coercing) kernels reuse the scalar pieces ([`UnaryOp`],
//! [`BinaryOp`], [`PoolingGeometry`]) element by element.

mod elementwise;
mod gelu_op;
mod matmul_op;
mod pooling_op;
mod softmax_op;

pub use elementwise::{map_binary, map_unary, BinaryOp, UnaryOp};
pub use gelu_op::gelu;
pub use matmul_op::matmul;
pub use pooling_op::{pool_f32, PoolMode, PoolWindow, PoolingGeometry};
pub use softmax_op::softmax;
