// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Shape and element-type utilities plus the numeric kernel bodies used by
//! the embedded graph runtime.
//!
//! This crate provides:
//! - [`Shape`] — immutable dimension descriptors (element counts, strides,
//!   axis decomposition).
//! - [`ElementType`] — the element encodings a variable buffer can hold:
//!   `f32` and signed fixed-point integers with a fractional-bit count.
//! - Coercions between stored elements and `f32` ([`ElementType::read`] /
//!   [`ElementType::write`]) used by the generic kernel paths.
//! - Kernel bodies over `f32` slices: unary/binary elementwise maps, matrix
//!   multiplication, softmax, GELU, and 2-D pooling window arithmetic.
//!
//! # Design Goals
//! - No heap allocation in the kernel bodies (they work on pre-allocated
//!   slices handed in by the runtime).
//! - Pure functions: no state is kept between calls.
//! - Clean error types via `thiserror`.

mod element;
mod error;
mod ops;
mod shape;

pub use element::ElementType;
pub use error::TensorError;
pub use ops::{
    gelu, map_binary, map_unary, matmul, pool_f32, softmax, BinaryOp, PoolMode, PoolWindow,
    PoolingGeometry, UnaryOp,
};
pub use shape::{AxisLayout, Shape};
