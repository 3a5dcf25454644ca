// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Elementwise unary and binary maps.

use super::gelu_op::gelu_scalar;
use crate::TensorError;

/// A unary elementwise operation, including its decoded scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Identity,
    Relu,
    LeakyRelu { alpha: f32 },
    Sigmoid,
    Tanh,
    Gelu,
    BinarySigmoid,
    BinaryTanh,
    AddScalar(f32),
    MulScalar(f32),
}

impl UnaryOp {
    /// Applies the operation to one value.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Identity => x,
            Self::Relu => x.max(0.0),
            Self::LeakyRelu { alpha } => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::Gelu => gelu_scalar(x),
            Self::BinarySigmoid => ((x + 1.0) / 2.0).clamp(0.0, 1.0).round(),
            Self::BinaryTanh => {
                if x > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::AddScalar(v) => x + v,
            Self::MulScalar(v) => x * v,
        }
    }

    /// Short operator name for logs and kernel labels.
    pub fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Relu => "relu",
            Self::LeakyRelu { .. } => "leaky_relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Gelu => "gelu",
            Self::BinarySigmoid => "binary_sigmoid",
            Self::BinaryTanh => "binary_tanh",
            Self::AddScalar(_) => "add_scalar",
            Self::MulScalar(_) => "mul_scalar",
        }
    }
}

/// A binary elementwise operation on two equally sized operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Applies the operation to one pair of values.
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
        }
    }

    /// Short operator name for logs and kernel labels.
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add2",
            Self::Sub => "sub2",
            Self::Mul => "mul2",
            Self::Div => "div2",
        }
    }
}

/// Writes `op(src[i])` into `dst[i]` for every element.
///
/// # Errors
/// Returns [`TensorError::LengthMismatch`] if the slices differ in length.
pub fn map_unary(op: UnaryOp, src: &[f32], dst: &mut [f32]) -> Result<(), TensorError> {
    if src.len() != dst.len() {
        return Err(TensorError::LengthMismatch {
            op: op.name(),
            expected: dst.len(),
            actual: src.len(),
        });
    }
    for (d, &x) in dst.iter_mut().zip(src) {
        *d = op.apply(x);
    }
    Ok(())
}

/// Writes `op(a[i], b[i])` into `dst[i]` for every element.
///
/// # Errors
/// Returns [`TensorError::LengthMismatch`] if any operand differs in length
/// from `dst`.
pub fn map_binary(op: BinaryOp, a: &[f32], b: &[f32], dst: &mut [f32]) -> Result<(), TensorError> {
    for operand in [a, b] {
        if operand.len() != dst.len() {
            return Err(TensorError::LengthMismatch {
                op: op.name(),
                expected: dst.len(),
                actual: operand.len(),
            });
        }
    }
    for ((d, &x), &y) in dst.iter_mut().zip(a).zip(b) {
        *d = op.apply(x, y);
    }
    Ok(())
}
