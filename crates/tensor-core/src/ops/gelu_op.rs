// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Gaussian Error Linear Unit (GELU) activation.

use crate::TensorError;

/// Coefficient `sqrt(2/π)`.
const SQRT_2_OVER_PI: f32 = 0.797_884_6;

/// Cubic coefficient in the tanh approximation.
const GELU_COEFF: f32 = 0.044715;

/// Applies GELU element-wise using the tanh approximation:
///
/// `GELU(x) ≈ 0.5 * x * (1 + tanh(sqrt(2/π) * (x + 0.044715 * x³)))`
///
/// # Errors
/// Returns [`TensorError::LengthMismatch`] if the slices differ in length.
pub fn gelu(src: &[f32], dst: &mut [f32]) -> Result<(), TensorError> {
    if src.len() != dst.len() {
        return Err(TensorError::LengthMismatch {
            op: "gelu",
            expected: dst.len(),
            actual: src.len(),
        });
    }
    for (d, &x) in dst.iter_mut().zip(src) {
        *d = gelu_scalar(x);
    }
    Ok(())
}

/// Computes GELU for a single f32 value.
#[inline(always)]
pub(crate) fn gelu_scalar(x: f32) -> f32 {
    let inner = SQRT_2_OVER_PI * (x + GELU_COEFF * x * x * x);
    0.5 * x * (1.0 + inner.tanh())
}
