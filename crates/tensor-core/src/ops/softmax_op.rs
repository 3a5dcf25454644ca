// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax activation operation.

use crate::{AxisLayout, TensorError};

/// Computes softmax along the axis described by `layout`:
/// `output[i] = exp(x[i] - max) / sum(exp(x - max))`.
///
/// Uses the numerically stable variant that subtracts the maximum value
/// before exponentiation to prevent overflow. The reduction runs over the
/// `layout.axis` extent for every `(outer, inner)` position, so a non-last
/// axis is handled without transposing.
///
/// # Errors
/// Returns [`TensorError::LengthMismatch`] if either slice does not hold
/// `layout.num_elements()` values.
pub fn softmax(layout: AxisLayout, src: &[f32], dst: &mut [f32]) -> Result<(), TensorError> {
    let expected = layout.num_elements();
    for len in [src.len(), dst.len()] {
        if len != expected {
            return Err(TensorError::LengthMismatch {
                op: "softmax",
                expected,
                actual: len,
            });
        }
    }
    if layout.axis == 0 {
        return Ok(());
    }

    for o in 0..layout.outer {
        for i in 0..layout.inner {
            // Find max for numerical stability.
            let max_val = (0..layout.axis)
                .map(|a| src[layout.index(o, a, i)])
                .fold(f32::NEG_INFINITY, f32::max);

            let mut sum = 0.0f32;
            for a in 0..layout.axis {
                let idx = layout.index(o, a, i);
                let e = (src[idx] - max_val).exp();
                dst[idx] = e;
                sum += e;
            }

            if sum > 0.0 {
                let inv_sum = 1.0 / sum;
                for a in 0..layout.axis {
                    dst[layout.index(o, a, i)] *= inv_sum;
                }
            }
        }
    }

    Ok(())
}
