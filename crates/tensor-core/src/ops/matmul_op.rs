// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication over row-major `f32` slices.

use crate::TensorError;

/// Computes `c = a @ b` where `a` is `[m, k]`, `b` is `[k, n]` and `c` is
/// `[m, n]`, all row-major.
///
/// # Errors
/// Returns [`TensorError::LengthMismatch`] if any slice does not hold exactly
/// the number of elements implied by `m`, `k` and `n`.
pub fn matmul(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    m: usize,
    k: usize,
    n: usize,
) -> Result<(), TensorError> {
    for (slice_len, expected) in [(a.len(), m * k), (b.len(), k * n), (c.len(), m * n)] {
        if slice_len != expected {
            return Err(TensorError::LengthMismatch {
                op: "matmul",
                expected,
                actual: slice_len,
            });
        }
    }

    c.fill(0.0);

    // ikj order keeps the inner loop a saxpy over a contiguous row of `c`.
    for i in 0..m {
        let c_row = &mut c[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            let b_row = &b[p * n..(p + 1) * n];
            for (cj, &bj) in c_row.iter_mut().zip(b_row) {
                *cj += a_ip * bj;
            }
        }
    }

    Ok(())
}
