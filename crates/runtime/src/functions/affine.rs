// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully connected layer: `y = x · W + b`.

use graph_ir::FunctionParams;
use tensor_core::matmul;

use super::{input, output, params_error, require_distinct_storage, shape_error, Strategy};
use crate::registry::BuiltinOptions;
use crate::{FunctionContext, Kernel, KernelIo, KernelStatus, RuntimeError};

/// `x` is folded at `base_axis` into `[batch, in]`, the weight is
/// `[in, out]` row-major and the optional bias holds `out` values.
pub(crate) fn allocate(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let FunctionParams::Affine { base_axis } = *function.params() else {
        return Err(params_error(function));
    };
    require_distinct_storage(function)?;

    let x = input(function, 0)?;
    let weight = input(function, 1)?;
    let y = output(function, 0)?;

    let (batch, in_features) = x
        .shape
        .split_at(base_axis)
        .map_err(|err| shape_error(function, err.to_string()))?;
    let total = y.num_elements();
    if batch == 0 || total % batch != 0 {
        return Err(shape_error(
            function,
            format!("output {} does not split into {batch} rows", y.shape),
        ));
    }
    let out_features = total / batch;

    if in_features.checked_mul(out_features) != Some(weight.num_elements()) {
        return Err(shape_error(
            function,
            format!(
                "weight {} holds {} elements, expected {in_features} x {out_features}",
                weight.shape,
                weight.num_elements()
            ),
        ));
    }
    let has_bias = match function.input(2) {
        Some(bias) if bias.num_elements() != out_features => {
            return Err(shape_error(
                function,
                format!("bias {} does not hold {out_features} elements", bias.shape),
            ));
        }
        Some(_) => true,
        None => false,
    };

    let strategy = Strategy::select(function, options);
    Ok(Box::new(AffineKernel {
        batch,
        in_features,
        out_features,
        has_bias,
        strategy,
        name: format!("affine_{}", strategy.suffix()),
    }))
}

struct AffineKernel {
    batch: usize,
    in_features: usize,
    out_features: usize,
    has_bias: bool,
    strategy: Strategy,
    name: String,
}

impl Kernel for AffineKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        let (m, k, n) = (self.batch, self.in_features, self.out_features);
        match self.strategy {
            Strategy::Fast => {
                let has_bias = self.has_bias;
                io.with_output_f32(0, |inputs, y| {
                    matmul(inputs.f32(0)?, inputs.f32(1)?, y, m, k, n)?;
                    if has_bias && n > 0 {
                        let bias = inputs.f32(2)?;
                        for row in y.chunks_exact_mut(n) {
                            for (v, b) in row.iter_mut().zip(bias) {
                                *v += b;
                            }
                        }
                    }
                    Ok(())
                })
            }
            Strategy::Generic => {
                for row in 0..m {
                    for col in 0..n {
                        let mut acc = if self.has_bias { io.get(2, col)? } else { 0.0 };
                        for p in 0..k {
                            acc += io.get(0, row * k + p)? * io.get(1, p * n + col)?;
                        }
                        io.set(0, row * n + col, acc)?;
                    }
                }
                Ok(())
            }
        }
    }
}
