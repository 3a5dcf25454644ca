// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Max, sum and average pooling over the last two axes.

use graph_ir::{FunctionParams, FunctionType};
use tensor_core::{pool_f32, PoolMode, PoolingGeometry};

use super::{input, output, params_error, require_distinct_storage, shape_error, Strategy};
use crate::registry::BuiltinOptions;
use crate::{FunctionContext, Kernel, KernelIo, KernelStatus, RuntimeError};

pub(crate) fn allocate(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let FunctionParams::Pooling(params) = function.params() else {
        return Err(params_error(function));
    };
    let mode = match function.function_type() {
        FunctionType::MaxPooling => PoolMode::Max,
        FunctionType::SumPooling => PoolMode::Sum,
        FunctionType::AveragePooling => PoolMode::Average {
            including_pad: params.including_pad,
        },
        _ => return Err(params_error(function)),
    };
    require_distinct_storage(function)?;

    let x = input(function, 0)?;
    let y = output(function, 0)?;
    let (geometry, expected) = PoolingGeometry::new(
        &x.shape,
        &params.kernel,
        &params.stride,
        &params.pad,
        params.ignore_border,
    )
    .map_err(|err| shape_error(function, err.to_string()))?;
    if expected != y.shape {
        return Err(shape_error(
            function,
            format!("output {} does not match pooled shape {expected}", y.shape),
        ));
    }

    let strategy = Strategy::select(function, options);
    let prefix = match mode {
        PoolMode::Max => "max_pool",
        PoolMode::Sum => "sum_pool",
        PoolMode::Average { .. } => "avg_pool",
    };
    Ok(Box::new(PoolingKernel {
        mode,
        geometry,
        strategy,
        name: format!("{prefix}_{}", strategy.suffix()),
    }))
}

struct PoolingKernel {
    mode: PoolMode,
    geometry: PoolingGeometry,
    strategy: Strategy,
    name: String,
}

impl Kernel for PoolingKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        let mode = self.mode;
        let geometry = &self.geometry;
        match self.strategy {
            Strategy::Fast => io.with_output_f32(0, |inputs, out| {
                pool_f32(mode, geometry, inputs.f32(0)?, out).map_err(KernelStatus::from)
            }),
            Strategy::Generic => {
                for window in geometry.windows() {
                    let mut failure = None;
                    let value = mode.reduce(&window, |idx| {
                        io.get(0, idx).unwrap_or_else(|status| {
                            failure.get_or_insert(status);
                            0.0
                        })
                    });
                    if let Some(status) = failure {
                        return Err(status);
                    }
                    io.set(0, window.output_index, value)?;
                }
                Ok(())
            }
        }
    }
}
