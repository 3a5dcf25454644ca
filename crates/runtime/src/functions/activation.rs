// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pointwise activations and softmax.

use graph_ir::{FunctionParams, FunctionType};
use tensor_core::{softmax, AxisLayout, UnaryOp};

use super::elementwise::UnaryKernel;
use super::{
    input, output, params_error, require_in_place_width, shape_error, InPlaceWidth, Strategy,
};
use crate::registry::BuiltinOptions;
use crate::{FunctionContext, Kernel, KernelIo, KernelStatus, RuntimeError};

/// `Sigmoid`, `Tanh`, `ReLU`, `LeakyReLU`, `GELU`.
pub(crate) fn allocate(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let op = match (function.function_type(), function.params()) {
        (FunctionType::Sigmoid, _) => UnaryOp::Sigmoid,
        (FunctionType::Tanh, _) => UnaryOp::Tanh,
        (FunctionType::Relu, _) => UnaryOp::Relu,
        (FunctionType::Gelu, _) => UnaryOp::Gelu,
        (FunctionType::LeakyRelu, FunctionParams::LeakyRelu { alpha }) => {
            UnaryOp::LeakyRelu { alpha: *alpha }
        }
        _ => return Err(params_error(function)),
    };
    UnaryKernel::bind(function, options, op)
}

pub(crate) fn allocate_softmax(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let FunctionParams::Softmax { axis } = *function.params() else {
        return Err(params_error(function));
    };
    let x = input(function, 0)?;
    let y = output(function, 0)?;
    if x.shape != y.shape {
        return Err(shape_error(
            function,
            format!("input {} and output {} differ", x.shape, y.shape),
        ));
    }
    let layout = x
        .shape
        .axis_layout(axis)
        .map_err(|err| shape_error(function, err.to_string()))?;
    require_in_place_width(function, InPlaceWidth::Same)?;
    let strategy = Strategy::select(function, options);
    Ok(Box::new(SoftmaxKernel {
        layout,
        strategy,
        name: format!("softmax_{}", strategy.suffix()),
    }))
}

struct SoftmaxKernel {
    layout: AxisLayout,
    strategy: Strategy,
    name: String,
}

impl SoftmaxKernel {
    /// Every value of a reduction line is read before any is written.
    fn execute_generic(&self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        let layout = self.layout;
        for o in 0..layout.outer {
            for i in 0..layout.inner {
                let mut max = f32::NEG_INFINITY;
                for a in 0..layout.axis {
                    max = max.max(io.get(0, layout.index(o, a, i))?);
                }
                let mut sum = 0.0f32;
                for a in 0..layout.axis {
                    sum += (io.get(0, layout.index(o, a, i))? - max).exp();
                }
                let scale = if sum > 0.0 { 1.0 / sum } else { 1.0 };
                for a in 0..layout.axis {
                    let idx = layout.index(o, a, i);
                    let e = (io.get(0, idx)? - max).exp();
                    io.set(0, idx, e * scale)?;
                }
            }
        }
        Ok(())
    }
}

impl Kernel for SoftmaxKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        match self.strategy {
            Strategy::Fast => {
                let layout = self.layout;
                io.with_output_f32(0, |inputs, out| {
                    softmax(layout, inputs.f32(0)?, out).map_err(KernelStatus::from)
                })
            }
            Strategy::Generic => self.execute_generic(io),
        }
    }
}
