// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `Reshape` and `Identity`: same elements, new view.

use graph_ir::FunctionParams;

use super::{input, matching_count, output, params_error, shape_error, Strategy};
use crate::registry::BuiltinOptions;
use crate::{FunctionContext, Kernel, KernelIo, KernelStatus, RuntimeError};

pub(crate) fn allocate(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let len = matching_count(function, 0)?;
    let x = input(function, 0)?;
    let y = output(function, 0)?;

    match function.params() {
        FunctionParams::Reshape { shape } => {
            let target = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
            if target != Some(len) {
                return Err(shape_error(
                    function,
                    format!("target shape {shape:?} does not hold {len} elements"),
                ));
            }
        }
        FunctionParams::None => {}
        _ => return Err(params_error(function)),
    }

    if function.output_aliases_input(0) {
        if x.element != y.element {
            return Err(shape_error(
                function,
                format!(
                    "in-place view cannot change element type {} to {}",
                    x.element, y.element
                ),
            ));
        }
        return Ok(Box::new(ViewKernel));
    }

    let strategy = Strategy::select(function, options);
    Ok(Box::new(CopyKernel {
        len,
        strategy,
        name: format!("copy_{}", strategy.suffix()),
    }))
}

/// Output shares the input's bytes; nothing to do.
struct ViewKernel;

impl Kernel for ViewKernel {
    fn name(&self) -> &str {
        "view"
    }

    fn execute(&mut self, _io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        Ok(())
    }
}

struct CopyKernel {
    len: usize,
    strategy: Strategy,
    name: String,
}

impl Kernel for CopyKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        match self.strategy {
            Strategy::Fast => io.with_output_f32(0, |inputs, out| {
                out.copy_from_slice(inputs.f32(0)?);
                Ok(())
            }),
            Strategy::Generic => {
                for i in 0..self.len {
                    let v = io.get(0, i)?;
                    io.set(0, i, v)?;
                }
                Ok(())
            }
        }
    }
}
