// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared unary and binary elementwise kernels.

use tensor_core::{map_binary, map_unary, BinaryOp, UnaryOp};

use super::{matching_count, require_in_place_width, InPlaceWidth, Strategy};
use crate::registry::BuiltinOptions;
use crate::{FunctionContext, Kernel, KernelIo, KernelStatus, RuntimeError};

pub(crate) struct UnaryKernel {
    op: UnaryOp,
    len: usize,
    strategy: Strategy,
    name: String,
}

impl UnaryKernel {
    pub(crate) fn bind(
        function: &FunctionContext<'_>,
        options: &BuiltinOptions,
        op: UnaryOp,
    ) -> Result<Box<dyn Kernel>, RuntimeError> {
        let len = matching_count(function, 0)?;
        require_in_place_width(function, InPlaceWidth::NoWider)?;
        let strategy = Strategy::select(function, options);
        Ok(Box::new(Self {
            op,
            len,
            strategy,
            name: format!("{}_{}", op.name(), strategy.suffix()),
        }))
    }
}

impl Kernel for UnaryKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        let op = self.op;
        match self.strategy {
            Strategy::Fast => io.with_output_f32(0, |inputs, out| {
                map_unary(op, inputs.f32(0)?, out).map_err(KernelStatus::from)
            }),
            Strategy::Generic => {
                // Input `i` is read before output `i` is written.
                for i in 0..self.len {
                    let x = io.get(0, i)?;
                    io.set(0, i, op.apply(x))?;
                }
                Ok(())
            }
        }
    }
}

pub(crate) struct BinaryKernel {
    op: BinaryOp,
    len: usize,
    strategy: Strategy,
    name: String,
}

impl BinaryKernel {
    /// No broadcasting: both inputs must match the output element count.
    pub(crate) fn bind(
        function: &FunctionContext<'_>,
        options: &BuiltinOptions,
        op: BinaryOp,
    ) -> Result<Box<dyn Kernel>, RuntimeError> {
        let len = matching_count(function, 0)?;
        matching_count(function, 1)?;
        require_in_place_width(function, InPlaceWidth::NoWider)?;
        let strategy = Strategy::select(function, options);
        Ok(Box::new(Self {
            op,
            len,
            strategy,
            name: format!("{}_{}", op.name(), strategy.suffix()),
        }))
    }
}

impl Kernel for BinaryKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        let op = self.op;
        match self.strategy {
            Strategy::Fast => io.with_output_f32(0, |inputs, out| {
                map_binary(op, inputs.f32(0)?, inputs.f32(1)?, out).map_err(KernelStatus::from)
            }),
            Strategy::Generic => {
                for i in 0..self.len {
                    let a = io.get(0, i)?;
                    let b = io.get(1, i)?;
                    io.set(0, i, op.apply(a, b))?;
                }
                Ok(())
            }
        }
    }
}
