// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Binarising activations used by binary-weight networks.

use graph_ir::FunctionType;
use tensor_core::UnaryOp;

use super::elementwise::UnaryKernel;
use super::params_error;
use crate::registry::BuiltinOptions;
use crate::{FunctionContext, Kernel, RuntimeError};

pub(crate) fn allocate(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let op = match function.function_type() {
        FunctionType::BinarySigmoid => UnaryOp::BinarySigmoid,
        FunctionType::BinaryTanh => UnaryOp::BinaryTanh,
        _ => return Err(params_error(function)),
    };
    UnaryKernel::bind(function, options, op)
}
