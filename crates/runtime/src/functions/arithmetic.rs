// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scalar and two-operand arithmetic.

use graph_ir::{FunctionParams, FunctionType};
use tensor_core::{BinaryOp, UnaryOp};

use super::elementwise::{BinaryKernel, UnaryKernel};
use super::params_error;
use crate::registry::BuiltinOptions;
use crate::{FunctionContext, Kernel, RuntimeError};

/// `Add2`, `Sub2`, `Mul2`, `Div2`.
pub(crate) fn allocate_binary(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let op = match function.function_type() {
        FunctionType::Add2 => BinaryOp::Add,
        FunctionType::Sub2 => BinaryOp::Sub,
        FunctionType::Mul2 => BinaryOp::Mul,
        FunctionType::Div2 => BinaryOp::Div,
        _ => return Err(params_error(function)),
    };
    BinaryKernel::bind(function, options, op)
}

/// `AddScalar`, `MulScalar`.
pub(crate) fn allocate_scalar(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let FunctionParams::Scalar { value } = *function.params() else {
        return Err(params_error(function));
    };
    let op = match function.function_type() {
        FunctionType::AddScalar => UnaryOp::AddScalar(value),
        FunctionType::MulScalar => UnaryOp::MulScalar(value),
        _ => return Err(params_error(function)),
    };
    UnaryKernel::bind(function, options, op)
}
