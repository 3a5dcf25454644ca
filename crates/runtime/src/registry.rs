// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Built-in kernel registry: the fallback when no callback binds a node.

use graph_ir::{Arity, FunctionType};

use crate::functions::{activation, affine, arithmetic, array, pooling, quantization};
use crate::{FunctionContext, Kernel, RuntimeError};

/// Setup-time switches handed to every built-in allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BuiltinOptions {
    pub(crate) fast_paths: bool,
}

type BuiltinAllocator =
    fn(&FunctionContext<'_>, &BuiltinOptions) -> Result<Box<dyn Kernel>, RuntimeError>;

fn builtin(function_type: FunctionType) -> Option<BuiltinAllocator> {
    use FunctionType::*;

    let allocator: BuiltinAllocator = match function_type {
        Affine => affine::allocate,
        MaxPooling | AveragePooling | SumPooling => pooling::allocate,
        Sigmoid | Tanh | Relu | LeakyRelu | Gelu => activation::allocate,
        Softmax => activation::allocate_softmax,
        Add2 | Sub2 | Mul2 | Div2 => arithmetic::allocate_binary,
        AddScalar | MulScalar => arithmetic::allocate_scalar,
        BinarySigmoid | BinaryTanh => quantization::allocate,
        Reshape | Identity => array::allocate,
        Unknown(_) => return None,
    };
    Some(allocator)
}

/// Whether a built-in kernel exists for `function_type`.
pub fn has_builtin(function_type: FunctionType) -> bool {
    builtin(function_type).is_some()
}

/// Validates arity, then runs the type's built-in allocator.
pub(crate) fn allocate_builtin(
    function: &FunctionContext<'_>,
    options: &BuiltinOptions,
) -> Result<Box<dyn Kernel>, RuntimeError> {
    let function_type = function.function_type();
    let (Some(arity), Some(allocate)) = (function_type.arity(), builtin(function_type)) else {
        return Err(RuntimeError::UnsupportedFunction {
            node: function.index(),
            function_type,
        });
    };
    check_arity(function, arity)?;
    allocate(function, options)
}

fn check_arity(function: &FunctionContext<'_>, arity: Arity) -> Result<(), RuntimeError> {
    let arity_error = |port, expected: String, actual| RuntimeError::Arity {
        node: function.index(),
        function_type: function.function_type(),
        port,
        expected,
        actual,
    };

    if !arity.accepts_inputs(function.num_inputs()) {
        let expected = if arity.min_inputs == arity.max_inputs {
            arity.min_inputs.to_string()
        } else {
            format!("{} to {}", arity.min_inputs, arity.max_inputs)
        };
        return Err(arity_error("input", expected, function.num_inputs()));
    }
    if function.num_outputs() != arity.outputs {
        return Err(arity_error(
            "output",
            arity.outputs.to_string(),
            function.num_outputs(),
        ));
    }
    Ok(())
}
