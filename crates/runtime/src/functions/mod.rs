// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Built-in kernels, one allocator per function type.
//!
//! Each allocator validates operand shapes against the node's contract and
//! picks an execution [`Strategy`] once; `execute` never re-checks either.

pub(crate) mod activation;
pub(crate) mod affine;
pub(crate) mod arithmetic;
pub(crate) mod array;
mod elementwise;
pub(crate) mod pooling;
pub(crate) mod quantization;

use graph_ir::{VariableDef, VariableStorage};
use tensor_core::ElementType;

use crate::registry::BuiltinOptions;
use crate::{FunctionContext, RuntimeError};

/// How a bound built-in reaches its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    /// Whole `f32` slices, output lent out of the variable table.
    Fast,
    /// Per-element reads and writes through the element-type coercions.
    Generic,
}

impl Strategy {
    /// Fast only when enabled, every operand is an aligned `Float32`
    /// slice, and no output shares a buffer with an input.
    pub(crate) fn select(function: &FunctionContext<'_>, options: &BuiltinOptions) -> Self {
        let mut operands = function.inputs().chain(function.outputs());
        if options.fast_paths && operands.all(is_aligned_f32) && !function.has_aliasing() {
            Self::Fast
        } else {
            Self::Generic
        }
    }

    pub(crate) fn suffix(self) -> &'static str {
        match self {
            Self::Fast => "f32",
            Self::Generic => "generic",
        }
    }
}

fn is_aligned_f32(variable: &VariableDef<'_>) -> bool {
    if variable.element != ElementType::Float32 {
        return false;
    }
    match variable.storage {
        VariableStorage::Buffer(_) => true,
        VariableStorage::Constant(bytes) => {
            bytes.is_empty() || bytemuck::try_cast_slice::<u8, f32>(bytes).is_ok()
        }
    }
}

// ── Setup helpers ─────────────────────────────────────────────

pub(crate) fn shape_error(function: &FunctionContext<'_>, detail: impl Into<String>) -> RuntimeError {
    RuntimeError::Shape {
        node: function.index(),
        function_type: function.function_type(),
        detail: detail.into(),
    }
}

pub(crate) fn params_error(function: &FunctionContext<'_>) -> RuntimeError {
    shape_error(function, "parameter block does not match the function type")
}

pub(crate) fn input<'c>(
    function: &FunctionContext<'c>,
    index: usize,
) -> Result<&'c VariableDef<'c>, RuntimeError> {
    function
        .input(index)
        .ok_or_else(|| shape_error(function, format!("missing input {index}")))
}

pub(crate) fn output<'c>(
    function: &FunctionContext<'c>,
    index: usize,
) -> Result<&'c VariableDef<'c>, RuntimeError> {
    function
        .output(index)
        .ok_or_else(|| shape_error(function, format!("missing output {index}")))
}

/// Checks that input `index` has as many elements as output 0 and returns
/// that count.
pub(crate) fn matching_count(
    function: &FunctionContext<'_>,
    index: usize,
) -> Result<usize, RuntimeError> {
    let x = input(function, index)?;
    let y = output(function, 0)?;
    if x.num_elements() != y.num_elements() {
        return Err(shape_error(
            function,
            format!(
                "input {index} {} has {} elements but output {} has {}",
                x.shape,
                x.num_elements(),
                y.shape,
                y.num_elements()
            ),
        ));
    }
    Ok(y.num_elements())
}

/// Rejects nodes whose output shares storage with an input.
pub(crate) fn require_distinct_storage(function: &FunctionContext<'_>) -> Result<(), RuntimeError> {
    if function.has_aliasing() {
        return Err(shape_error(function, "output shares storage with an input"));
    }
    Ok(())
}

/// Element widths an in-place output may have relative to the input it
/// overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InPlaceWidth {
    /// Output element `i` is written only after input element `i` is read,
    /// so the output may be narrower but never wider.
    NoWider,
    /// Elements are revisited out of order; widths must match.
    Same,
}

/// Rejects in-place nodes whose output element would overwrite input bytes
/// that are still to be read.
pub(crate) fn require_in_place_width(
    function: &FunctionContext<'_>,
    rule: InPlaceWidth,
) -> Result<(), RuntimeError> {
    for y in function.outputs() {
        let Some(buffer) = y.buffer_index() else {
            continue;
        };
        for x in function.inputs().filter(|x| x.buffer_index() == Some(buffer)) {
            let (read, written) = (x.element.size_bytes(), y.element.size_bytes());
            let ok = match rule {
                InPlaceWidth::NoWider => written <= read,
                InPlaceWidth::Same => written == read,
            };
            if !ok {
                return Err(shape_error(
                    function,
                    format!(
                        "in-place output {} cannot overwrite input {} in buffer {buffer}",
                        y.element, x.element
                    ),
                ));
            }
        }
    }
    Ok(())
}
