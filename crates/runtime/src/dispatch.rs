// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel resolution: user callbacks first, then the built-in registry.
//!
//! Callbacks are registered per function type. During `initialize` every
//! candidate for a node's type is asked in registration order; the first
//! one returning [`Resolution::Matched`] binds the node. When all decline
//! (or none exist) the built-in kernel for the type is bound, and a type
//! with no built-in fails with [`RuntimeError::UnsupportedFunction`].

use std::collections::HashMap;
use std::fmt;

use graph_ir::{FunctionDef, FunctionParams, FunctionType, VariableDef};
use tracing::{debug, trace};

use crate::registry::{self, BuiltinOptions};
use crate::{Kernel, Resolution, RuntimeError};

// ── FunctionContext ───────────────────────────────────────────

/// Everything an allocator may inspect about the node being bound.
#[derive(Clone, Copy)]
pub struct FunctionContext<'c> {
    function: &'c FunctionDef<'c>,
    variables: &'c [VariableDef<'c>],
}

impl<'c> FunctionContext<'c> {
    pub(crate) fn new(function: &'c FunctionDef<'c>, variables: &'c [VariableDef<'c>]) -> Self {
        Self {
            function,
            variables,
        }
    }

    /// Position of the node in execution order.
    pub fn index(&self) -> usize {
        self.function.index
    }

    pub fn function_type(&self) -> FunctionType {
        self.function.function_type
    }

    /// Implementation selector recorded by the converter.
    pub fn implementation(&self) -> u16 {
        self.function.implementation
    }

    pub fn params(&self) -> &'c FunctionParams<'c> {
        &self.function.params
    }

    pub fn num_inputs(&self) -> usize {
        self.function.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.function.outputs.len()
    }

    pub fn input(&self, index: usize) -> Option<&'c VariableDef<'c>> {
        let id = *self.function.inputs.get(index)?;
        self.variables.get(id)
    }

    pub fn output(&self, index: usize) -> Option<&'c VariableDef<'c>> {
        let id = *self.function.outputs.get(index)?;
        self.variables.get(id)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &'c VariableDef<'c>> + 'c {
        let variables = self.variables;
        self.function
            .inputs
            .iter()
            .filter_map(move |&id| variables.get(id))
    }

    pub fn outputs(&self) -> impl Iterator<Item = &'c VariableDef<'c>> + 'c {
        let variables = self.variables;
        self.function
            .outputs
            .iter()
            .filter_map(move |&id| variables.get(id))
    }

    /// Whether output `index` lives in the same arena buffer as any input.
    pub fn output_aliases_input(&self, index: usize) -> bool {
        let Some(buffer) = self.output(index).and_then(VariableDef::buffer_index) else {
            return false;
        };
        self.inputs()
            .any(|input| input.buffer_index() == Some(buffer))
    }

    /// Whether any output shares a buffer with any input.
    pub fn has_aliasing(&self) -> bool {
        (0..self.num_outputs()).any(|j| self.output_aliases_input(j))
    }
}

impl fmt::Debug for FunctionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionContext")
            .field("index", &self.index())
            .field("function_type", &self.function_type())
            .field("implementation", &self.implementation())
            .finish()
    }
}

// ── Allocators ────────────────────────────────────────────────

/// A user-supplied kernel source for one function type.
pub trait KernelAllocator: Send {
    fn allocate(&self, function: &FunctionContext<'_>) -> Resolution;
}

impl<F> KernelAllocator for F
where
    F: Fn(&FunctionContext<'_>) -> Resolution + Send,
{
    fn allocate(&self, function: &FunctionContext<'_>) -> Resolution {
        self(function)
    }
}

/// Matches nodes whose implementation selector equals `implementation`
/// and builds their kernel with `factory`.
pub struct ImplementationMatcher<F> {
    implementation: u16,
    factory: F,
}

impl<F> ImplementationMatcher<F>
where
    F: Fn(&FunctionContext<'_>) -> Box<dyn Kernel> + Send,
{
    pub fn new(implementation: u16, factory: F) -> Self {
        Self {
            implementation,
            factory,
        }
    }
}

impl<F> KernelAllocator for ImplementationMatcher<F>
where
    F: Fn(&FunctionContext<'_>) -> Box<dyn Kernel> + Send,
{
    fn allocate(&self, function: &FunctionContext<'_>) -> Resolution {
        if function.implementation() == self.implementation {
            Resolution::Matched((self.factory)(function))
        } else {
            Resolution::NotMatched
        }
    }
}

// ── CallbackTable ─────────────────────────────────────────────

/// Registered allocators per function type, in registration order.
#[derive(Default)]
pub(crate) struct CallbackTable {
    entries: HashMap<FunctionType, Vec<Box<dyn KernelAllocator>>>,
}

impl CallbackTable {
    pub(crate) fn register(&mut self, function_type: FunctionType, allocator: Box<dyn KernelAllocator>) {
        self.entries.entry(function_type).or_default().push(allocator);
    }

    pub(crate) fn candidates(&self, function_type: FunctionType) -> &[Box<dyn KernelAllocator>] {
        self.entries
            .get(&function_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

// ── Resolution ────────────────────────────────────────────────

/// Where a node's kernel came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelOrigin {
    /// The `candidate`-th callback registered for the node's type.
    Callback { candidate: usize },
    Builtin,
}

impl fmt::Display for KernelOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback { candidate } => write!(f, "callback #{candidate}"),
            Self::Builtin => f.write_str("built-in"),
        }
    }
}

pub(crate) struct BoundKernel {
    pub(crate) kernel: Box<dyn Kernel>,
    pub(crate) origin: KernelOrigin,
}

/// Binds one node.
pub(crate) fn resolve(
    function: &FunctionContext<'_>,
    callbacks: &CallbackTable,
    options: &BuiltinOptions,
) -> Result<BoundKernel, RuntimeError> {
    for (candidate, allocator) in callbacks
        .candidates(function.function_type())
        .iter()
        .enumerate()
    {
        match allocator.allocate(function) {
            Resolution::Matched(kernel) => {
                debug!(
                    node = function.index(),
                    kernel = kernel.name(),
                    candidate,
                    "bound callback kernel"
                );
                return Ok(BoundKernel {
                    kernel,
                    origin: KernelOrigin::Callback { candidate },
                });
            }
            Resolution::NotMatched => {
                trace!(node = function.index(), candidate, "callback declined");
            }
        }
    }

    let kernel = registry::allocate_builtin(function, options)?;
    debug!(
        node = function.index(),
        kernel = kernel.name(),
        "bound built-in kernel"
    );
    Ok(BoundKernel {
        kernel,
        origin: KernelOrigin::Builtin,
    })
}
