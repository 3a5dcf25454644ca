// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The parsed network: variable table, function list and I/O bindings.
//!
//! # Type-State Pattern
//!
//! ```text
//! Network<Parsed>     — records decoded, cross references unchecked.
//!       │  .validate()
//!       ▼
//! Network<Validated>  — every id resolves, buffers are large enough,
//!                       graph I/O is writable. Ready for a context.
//! ```
//!
//! The runtime only accepts `Network<Validated>`, so a context can index
//! its tables without re-checking bounds.

use crate::{FormatError, FunctionParams, FunctionType};
use std::fmt;
use std::marker::PhantomData;
use tensor_core::{ElementType, Shape};

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: records decoded but not cross-checked.
#[derive(Debug, Clone)]
pub struct Parsed;

/// Marker: all cross references checked.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for network states.
pub trait NetworkState: fmt::Debug + Clone {}
impl NetworkState for Parsed {}
impl NetworkState for Validated {}

// ── Records ────────────────────────────────────────────────────────

/// Where a variable's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableStorage<'a> {
    /// Arena buffer with the given index, allocated by the runtime.
    Buffer(usize),
    /// Constant data borrowed from the blob.
    Constant(&'a [u8]),
}

/// One entry of the variable table.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef<'a> {
    pub id: usize,
    pub shape: Shape,
    pub element: ElementType,
    pub storage: VariableStorage<'a>,
}

impl VariableDef<'_> {
    /// Number of elements described by the shape.
    pub fn num_elements(&self) -> usize {
        self.shape.num_elements()
    }

    /// Byte size of the variable (`elements × element size`).
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.element)
    }

    /// Arena buffer index, `None` for constants.
    pub fn buffer_index(&self) -> Option<usize> {
        match self.storage {
            VariableStorage::Buffer(index) => Some(index),
            VariableStorage::Constant(_) => None,
        }
    }

    /// Returns `true` if the data lives inside the blob.
    pub fn is_constant(&self) -> bool {
        matches!(self.storage, VariableStorage::Constant(_))
    }

    /// One-line description for logs and `inspect`.
    pub fn summary(&self) -> String {
        let storage = match self.storage {
            VariableStorage::Buffer(index) => format!("buffer {index}"),
            VariableStorage::Constant(bytes) => format!("constant ({} B)", bytes.len()),
        };
        format!("v{} {} {} [{storage}]", self.id, self.element, self.shape)
    }
}

/// One node of the function list.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef<'a> {
    /// Position in the function list (execution order).
    pub index: usize,
    pub function_type: FunctionType,
    /// Selects among alternative implementations; only callbacks look at it.
    pub implementation: u16,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub params: FunctionParams<'a>,
}

impl FunctionDef<'_> {
    /// One-line description for logs and `inspect`.
    pub fn summary(&self) -> String {
        format!(
            "#{} {} impl={} in={:?} out={:?}",
            self.index, self.function_type, self.implementation, self.inputs, self.outputs
        )
    }
}

// ── Network ────────────────────────────────────────────────────────

/// A network decoded from a blob that borrows constant data for `'a`.
#[derive(Debug, Clone)]
pub struct Network<'a, S: NetworkState = Parsed> {
    /// Declared capacity of each arena buffer, in 4-byte elements.
    buffers: Vec<usize>,
    variables: Vec<VariableDef<'a>>,
    functions: Vec<FunctionDef<'a>>,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    _state: PhantomData<S>,
}

/// Byte width of one declared buffer capacity unit.
pub const BUFFER_UNIT_BYTES: usize = 4;

impl<'a> Network<'a, Parsed> {
    pub(crate) fn from_parts(
        buffers: Vec<usize>,
        variables: Vec<VariableDef<'a>>,
        functions: Vec<FunctionDef<'a>>,
        inputs: Vec<usize>,
        outputs: Vec<usize>,
    ) -> Self {
        Self {
            buffers,
            variables,
            functions,
            inputs,
            outputs,
            _state: PhantomData,
        }
    }

    /// Checks cross references and transitions to `Validated`.
    ///
    /// # Checks
    /// - Variable ids equal their table position.
    /// - Buffer-backed variables name an existing buffer and fit in it.
    /// - Function inputs and outputs name existing variables; outputs are
    ///   not constant.
    /// - Graph inputs and outputs name existing, non-constant variables.
    pub fn validate(self) -> Result<Network<'a, Validated>, FormatError> {
        for (position, variable) in self.variables.iter().enumerate() {
            if variable.id != position {
                return Err(FormatError::VariableIdMismatch {
                    position,
                    id: variable.id as i64,
                });
            }
            if let VariableStorage::Buffer(buffer) = variable.storage {
                let capacity = self
                    .buffers
                    .get(buffer)
                    .ok_or(FormatError::IndexOutOfRange {
                        context: "buffer",
                        index: buffer as i64,
                        count: self.buffers.len(),
                    })?
                    .saturating_mul(BUFFER_UNIT_BYTES);
                if variable.size_bytes() > capacity {
                    return Err(FormatError::BufferTooSmall {
                        variable: position,
                        buffer,
                        needed: variable.size_bytes(),
                        capacity,
                    });
                }
            }
        }

        for function in &self.functions {
            for (port, ids) in [("input", &function.inputs), ("output", &function.outputs)] {
                if let Some(&missing) = ids.iter().find(|&&id| id >= self.variables.len()) {
                    return Err(FormatError::MissingVariable {
                        function: function.index,
                        port,
                        variable: missing,
                    });
                }
            }
            if let Some(&constant) = function
                .outputs
                .iter()
                .find(|&&id| self.variables[id].is_constant())
            {
                return Err(FormatError::ConstantIo {
                    kind: "function output",
                    index: function.index,
                    variable: constant,
                });
            }
        }

        for (kind, ids) in [("input", &self.inputs), ("output", &self.outputs)] {
            for (index, &id) in ids.iter().enumerate() {
                let variable = self.variables.get(id).ok_or(FormatError::IndexOutOfRange {
                    context: "graph i/o variable",
                    index: id as i64,
                    count: self.variables.len(),
                })?;
                if variable.is_constant() {
                    return Err(FormatError::ConstantIo {
                        kind,
                        index,
                        variable: id,
                    });
                }
            }
        }

        tracing::debug!(
            variables = self.variables.len(),
            functions = self.functions.len(),
            buffers = self.buffers.len(),
            "network validated"
        );

        Ok(Network {
            buffers: self.buffers,
            variables: self.variables,
            functions: self.functions,
            inputs: self.inputs,
            outputs: self.outputs,
            _state: PhantomData,
        })
    }
}

// ── Validated state ────────────────────────────────────────────────

impl<'a> Network<'a, Validated> {
    /// Variable bound to graph input `index`.
    pub fn input_variable(&self, index: usize) -> Option<&VariableDef<'a>> {
        self.inputs.get(index).map(|&id| &self.variables[id])
    }

    /// Variable bound to graph output `index`.
    pub fn output_variable(&self, index: usize) -> Option<&VariableDef<'a>> {
        self.outputs.get(index).map(|&id| &self.variables[id])
    }

    /// Bytes each arena buffer needs: the size of the largest variable
    /// bound to it, or 0 when no variable uses it.
    pub fn buffer_requirements(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.buffers.len()];
        for variable in &self.variables {
            if let Some(buffer) = variable.buffer_index() {
                sizes[buffer] = sizes[buffer].max(variable.size_bytes());
            }
        }
        sizes
    }

    /// Total arena bytes the network needs.
    pub fn arena_bytes(&self) -> usize {
        self.buffer_requirements().iter().sum()
    }

    /// Total bytes of constant data borrowed from the blob.
    pub fn constant_bytes(&self) -> usize {
        self.variables
            .iter()
            .filter_map(|v| match v.storage {
                VariableStorage::Constant(bytes) => Some(bytes.len()),
                VariableStorage::Buffer(_) => None,
            })
            .sum()
    }

    /// Returns a summary string describing the network.
    pub fn summary(&self) -> String {
        format!(
            "Network: {} functions, {} variables, {} inputs, {} outputs, arena {} B, constants {} B",
            self.functions.len(),
            self.variables.len(),
            self.inputs.len(),
            self.outputs.len(),
            self.arena_bytes(),
            self.constant_bytes(),
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<'a, S: NetworkState> Network<'a, S> {
    /// Variable table, indexed by id once validated.
    pub fn variables(&self) -> &[VariableDef<'a>] {
        &self.variables
    }

    /// Variable with the given id.
    pub fn variable(&self, id: usize) -> Option<&VariableDef<'a>> {
        self.variables.get(id)
    }

    /// Functions in execution order.
    pub fn functions(&self) -> &[FunctionDef<'a>] {
        &self.functions
    }

    /// Variable ids of the graph inputs.
    pub fn inputs(&self) -> &[usize] {
        &self.inputs
    }

    /// Variable ids of the graph outputs.
    pub fn outputs(&self) -> &[usize] {
        &self.outputs
    }

    /// Declared buffer capacities, in 4-byte elements.
    pub fn buffer_capacities(&self) -> &[usize] {
        &self.buffers
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }
}

impl<S: NetworkState> fmt::Display for Network<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Network ({} variables, {} functions):",
            self.variables.len(),
            self.functions.len()
        )?;
        for variable in &self.variables {
            writeln!(f, "  {}", variable.summary())?;
        }
        for function in &self.functions {
            writeln!(f, "  {}", function.summary())?;
        }
        writeln!(f, "  inputs: {:?}", self.inputs)?;
        write!(f, "  outputs: {:?}", self.outputs)
    }
}
