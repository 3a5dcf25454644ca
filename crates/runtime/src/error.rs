// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the execution context.

use crate::{ContextState, KernelStatus};
use graph_ir::FunctionType;

/// Errors that can occur while initialising or driving a context.
///
/// Every `initialize`-time variant leaves the context unable to run
/// `forward`; every `forward`-time variant leaves it initialised.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The arena could not provide a variable buffer.
    #[error("allocation failed: {0}")]
    Alloc(#[from] memory_manager::MemoryError),

    /// The graph blob is malformed or unsupported.
    #[error("malformed graph blob: {0}")]
    Format(#[from] graph_ir::FormatError),

    /// A node has the wrong number of inputs or outputs for its kernel.
    #[error("node {node} ({function_type}): expected {expected} {port}s, found {actual}")]
    Arity {
        node: usize,
        function_type: FunctionType,
        port: &'static str,
        expected: String,
        actual: usize,
    },

    /// A node's operand shapes violate its kernel contract.
    #[error("node {node} ({function_type}): {detail}")]
    Shape {
        node: usize,
        function_type: FunctionType,
        detail: String,
    },

    /// Neither a callback nor a built-in kernel resolves the node.
    #[error("node {node}: no kernel available for function type {function_type}")]
    UnsupportedFunction {
        node: usize,
        function_type: FunctionType,
    },

    /// The API was used out of order.
    #[error("cannot {operation} while the context is {state}")]
    Lifecycle {
        operation: &'static str,
        state: ContextState,
    },

    /// A bound kernel failed during `forward`.
    #[error("node {node} ({function_type}) failed: {status}")]
    KernelExecution {
        node: usize,
        function_type: FunctionType,
        status: KernelStatus,
    },

    /// A kernel reported failure while being torn down.
    #[error("teardown of node {node} ({function_type}) failed: {status}")]
    Teardown {
        node: usize,
        function_type: FunctionType,
        status: KernelStatus,
    },

    /// An input/output accessor index is out of range.
    #[error("{kind} index {index} out of range (count {count})")]
    InvalidIo {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
