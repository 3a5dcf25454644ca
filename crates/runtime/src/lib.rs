// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The execution context that runs a graph blob node by node.
//!
//! The runtime takes:
//! - A graph blob, parsed and validated by `graph-ir`.
//! - A `BufferArena` from `memory-manager` for every variable buffer.
//! - Optional user kernels registered per function type.
//!
//! During `initialize` every node is bound to a kernel: registered callbacks
//! are asked first, in registration order, and the built-in registry is the
//! fallback. `forward` then runs the bound kernels in execution order.
//!
//! # Example
//! ```no_run
//! # fn main() -> Result<(), runtime::RuntimeError> {
//! let blob = std::fs::read("model.nnb").map_err(|e| runtime::RuntimeError::Config(e.to_string()))?;
//! let mut ctx = runtime::Context::allocate();
//! ctx.initialize(&blob)?;
//! ctx.input_buffer(0)?.fill(0);
//! ctx.forward()?;
//! let y = ctx.output_buffer(0)?;
//! # let _ = y;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod dispatch;
mod error;
mod functions;
mod kernel;
mod metrics;
mod registry;
mod variable;

pub use config::RuntimeConfig;
pub use context::{Context, ContextState};
pub use dispatch::{FunctionContext, ImplementationMatcher, KernelAllocator, KernelOrigin};
pub use error::RuntimeError;
pub use kernel::{Kernel, KernelInputs, KernelIo, KernelStatus, Resolution};
pub use metrics::{ForwardMetrics, NodeMetrics};
pub use registry::has_builtin;

pub use graph_ir::{FunctionParams, FunctionType, VariableDef, VariableStorage};
pub use tensor_core::{ElementType, Shape};
