// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! The in-memory view of a precompiled network graph blob.
//!
//! A blob is a relocatable container: every cross reference is a block or
//! list index instead of an address. This crate resolves those indices once,
//! at load time, into plain tables:
//!
//! - [`VariableDef`] — shape, element type and storage of each variable.
//!   Constant data (weights) is borrowed from the blob without copying.
//! - [`FunctionDef`] — one node: [`FunctionType`] tag, implementation id,
//!   input/output variable ids and decoded [`FunctionParams`].
//! - [`Network`] — both tables plus the arena buffer declarations and the
//!   graph input/output lists, with a **type-state pattern**
//!   (`Parsed` → `Validated`).
//! - [`NetworkLoader`] — parses a byte slice into a network.
//! - [`NetworkBuilder`] — encodes a network into a blob, for tests and tools.
//!
//! No kernel is resolved here; the runtime does that when a context is
//! initialised, after callbacks have been registered.
//!
//! # Example
//! ```no_run
//! use graph_ir::NetworkLoader;
//!
//! let blob = std::fs::read("model.nnb").unwrap();
//! let network = NetworkLoader::load(&blob).unwrap();
//! println!("{}", network.summary());
//! for function in network.functions() {
//!     println!("  {}", function.summary());
//! }
//! ```

mod builder;
mod error;
mod function_type;
mod loader;
pub mod network;
mod params;

pub use builder::NetworkBuilder;
pub use error::FormatError;
pub use function_type::{Arity, FunctionType};
pub use loader::{NetworkLoader, BLOB_REVISION};
pub use network::{FunctionDef, Network, Parsed, Validated, VariableDef, VariableStorage};
pub use params::{FunctionParams, PoolingParams};
