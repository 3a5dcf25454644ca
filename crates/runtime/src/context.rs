// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The execution context: lifecycle, I/O accessors and the forward executor.
//!
//! ```text
//! allocate ──register_callback*──► initialize ──► forward* ──► destroy
//!                                      │
//!                                      └─(error)─► Failed ──► destroy
//! ```
//!
//! All buffers and kernels are created in `initialize` and released in
//! `destroy` (or on drop). `forward` allocates nothing on the fast paths.

use std::fmt;
use std::time::Instant;

use graph_ir::{FunctionType, Network, NetworkLoader, Validated, VariableDef};
use memory_manager::{AllocationStats, BufferArena};
use tracing::{debug, info, trace, warn};

use crate::dispatch::{self, BoundKernel, CallbackTable, FunctionContext, KernelAllocator};
use crate::registry::BuiltinOptions;
use crate::variable::VariableTable;
use crate::{ForwardMetrics, KernelIo, KernelOrigin, RuntimeConfig, RuntimeError};

/// Lifecycle state of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created; callbacks may be registered.
    Allocated,
    /// Graph loaded and every node bound; `forward` is allowed.
    Initialized,
    /// `initialize` failed; only `destroy` is meaningful.
    Failed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Allocated => "allocated",
            Self::Initialized => "initialized",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A loaded graph with its storage and bound kernels.
struct Graph<'a> {
    network: Network<'a, Validated>,
    table: VariableTable<'a>,
    /// `None` once torn down.
    kernels: Vec<Option<BoundKernel>>,
}

/// One inference instance: owns its callbacks, arena, buffers and kernels.
///
/// The context borrows the graph blob for `'a`; constant data is never
/// copied out of it.
pub struct Context<'a> {
    config: RuntimeConfig,
    state: ContextState,
    callbacks: CallbackTable,
    arena: BufferArena,
    graph: Option<Graph<'a>>,
    metrics: Option<ForwardMetrics>,
}

impl<'a> Context<'a> {
    /// Creates a context with [`RuntimeConfig::default`].
    pub fn allocate() -> Self {
        let config = RuntimeConfig::default();
        let arena = BufferArena::new(memory_manager::MemoryBudget::default());
        Self::from_parts(config, arena)
    }

    /// Creates a context with an explicit configuration.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Config`] if the memory budget does not parse.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let budget = config.parse_budget()?;
        Ok(Self::from_parts(config, BufferArena::new(budget)))
    }

    fn from_parts(config: RuntimeConfig, arena: BufferArena) -> Self {
        info!(
            budget = %arena.budget(),
            fast_paths = config.fast_paths,
            profiling = config.enable_profiling,
            "context allocated"
        );
        Self {
            config,
            state: ContextState::Allocated,
            callbacks: CallbackTable::default(),
            arena,
            graph: None,
            metrics: None,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn expect_state(
        &self,
        operation: &'static str,
        expected: ContextState,
    ) -> Result<(), RuntimeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RuntimeError::Lifecycle {
                operation,
                state: self.state,
            })
        }
    }

    // ── Setup ─────────────────────────────────────────────────

    /// Adds a candidate allocator for `function_type`.
    ///
    /// Candidates are consulted in registration order during
    /// [`initialize`](Self::initialize), before the built-in kernel.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Lifecycle`] once the context left `Allocated`.
    pub fn register_callback<A>(
        &mut self,
        function_type: FunctionType,
        allocator: A,
    ) -> Result<(), RuntimeError>
    where
        A: KernelAllocator + 'static,
    {
        self.expect_state("register a callback", ContextState::Allocated)?;
        self.callbacks.register(function_type, Box::new(allocator));
        debug!(
            %function_type,
            registered = self.callbacks.len(),
            "callback registered"
        );
        Ok(())
    }

    /// Parses and validates `blob`, allocates every variable buffer and
    /// binds a kernel to every node.
    ///
    /// On error the context moves to [`ContextState::Failed`]; kernels bound
    /// before the failing node are torn down by `destroy` or drop.
    pub fn initialize(&mut self, blob: &'a [u8]) -> Result<(), RuntimeError> {
        self.expect_state("initialize", ContextState::Allocated)?;
        let result = self.load(blob);
        if let Err(err) = &result {
            warn!(error = %err, "initialisation failed");
            self.state = ContextState::Failed;
        }
        result
    }

    fn load(&mut self, blob: &'a [u8]) -> Result<(), RuntimeError> {
        let network = NetworkLoader::load(blob)?;
        let table = VariableTable::allocate(&network, &self.arena)?;

        let options = BuiltinOptions {
            fast_paths: self.config.fast_paths,
        };
        let mut kernels = Vec::with_capacity(network.num_functions());
        let mut failure = None;
        for function in network.functions() {
            let context = FunctionContext::new(function, network.variables());
            match dispatch::resolve(&context, &self.callbacks, &options) {
                Ok(bound) => kernels.push(Some(bound)),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let num_functions = network.num_functions();
        let arena_bytes = network.arena_bytes();
        self.graph = Some(Graph {
            network,
            table,
            kernels,
        });
        if let Some(err) = failure {
            return Err(err);
        }

        if self.config.enable_profiling {
            self.metrics = Some(ForwardMetrics::new(num_functions));
        }
        self.state = ContextState::Initialized;
        info!(
            functions = num_functions,
            arena_bytes, "graph initialised"
        );
        Ok(())
    }

    // ── Execution ─────────────────────────────────────────────

    /// Runs every node once, in order.
    ///
    /// Stops at the first failing kernel; later nodes do not run. The
    /// context stays initialised and may be driven again.
    pub fn forward(&mut self) -> Result<(), RuntimeError> {
        self.expect_state("run forward", ContextState::Initialized)?;
        let Some(graph) = self.graph.as_mut() else {
            return Err(RuntimeError::Lifecycle {
                operation: "run forward",
                state: self.state,
            });
        };
        let Graph {
            network,
            table,
            kernels,
        } = graph;
        let mut metrics = self.metrics.as_mut();
        let pass_start = metrics.is_some().then(Instant::now);

        for (function, slot) in network.functions().iter().zip(kernels.iter_mut()) {
            let Some(bound) = slot.as_mut() else {
                return Err(RuntimeError::Lifecycle {
                    operation: "run forward",
                    state: ContextState::Failed,
                });
            };
            trace!(node = function.index, kernel = bound.kernel.name(), "execute");
            let started = metrics.is_some().then(Instant::now);
            let mut io = KernelIo::new(table, &function.inputs, &function.outputs);
            bound
                .kernel
                .execute(&mut io)
                .map_err(|status| RuntimeError::KernelExecution {
                    node: function.index,
                    function_type: function.function_type,
                    status,
                })?;
            if let (Some(metrics), Some(started)) = (metrics.as_deref_mut(), started) {
                metrics.record_node(function.index, started.elapsed());
            }
        }

        if let (Some(metrics), Some(pass_start)) = (metrics, pass_start) {
            metrics.record_pass(pass_start.elapsed());
        }
        Ok(())
    }

    // ── Graph I/O ─────────────────────────────────────────────

    fn initialised_graph(&self, operation: &'static str) -> Result<&Graph<'a>, RuntimeError> {
        self.expect_state(operation, ContextState::Initialized)?;
        self.graph.as_ref().ok_or(RuntimeError::Lifecycle {
            operation,
            state: self.state,
        })
    }

    /// Number of graph inputs; `0` until initialised.
    pub fn num_inputs(&self) -> usize {
        self.initialised_graph("count inputs")
            .map_or(0, |graph| graph.network.inputs().len())
    }

    /// Number of graph outputs; `0` until initialised.
    pub fn num_outputs(&self) -> usize {
        self.initialised_graph("count outputs")
            .map_or(0, |graph| graph.network.outputs().len())
    }

    /// Shape, element type and storage of input `index`.
    pub fn input_variable(&self, index: usize) -> Result<&VariableDef<'a>, RuntimeError> {
        let graph = self.initialised_graph("inspect an input")?;
        let count = graph.network.inputs().len();
        graph
            .network
            .input_variable(index)
            .ok_or(RuntimeError::InvalidIo {
                kind: "input",
                index,
                count,
            })
    }

    /// Shape, element type and storage of output `index`.
    pub fn output_variable(&self, index: usize) -> Result<&VariableDef<'a>, RuntimeError> {
        let graph = self.initialised_graph("inspect an output")?;
        let count = graph.network.outputs().len();
        graph
            .network
            .output_variable(index)
            .ok_or(RuntimeError::InvalidIo {
                kind: "output",
                index,
                count,
            })
    }

    /// Byte size of input `index`.
    pub fn input_size(&self, index: usize) -> Result<usize, RuntimeError> {
        Ok(self.input_variable(index)?.size_bytes())
    }

    /// Byte size of output `index`.
    pub fn output_size(&self, index: usize) -> Result<usize, RuntimeError> {
        Ok(self.output_variable(index)?.size_bytes())
    }

    /// Writable bytes of input `index`, to be filled before `forward`.
    pub fn input_buffer(&mut self, index: usize) -> Result<&mut [u8], RuntimeError> {
        let id = self.input_variable(index)?.id;
        let count = self.num_inputs();
        self.variable_bytes_mut(id).ok_or(RuntimeError::InvalidIo {
            kind: "input",
            index,
            count,
        })
    }

    /// Bytes of output `index`, valid after a successful `forward`.
    pub fn output_buffer(&self, index: usize) -> Result<&[u8], RuntimeError> {
        let id = self.output_variable(index)?.id;
        let graph = self.initialised_graph("read an output")?;
        graph.table.bytes(id).map_err(|_| RuntimeError::InvalidIo {
            kind: "output",
            index,
            count: graph.network.outputs().len(),
        })
    }

    fn variable_bytes_mut(&mut self, id: usize) -> Option<&mut [u8]> {
        self.graph.as_mut()?.table.bytes_mut(id).ok()
    }

    // ── Introspection ─────────────────────────────────────────

    /// Number of nodes in the loaded graph; `0` before a graph is loaded.
    pub fn num_functions(&self) -> usize {
        self.graph
            .as_ref()
            .map_or(0, |graph| graph.network.num_functions())
    }

    fn bound(&self, node: usize) -> Option<&BoundKernel> {
        self.graph.as_ref()?.kernels.get(node)?.as_ref()
    }

    /// Name of the kernel bound to `node`, `None` while unresolved.
    pub fn kernel_name(&self, node: usize) -> Option<&str> {
        self.bound(node).map(|bound| bound.kernel.name())
    }

    /// Whether `node` is served by a callback or a built-in.
    pub fn kernel_origin(&self, node: usize) -> Option<KernelOrigin> {
        self.bound(node).map(|bound| bound.origin)
    }

    /// Profiling data, present when `enable_profiling` is set and the
    /// graph is initialised.
    pub fn metrics(&self) -> Option<&ForwardMetrics> {
        self.metrics.as_ref()
    }

    pub fn arena_stats(&self) -> AllocationStats {
        self.arena.stats()
    }

    /// The loaded graph, once initialised.
    pub fn network(&self) -> Option<&Network<'a, Validated>> {
        self.initialised_graph("inspect the graph")
            .ok()
            .map(|graph| &graph.network)
    }

    // ── Teardown ──────────────────────────────────────────────

    /// Tears down every bound kernel and releases all buffers.
    ///
    /// Safe in any state. Every kernel is torn down even if an earlier one
    /// fails; the first failure is returned.
    pub fn destroy(mut self) -> Result<(), RuntimeError> {
        let result = match self.teardown_kernels() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        let stats = self.arena.stats();
        self.graph = None;
        info!(
            allocations = stats.total_allocations,
            peak_bytes = stats.peak_allocated_bytes,
            "context destroyed"
        );
        result
    }

    fn teardown_kernels(&mut self) -> Option<RuntimeError> {
        let graph = self.graph.as_mut()?;
        let mut first_error = None;
        for (function, slot) in graph.network.functions().iter().zip(graph.kernels.iter_mut()) {
            let Some(bound) = slot.take() else {
                continue;
            };
            if let Err(status) = bound.kernel.teardown() {
                warn!(node = function.index, %status, "kernel teardown failed");
                first_error.get_or_insert(RuntimeError::Teardown {
                    node: function.index,
                    function_type: function.function_type,
                    status,
                });
            }
        }
        first_error
    }
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        if let Some(err) = self.teardown_kernels() {
            warn!(error = %err, "teardown during drop failed");
        }
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("callbacks", &self.callbacks.len())
            .field("functions", &self.num_functions())
            .finish()
    }
}
