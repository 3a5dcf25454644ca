// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Forward-pass profiling metrics.
//!
//! [`ForwardMetrics`] holds one slot per node, sized when the graph is
//! initialised, so recording inside `forward` never allocates.

use std::time::Duration;

/// Timing for a single node across all passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NodeMetrics {
    /// Number of times the node's kernel ran.
    pub calls: u64,
    /// Cumulative execution time.
    pub total_duration: Duration,
    /// Execution time of the most recent call.
    pub last_duration: Duration,
}

/// Aggregate metrics for every `forward` of a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ForwardMetrics {
    /// Completed forward passes.
    pub passes: u64,
    /// Cumulative wall-clock time of completed passes.
    pub total_duration: Duration,
    /// Wall-clock time of the most recent completed pass.
    pub last_duration: Duration,
    /// Per-node metrics in execution order.
    pub nodes: Vec<NodeMetrics>,
}

impl ForwardMetrics {
    /// Creates an empty container with one slot per node.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            nodes: vec![NodeMetrics::default(); num_nodes],
            ..Default::default()
        }
    }

    /// Records one execution of node `index`.
    pub fn record_node(&mut self, index: usize, elapsed: Duration) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.calls += 1;
            node.total_duration += elapsed;
            node.last_duration = elapsed;
        }
    }

    /// Records one completed pass.
    pub fn record_pass(&mut self, elapsed: Duration) {
        self.passes += 1;
        self.total_duration += elapsed;
        self.last_duration = elapsed;
    }

    /// Mean wall-clock time per pass.
    pub fn mean_pass_duration(&self) -> Duration {
        match u32::try_from(self.passes) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(passes) => self.total_duration / passes,
        }
    }

    /// Index of the node with the largest cumulative time.
    pub fn slowest_node(&self) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.calls > 0)
            .max_by_key(|(_, node)| node.total_duration)
            .map(|(index, _)| index)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let slowest = match self.slowest_node() {
            Some(index) => format!(
                ", slowest node #{index} ({:.3}ms)",
                self.nodes[index].total_duration.as_secs_f64() * 1000.0
            ),
            None => String::new(),
        };
        format!(
            "Forward: {} passes, {:.3}ms mean, {:.3}ms last, {} nodes{slowest}",
            self.passes,
            self.mean_pass_duration().as_secs_f64() * 1000.0,
            self.last_duration.as_secs_f64() * 1000.0,
            self.nodes.len(),
        )
    }
}
