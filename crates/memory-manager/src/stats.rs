// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and diagnostics.

/// Cumulative statistics about arena usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Successful allocations.
    pub total_allocations: u64,
    /// Allocation requests refused because of the budget.
    pub oom_count: u64,
    /// High-water mark of live bytes.
    pub peak_allocated_bytes: usize,
    /// Total bytes ever handed out.
    pub cumulative_allocated_bytes: u64,
    /// Buffers released back to the arena.
    pub total_releases: u64,
}

impl AllocationStats {
    pub(crate) fn record_allocation(&mut self, size: usize, live_bytes: usize) {
        self.total_allocations += 1;
        self.cumulative_allocated_bytes += size as u64;
        self.peak_allocated_bytes = self.peak_allocated_bytes.max(live_bytes);
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_release(&mut self) {
        self.total_releases += 1;
    }

    /// Buffers currently live.
    pub fn live_buffers(&self) -> u64 {
        self.total_allocations.saturating_sub(self.total_releases)
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Arena: {} allocations ({} live), {} OOMs, peak {} B, {} B handed out",
            self.total_allocations,
            self.live_buffers(),
            self.oom_count,
            self.peak_allocated_bytes,
            self.cumulative_allocated_bytes,
        )
    }
}
