// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fixed arena with budget enforcement.
//!
//! A [`BufferArena`] backs the variable buffers of one execution context:
//!
//! 1. Enforces a hard memory ceiling. Allocations that would exceed the
//!    budget return `Err(OutOfMemory)` and leave the arena unchanged.
//! 2. Hands out zeroed, 8-byte aligned buffers.
//! 3. Tracks allocation statistics for profiling.
//!
//! All allocation happens while a context initialises; the forward pass only
//! reads and writes existing buffers.
//!
//! # Thread Safety
//! `BufferArena` is `Send + Sync`; guards hold an `Arc` to the shared
//! counters so they can be moved to another thread together with their
//! context.

use crate::{AllocationStats, BufferGuard, MemoryBudget, MemoryError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Counters shared between the arena and its guards.
pub(crate) struct ArenaInner {
    budget: MemoryBudget,
    allocated_bytes: AtomicUsize,
    stats: Mutex<AllocationStats>,
}

impl ArenaInner {
    /// Called by `BufferGuard::drop`.
    pub(crate) fn release(&self, size_bytes: usize) {
        self.allocated_bytes.fetch_sub(size_bytes, Ordering::AcqRel);
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_release();
        }
    }
}

/// The allocator for variable buffers.
///
/// # Example
/// ```
/// use memory_manager::{BufferArena, MemoryBudget, MemoryError};
///
/// let arena = BufferArena::new(MemoryBudget::from_bytes(1024));
/// let _a = arena.allocate(1000).unwrap();
/// assert!(matches!(arena.allocate(100), Err(MemoryError::OutOfMemory { .. })));
/// ```
#[derive(Clone)]
pub struct BufferArena {
    inner: Arc<ArenaInner>,
}

impl BufferArena {
    /// Creates an empty arena with the given budget.
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            inner: Arc::new(ArenaInner {
                budget,
                allocated_bytes: AtomicUsize::new(0),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// Allocates a zeroed buffer of `size_bytes`.
    ///
    /// # Errors
    /// - [`MemoryError::ZeroSizedAllocation`] for `size_bytes == 0`.
    /// - [`MemoryError::OutOfMemory`] if the budget would be exceeded.
    pub fn allocate(&self, size_bytes: usize) -> Result<BufferGuard, MemoryError> {
        if size_bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }

        let budget = self.inner.budget;
        let reserved = self
            .inner
            .allocated_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                budget
                    .admits(current, size_bytes)
                    .then_some(current + size_bytes)
            });

        let previous = match reserved {
            Ok(previous) => previous,
            Err(current) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_oom();
                }
                tracing::warn!(
                    requested = size_bytes,
                    allocated = current,
                    budget = budget.as_bytes(),
                    "arena budget exhausted"
                );
                return Err(MemoryError::OutOfMemory {
                    requested_bytes: size_bytes,
                    available_bytes: budget.as_bytes().saturating_sub(current),
                    budget_bytes: budget.as_bytes(),
                });
            }
        };

        if let Ok(mut stats) = self.inner.stats.lock() {
            stats.record_allocation(size_bytes, previous + size_bytes);
        }
        Ok(BufferGuard::new(size_bytes, Arc::clone(&self.inner)))
    }

    /// Returns the number of bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.inner.allocated_bytes.load(Ordering::Acquire)
    }

    /// Returns the number of bytes remaining before hitting the budget.
    pub fn available_bytes(&self) -> usize {
        self.budget().as_bytes().saturating_sub(self.allocated_bytes())
    }

    pub fn budget(&self) -> MemoryBudget {
        self.inner.budget
    }

    /// Returns a snapshot of allocation statistics.
    pub fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for BufferArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferArena")
            .field("budget", &self.inner.budget)
            .field("allocated_bytes", &self.allocated_bytes())
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
