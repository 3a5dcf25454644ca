// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! A budget-enforced arena for the variable buffers of an execution context.
//!
//! # Key Components
//!
//! - [`MemoryBudget`] — a hard memory ceiling with human-readable parsing
//!   (`"512K"`, `"4M"`, etc.).
//! - [`BufferArena`] — the allocator: enforces the budget and tracks
//!   statistics. Buffers are allocated once, when a context is initialised,
//!   and live until the context is destroyed; there is no free list.
//! - [`BufferGuard`] — an RAII wrapper around one buffer. Storage is
//!   8-byte aligned so `f32` views never fail on alignment.
//! - [`AllocationStats`] — cumulative allocator metrics (peak usage,
//!   OOM count).
//!
//! # Ownership Model
//!
//! ```text
//! BufferArena::allocate(size)
//!       │
//!       ▼
//!   BufferGuard  ◄─── owns Vec<u64>, holds Arc<ArenaInner>
//!       │
//!       │  drop()
//!       ▼
//!   ArenaInner::release()  ──► allocated bytes decremented
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{BufferArena, MemoryBudget};
//!
//! let arena = BufferArena::new(MemoryBudget::from_kb(64));
//!
//! let a = arena.allocate(4096).unwrap();
//! let b = arena.allocate(1024).unwrap();
//! assert_eq!(arena.allocated_bytes(), 5120);
//!
//! drop(a);
//! assert_eq!(arena.allocated_bytes(), 1024);
//! ```

mod arena;
mod budget;
mod error;
mod guard;
mod stats;

pub use arena::BufferArena;
pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use guard::BufferGuard;
pub use stats::AllocationStats;
