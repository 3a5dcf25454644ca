// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII buffer guard that releases its bytes to the arena on drop.

use crate::arena::ArenaInner;
use std::sync::Arc;

/// An RAII guard over one zero-initialised arena buffer.
///
/// The backing storage is a `Vec<u64>`, so the first byte is always 8-byte
/// aligned and [`as_f32`](Self::as_f32) succeeds whenever the length is a
/// multiple of four.
///
/// # Example
/// ```
/// use memory_manager::{BufferArena, MemoryBudget};
///
/// let arena = BufferArena::new(MemoryBudget::from_kb(1));
/// let mut guard = arena.allocate(16).unwrap();
/// guard.as_f32_mut().unwrap()[3] = 2.5;
/// assert_eq!(guard.as_f32().unwrap()[3], 2.5);
/// drop(guard);
/// assert_eq!(arena.allocated_bytes(), 0);
/// ```
pub struct BufferGuard {
    storage: Vec<u64>,
    len: usize,
    arena: Arc<ArenaInner>,
}

impl BufferGuard {
    pub(crate) fn new(len: usize, arena: Arc<ArenaInner>) -> Self {
        Self {
            storage: vec![0u64; len.div_ceil(8)],
            len,
            arena,
        }
    }

    /// Returns an immutable view of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(self.storage.as_slice())[..self.len]
    }

    /// Returns a mutable view of the buffer.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(self.storage.as_mut_slice())[..self.len]
    }

    /// Views the buffer as `f32`s, `None` if the length is not a multiple
    /// of four.
    pub fn as_f32(&self) -> Option<&[f32]> {
        bytemuck::try_cast_slice(self.as_bytes()).ok()
    }

    /// Mutable counterpart of [`as_f32`](Self::as_f32).
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        bytemuck::try_cast_slice_mut(self.as_bytes_mut()).ok()
    }

    /// Returns the size of this allocation in bytes.
    pub fn size_bytes(&self) -> usize {
        self.len
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        self.arena.release(self.len);
    }
}

impl std::fmt::Debug for BufferGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferGuard")
            .field("size_bytes", &self.len)
            .finish()
    }
}
