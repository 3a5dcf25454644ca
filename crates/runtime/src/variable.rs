// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Storage behind every variable of an initialised context.
//!
//! Buffer-backed variables view a prefix of an arena buffer; variables
//! sharing a buffer index alias the same bytes. Constants borrow the
//! graph blob directly.

use graph_ir::{Network, Validated, VariableStorage};
use memory_manager::{BufferArena, BufferGuard, MemoryError};
use tensor_core::ElementType;
use tracing::debug;

use crate::KernelStatus;

#[derive(Debug, Clone, Copy)]
enum Backing<'a> {
    Buffer { index: usize, len: usize },
    Constant(&'a [u8]),
}

#[derive(Debug, Clone, Copy)]
struct Slot<'a> {
    element: ElementType,
    backing: Backing<'a>,
}

/// Per-variable byte storage, indexed by variable id.
#[derive(Debug)]
pub(crate) struct VariableTable<'a> {
    slots: Vec<Slot<'a>>,
    /// `None` for buffers no variable needs, or while lent to a kernel.
    buffers: Vec<Option<BufferGuard>>,
}

impl<'a> VariableTable<'a> {
    /// Allocates one arena buffer per used buffer index, sized to the
    /// largest variable bound to it.
    pub(crate) fn allocate(
        network: &Network<'a, Validated>,
        arena: &BufferArena,
    ) -> Result<Self, MemoryError> {
        let buffers = network
            .buffer_requirements()
            .into_iter()
            .enumerate()
            .map(|(index, bytes)| {
                if bytes == 0 {
                    return Ok(None);
                }
                debug!(buffer = index, bytes, "allocating variable buffer");
                arena.allocate(bytes).map(Some)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let slots = network
            .variables()
            .iter()
            .map(|var| Slot {
                element: var.element,
                backing: match var.storage {
                    VariableStorage::Buffer(index) => Backing::Buffer {
                        index,
                        len: var.size_bytes(),
                    },
                    VariableStorage::Constant(bytes) => Backing::Constant(bytes),
                },
            })
            .collect();

        Ok(Self { slots, buffers })
    }

    fn slot(&self, id: usize) -> Result<Slot<'a>, KernelStatus> {
        self.slots.get(id).copied().ok_or(KernelStatus::INVALID_PORT)
    }

    /// Byte length of variable `id`.
    pub(crate) fn len(&self, id: usize) -> usize {
        match self.slots.get(id).map(|slot| slot.backing) {
            Some(Backing::Buffer { len, .. }) => len,
            Some(Backing::Constant(bytes)) => bytes.len(),
            None => 0,
        }
    }

    pub(crate) fn bytes(&self, id: usize) -> Result<&[u8], KernelStatus> {
        match self.slot(id)?.backing {
            Backing::Constant(bytes) => Ok(bytes),
            Backing::Buffer { len: 0, .. } => Ok(&[]),
            Backing::Buffer { index, len } => self
                .buffers
                .get(index)
                .and_then(Option::as_ref)
                .map(|guard| &guard.as_bytes()[..len])
                .ok_or(KernelStatus::BUFFER_IN_USE),
        }
    }

    pub(crate) fn bytes_mut(&mut self, id: usize) -> Result<&mut [u8], KernelStatus> {
        match self.slot(id)?.backing {
            Backing::Constant(_) => Err(KernelStatus::READ_ONLY),
            Backing::Buffer { len: 0, .. } => Ok(&mut []),
            Backing::Buffer { index, len } => self
                .buffers
                .get_mut(index)
                .and_then(Option::as_mut)
                .map(|guard| &mut guard.as_bytes_mut()[..len])
                .ok_or(KernelStatus::BUFFER_IN_USE),
        }
    }

    pub(crate) fn read(&self, id: usize, index: usize) -> Result<f32, KernelStatus> {
        let element = self.slot(id)?.element;
        element
            .read(self.bytes(id)?, index)
            .ok_or(KernelStatus::OUT_OF_BOUNDS)
    }

    pub(crate) fn write(&mut self, id: usize, index: usize, value: f32) -> Result<(), KernelStatus> {
        let element = self.slot(id)?.element;
        element
            .write(self.bytes_mut(id)?, index, value)
            .ok_or(KernelStatus::OUT_OF_BOUNDS)
    }

    /// Takes the buffer behind variable `id` out of the table so it can be
    /// written while other variables are read.
    pub(crate) fn take_buffer(&mut self, id: usize) -> Result<(usize, BufferGuard), KernelStatus> {
        match self.slot(id)?.backing {
            Backing::Constant(_) => Err(KernelStatus::READ_ONLY),
            Backing::Buffer { index, .. } => self
                .buffers
                .get_mut(index)
                .and_then(Option::take)
                .map(|guard| (index, guard))
                .ok_or(KernelStatus::BUFFER_IN_USE),
        }
    }

    pub(crate) fn restore_buffer(&mut self, index: usize, guard: BufferGuard) {
        if let Some(slot) = self.buffers.get_mut(index) {
            *slot = Some(guard);
        }
    }
}
