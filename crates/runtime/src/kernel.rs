// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The kernel contract: what a bound node implementation looks like and
//! how it reaches its operands during `forward`.
//!
//! Two access styles are offered. The generic one ([`KernelIo::get`] /
//! [`KernelIo::set`]) works for every element type and for in-place
//! nodes. The slice one ([`KernelIo::with_output`] /
//! [`KernelIo::with_output_f32`]) temporarily lends the output buffer to
//! the kernel while the inputs stay readable; it needs the output to live
//! in a buffer not shared with any input.

use std::fmt;

use tensor_core::TensorError;

use crate::variable::VariableTable;

// ── KernelStatus ──────────────────────────────────────────────

/// Failure code reported by a kernel's `execute` or `teardown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStatus {
    pub code: i32,
    pub reason: &'static str,
}

impl KernelStatus {
    pub const INVALID_PORT: Self = Self::new(1, "no such input or output port");
    pub const OUT_OF_BOUNDS: Self = Self::new(2, "element index out of bounds");
    pub const BUFFER_IN_USE: Self = Self::new(3, "buffer is lent to another view");
    pub const READ_ONLY: Self = Self::new(4, "operand is constant data");
    pub const MISALIGNED: Self = Self::new(5, "operand is not an aligned f32 slice");
    pub const LENGTH_MISMATCH: Self = Self::new(6, "operand length mismatch");
    pub const INVALID_PARAMETER: Self = Self::new(7, "invalid kernel parameter");

    pub const fn new(code: i32, reason: &'static str) -> Self {
        Self { code, reason }
    }
}

impl fmt::Display for KernelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.reason, self.code)
    }
}

impl From<TensorError> for KernelStatus {
    fn from(err: TensorError) -> Self {
        match err {
            TensorError::LengthMismatch { .. } | TensorError::ShapeMismatch { .. } => {
                Self::LENGTH_MISMATCH
            }
            TensorError::InvalidAxis { .. } | TensorError::InvalidParameter { .. } => {
                Self::INVALID_PARAMETER
            }
        }
    }
}

// ── Kernel ────────────────────────────────────────────────────

/// A node implementation bound during `initialize`.
///
/// `execute` runs once per `forward`; `teardown` runs exactly once when
/// the owning context is destroyed or dropped.
pub trait Kernel: Send {
    /// Short human-readable name, e.g. `"affine_f32"`.
    fn name(&self) -> &str;

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus>;

    fn teardown(self: Box<Self>) -> Result<(), KernelStatus> {
        Ok(())
    }
}

/// Outcome of asking an allocator to bind a node.
pub enum Resolution {
    /// The allocator accepted the node and produced its kernel.
    Matched(Box<dyn Kernel>),
    /// The allocator declined; the next candidate is tried.
    NotMatched,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched(kernel) => f.debug_tuple("Matched").field(&kernel.name()).finish(),
            Self::NotMatched => f.write_str("NotMatched"),
        }
    }
}

// ── KernelIo ──────────────────────────────────────────────────

/// Operand access for one node during one `execute` call.
pub struct KernelIo<'t, 'a> {
    table: &'t mut VariableTable<'a>,
    inputs: &'t [usize],
    outputs: &'t [usize],
}

impl<'t, 'a> KernelIo<'t, 'a> {
    pub(crate) fn new(
        table: &'t mut VariableTable<'a>,
        inputs: &'t [usize],
        outputs: &'t [usize],
    ) -> Self {
        Self {
            table,
            inputs,
            outputs,
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Reads element `index` of input `input`, converted to `f32`.
    pub fn get(&self, input: usize, index: usize) -> Result<f32, KernelStatus> {
        self.table.read(port(self.inputs, input)?, index)
    }

    /// Writes element `index` of output `output`, converting from `f32`.
    pub fn set(&mut self, output: usize, index: usize, value: f32) -> Result<(), KernelStatus> {
        let id = port(self.outputs, output)?;
        self.table.write(id, index, value)
    }

    /// Raw bytes of input `input`.
    pub fn input_bytes(&self, input: usize) -> Result<&[u8], KernelStatus> {
        self.table.bytes(port(self.inputs, input)?)
    }

    /// Raw bytes of output `output`.
    pub fn output_bytes_mut(&mut self, output: usize) -> Result<&mut [u8], KernelStatus> {
        let id = port(self.outputs, output)?;
        self.table.bytes_mut(id)
    }

    /// Lends the bytes of output `output` to `f` while the inputs remain
    /// readable through [`KernelInputs`].
    ///
    /// An input sharing the output's buffer reads as
    /// [`KernelStatus::BUFFER_IN_USE`] for the duration of the call.
    pub fn with_output<R>(
        &mut self,
        output: usize,
        f: impl FnOnce(&KernelInputs<'_, 'a>, &mut [u8]) -> Result<R, KernelStatus>,
    ) -> Result<R, KernelStatus> {
        let id = port(self.outputs, output)?;
        let len = self.table.len(id);
        if len == 0 {
            let inputs = KernelInputs {
                table: &*self.table,
                ids: self.inputs,
            };
            return f(&inputs, &mut []);
        }

        let (buffer, mut guard) = self.table.take_buffer(id)?;
        let result = {
            let inputs = KernelInputs {
                table: &*self.table,
                ids: self.inputs,
            };
            f(&inputs, &mut guard.as_bytes_mut()[..len])
        };
        self.table.restore_buffer(buffer, guard);
        result
    }

    /// [`with_output`](Self::with_output) with the output viewed as `f32`.
    pub fn with_output_f32<R>(
        &mut self,
        output: usize,
        f: impl FnOnce(&KernelInputs<'_, 'a>, &mut [f32]) -> Result<R, KernelStatus>,
    ) -> Result<R, KernelStatus> {
        self.with_output(output, |inputs, bytes| {
            if bytes.is_empty() {
                return f(inputs, &mut []);
            }
            let out = bytemuck::try_cast_slice_mut::<u8, f32>(bytes)
                .map_err(|_| KernelStatus::MISALIGNED)?;
            f(inputs, out)
        })
    }
}

/// Read-only view of a node's inputs while its output is lent out.
pub struct KernelInputs<'t, 'a> {
    table: &'t VariableTable<'a>,
    ids: &'t [usize],
}

impl KernelInputs<'_, '_> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn bytes(&self, input: usize) -> Result<&[u8], KernelStatus> {
        self.table.bytes(port(self.ids, input)?)
    }

    pub fn f32(&self, input: usize) -> Result<&[f32], KernelStatus> {
        let bytes = self.bytes(input)?;
        if bytes.is_empty() {
            return Ok(&[]);
        }
        bytemuck::try_cast_slice::<u8, f32>(bytes).map_err(|_| KernelStatus::MISALIGNED)
    }

    pub fn get(&self, input: usize, index: usize) -> Result<f32, KernelStatus> {
        self.table.read(port(self.ids, input)?, index)
    }
}

fn port(ids: &[usize], index: usize) -> Result<usize, KernelStatus> {
    ids.get(index).copied().ok_or(KernelStatus::INVALID_PORT)
}
