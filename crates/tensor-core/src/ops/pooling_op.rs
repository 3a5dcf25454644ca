// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Two-dimensional pooling over the trailing axes of a tensor.
//!
//! [`PoolingGeometry`] carries all window arithmetic. It is computed once
//! when a kernel is bound and then replayed on every pass, either over raw
//! `f32` slices ([`pool_f32`]) or through an element accessor for quantized
//! operands ([`PoolMode::reduce`]).

use std::ops::Range;

use crate::{Shape, TensorError};

/// Number of spatial axes a pooling window spans.
pub const POOL_SPATIAL_RANK: usize = 2;

/// Window reduction applied by a pooling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
    Max,
    Sum,
    /// Mean over the window. With `including_pad` the divisor is the padded
    /// window area, otherwise only the in-bounds area.
    Average { including_pad: bool },
}

impl PoolMode {
    /// Reduces one window, reading input elements through `get`.
    ///
    /// Empty windows (entirely inside the padding) reduce to `0.0`.
    pub fn reduce(self, window: &PoolWindow, mut get: impl FnMut(usize) -> f32) -> f32 {
        let mut indices = window.indices();
        match self {
            Self::Max => match indices.next() {
                Some(first) => indices.fold(get(first), |acc, idx| acc.max(get(idx))),
                None => 0.0,
            },
            Self::Sum => indices.map(get).sum(),
            Self::Average { including_pad } => {
                let divisor = if including_pad {
                    window.padded_size
                } else {
                    window.clamped_size()
                };
                if divisor == 0 {
                    return 0.0;
                }
                indices.map(get).sum::<f32>() / divisor as f32
            }
        }
    }
}

/// One output position of a pooling pass and the input region it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolWindow {
    /// Flat index of the output element.
    pub output_index: usize,
    /// Flat index of the first element of the input feature map.
    pub map_offset: usize,
    /// In-bounds rows of the window.
    pub rows: Range<usize>,
    /// In-bounds columns of the window.
    pub cols: Range<usize>,
    /// Window area before clamping to the input, padding included.
    pub padded_size: usize,
    row_len: usize,
}

impl PoolWindow {
    /// Flat input indices covered by the window, row-major.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.clone().flat_map(move |r| {
            let base = self.map_offset + r * self.row_len;
            self.cols.clone().map(move |c| base + c)
        })
    }

    /// Number of in-bounds input elements in the window.
    pub fn clamped_size(&self) -> usize {
        self.rows.len() * self.cols.len()
    }
}

/// Precomputed window arithmetic for a 2-D pooling node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolingGeometry {
    maps: usize,
    in_hw: [usize; 2],
    out_hw: [usize; 2],
    kernel: [usize; 2],
    stride: [usize; 2],
    pad: [usize; 2],
}

impl PoolingGeometry {
    /// Computes the geometry and the resulting output shape.
    ///
    /// The window spans the last two axes of `input`; leading axes are kept
    /// as independent feature maps. An empty `stride` defaults to `kernel`.
    /// Output extent per spatial axis is `(in + 2·pad − k) / s + 1` when
    /// `ignore_border` is set and `ceil((in + 2·pad) / s)` otherwise.
    ///
    /// # Errors
    /// Returns [`TensorError::InvalidParameter`] for lists that are not
    /// exactly two long, zero kernel or stride extents, an input of lower
    /// rank than the kernel, or a window larger than the padded input.
    pub fn new(
        input: &Shape,
        kernel: &[usize],
        stride: &[usize],
        pad: &[usize],
        ignore_border: bool,
    ) -> Result<(Self, Shape), TensorError> {
        let stride = if stride.is_empty() { kernel } else { stride };
        let kernel = pair("kernel", kernel)?;
        let stride = pair("stride", stride)?;
        let pad = pair("pad", pad)?;

        if input.rank() < POOL_SPATIAL_RANK {
            return Err(invalid(format!(
                "input rank {} is smaller than the kernel rank {POOL_SPATIAL_RANK}",
                input.rank()
            )));
        }
        if kernel.contains(&0) || stride.contains(&0) {
            return Err(invalid(format!(
                "kernel {kernel:?} and stride {stride:?} must be positive"
            )));
        }

        let lead = input.rank() - POOL_SPATIAL_RANK;
        let dims = input.dims();
        let in_hw = [dims[lead], dims[lead + 1]];
        let mut out_hw = [0usize; 2];
        for axis in 0..POOL_SPATIAL_RANK {
            let padded = pad[axis]
                .checked_mul(2)
                .and_then(|p| p.checked_add(in_hw[axis]))
                .ok_or_else(|| {
                    invalid(format!(
                        "padding {} overflows extent {} on axis {axis}",
                        pad[axis], in_hw[axis]
                    ))
                })?;
            out_hw[axis] = if ignore_border {
                if padded < kernel[axis] {
                    return Err(invalid(format!(
                        "kernel {} exceeds padded extent {padded} on axis {axis}",
                        kernel[axis]
                    )));
                }
                (padded - kernel[axis]) / stride[axis] + 1
            } else {
                padded.div_ceil(stride[axis])
            };
        }

        let mut out_dims = dims[..lead].to_vec();
        out_dims.extend_from_slice(&out_hw);
        let geometry = Self {
            maps: dims[..lead].iter().product(),
            in_hw,
            out_hw,
            kernel,
            stride,
            pad,
        };
        Ok((geometry, Shape::new(out_dims)))
    }

    /// Number of input elements the geometry reads.
    pub fn input_len(&self) -> usize {
        self.maps * self.in_hw[0] * self.in_hw[1]
    }

    /// Number of output elements the geometry writes.
    pub fn output_len(&self) -> usize {
        self.maps * self.out_hw[0] * self.out_hw[1]
    }

    /// Iterates over every output position in row-major order.
    pub fn windows(&self) -> impl Iterator<Item = PoolWindow> + '_ {
        let [out_h, out_w] = self.out_hw;
        (0..self.maps).flat_map(move |map| {
            (0..out_h).flat_map(move |oy| (0..out_w).map(move |ox| self.window(map, oy, ox)))
        })
    }

    fn window(&self, map: usize, oy: usize, ox: usize) -> PoolWindow {
        let (rows, rows_padded) = self.span(0, oy);
        let (cols, cols_padded) = self.span(1, ox);
        PoolWindow {
            output_index: (map * self.out_hw[0] + oy) * self.out_hw[1] + ox,
            map_offset: map * self.in_hw[0] * self.in_hw[1],
            rows,
            cols,
            padded_size: rows_padded * cols_padded,
            row_len: self.in_hw[1],
        }
    }

    /// In-bounds range and padded extent of the window along one axis.
    fn span(&self, axis: usize, pos: usize) -> (Range<usize>, usize) {
        let extent = self.in_hw[axis] as i64;
        let pad = self.pad[axis] as i64;
        let start = (pos * self.stride[axis]) as i64 - pad;
        let end = (start + self.kernel[axis] as i64).min(extent + pad);
        let padded = (end - start).max(0) as usize;
        let lo = start.clamp(0, extent) as usize;
        let hi = end.clamp(0, extent) as usize;
        (lo..hi.max(lo), padded)
    }
}

/// Runs a pooling pass over `f32` slices.
///
/// # Errors
/// Returns [`TensorError::LengthMismatch`] if the slices do not match the
/// geometry.
pub fn pool_f32(
    mode: PoolMode,
    geometry: &PoolingGeometry,
    src: &[f32],
    dst: &mut [f32],
) -> Result<(), TensorError> {
    for (len, expected) in [
        (src.len(), geometry.input_len()),
        (dst.len(), geometry.output_len()),
    ] {
        if len != expected {
            return Err(TensorError::LengthMismatch {
                op: "pooling",
                expected,
                actual: len,
            });
        }
    }
    for window in geometry.windows() {
        dst[window.output_index] = mode.reduce(&window, |idx| src[idx]);
    }
    Ok(())
}

fn pair(name: &str, values: &[usize]) -> Result<[usize; 2], TensorError> {
    <[usize; 2]>::try_from(values).map_err(|_| {
        invalid(format!(
            "{name} must have {POOL_SPATIAL_RANK} entries, got {}",
            values.len()
        ))
    })
}

fn invalid(detail: String) -> TensorError {
    TensorError::InvalidParameter {
        op: "pooling",
        detail,
    }
}
