// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape descriptors and dimension arithmetic.

use crate::{ElementType, TensorError};
use std::fmt;

/// Describes the dimensions of a variable.
///
/// Shapes are immutable once created. A rank-0 shape is a scalar and holds
/// exactly one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

/// A shape folded around one axis into `[outer, axis, inner]`.
///
/// Element `(o, a, i)` lives at flat index `(o * axis + a) * inner + i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLayout {
    pub outer: usize,
    pub axis: usize,
    pub inner: usize,
}

impl AxisLayout {
    /// Flat index of element `(o, a, i)`.
    #[inline]
    pub fn index(&self, o: usize, a: usize, i: usize) -> usize {
        (o * self.axis + a) * self.inner + i
    }

    /// Total number of elements described by the layout.
    pub fn num_elements(&self) -> usize {
        self.outer * self.axis * self.inner
    }
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), 24);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// Creates a 2-D shape (matrix).
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements (1 for a scalar).
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Element count, or `None` if the product overflows `usize`.
    ///
    /// Used when shapes come from untrusted input.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the size of a specific dimension, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Byte length of a buffer holding this shape in the given encoding.
    pub fn size_bytes(&self, element: ElementType) -> usize {
        self.num_elements() * element.size_bytes()
    }

    /// Computes row-major (C-order) strides for this shape.
    ///
    /// The stride for dimension `i` is the number of elements to skip
    /// in the flat buffer to advance one step along that dimension.
    pub fn strides(&self) -> Vec<usize> {
        let rank = self.dims.len();
        if rank == 0 {
            return vec![];
        }
        let mut strides = vec![0usize; rank];
        strides[rank - 1] = 1;
        for i in (0..rank - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Splits the shape at `axis` into `(prod(dims[..axis]), prod(dims[axis..]))`.
    ///
    /// `axis == rank` is allowed and yields `(num_elements, 1)`.
    pub fn split_at(&self, axis: usize) -> Result<(usize, usize), TensorError> {
        if axis > self.rank() {
            return Err(TensorError::InvalidAxis {
                op: "split_at",
                axis,
                rank: self.rank(),
            });
        }
        let outer = self.dims[..axis].iter().product();
        let inner = self.dims[axis..].iter().product();
        Ok((outer, inner))
    }

    /// Folds the shape around `axis` (which must be `< rank`).
    pub fn axis_layout(&self, axis: usize) -> Result<AxisLayout, TensorError> {
        if axis >= self.rank() {
            return Err(TensorError::InvalidAxis {
                op: "axis_layout",
                axis,
                rank: self.rank(),
            });
        }
        Ok(AxisLayout {
            outer: self.dims[..axis].iter().product(),
            axis: self.dims[axis],
            inner: self.dims[axis + 1..].iter().product(),
        })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}
