// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Decoded per-function parameter blocks.
//!
//! The parameter area is the tail of a function record after its five fixed
//! words. Scalars are stored inline; lists are `{count, block}` pairs that
//! point at other blocks, exactly like the header lists.

use crate::loader::{BlobReader, ListRef, WORD};
use crate::{FormatError, FunctionType};
use byteorder::{ByteOrder, LittleEndian};

/// Window parameters shared by the pooling family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolingParams {
    pub kernel: Vec<usize>,
    /// Empty means "same as `kernel`".
    pub stride: Vec<usize>,
    pub ignore_border: bool,
    pub pad: Vec<usize>,
    /// Only meaningful for average pooling.
    pub including_pad: bool,
}

/// The typed parameter block of one function.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionParams<'a> {
    /// The function type takes no parameters.
    None,
    Affine { base_axis: usize },
    Pooling(PoolingParams),
    LeakyRelu { alpha: f32 },
    Softmax { axis: usize },
    /// Scalar operand of `AddScalar` / `MulScalar`.
    Scalar { value: f32 },
    Reshape { shape: Vec<usize> },
    /// Undecoded parameter bytes of an unknown function type.
    Opaque(&'a [u8]),
}

impl<'a> FunctionParams<'a> {
    /// Decodes the parameter area of function `index`.
    pub(crate) fn decode(
        index: usize,
        function_type: FunctionType,
        area: &'a [u8],
        reader: &BlobReader<'a>,
    ) -> Result<Self, FormatError> {
        let mut cursor = ParamCursor {
            index,
            function_type,
            area,
            word: 0,
            reader,
        };
        let params = match function_type {
            FunctionType::Affine => Self::Affine {
                base_axis: cursor.non_negative("base_axis")?,
            },
            FunctionType::MaxPooling | FunctionType::SumPooling => {
                Self::Pooling(cursor.pooling(false)?)
            }
            FunctionType::AveragePooling => Self::Pooling(cursor.pooling(true)?),
            FunctionType::LeakyRelu => Self::LeakyRelu {
                alpha: cursor.f32()?,
            },
            FunctionType::Softmax => Self::Softmax {
                axis: cursor.non_negative("axis")?,
            },
            FunctionType::AddScalar | FunctionType::MulScalar => Self::Scalar {
                value: cursor.f32()?,
            },
            FunctionType::Reshape => Self::Reshape {
                shape: cursor.shape("shape")?,
            },
            FunctionType::Unknown(_) => return Ok(Self::Opaque(area)),
            _ => Self::None,
        };
        Ok(params)
    }

    /// Returns `true` if the block carries no parameters.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Sequential reader over a parameter area.
struct ParamCursor<'r, 'a> {
    index: usize,
    function_type: FunctionType,
    area: &'a [u8],
    word: usize,
    reader: &'r BlobReader<'a>,
}

impl ParamCursor<'_, '_> {
    fn malformed(&self, detail: String) -> FormatError {
        FormatError::MalformedParams {
            function: self.index,
            function_type: self.function_type.to_string(),
            detail,
        }
    }

    fn raw(&mut self) -> Result<[u8; WORD], FormatError> {
        let area = self.area;
        let start = self.word * WORD;
        let bytes = area.get(start..start + WORD).ok_or_else(|| {
            self.malformed(format!(
                "parameter area has {} bytes, word {} is missing",
                area.len(),
                self.word
            ))
        })?;
        self.word += 1;
        let mut raw = [0u8; WORD];
        raw.copy_from_slice(bytes);
        Ok(raw)
    }

    fn i32(&mut self) -> Result<i32, FormatError> {
        Ok(LittleEndian::read_i32(&self.raw()?))
    }

    fn f32(&mut self) -> Result<f32, FormatError> {
        Ok(LittleEndian::read_f32(&self.raw()?))
    }

    fn flag(&mut self) -> Result<bool, FormatError> {
        Ok(self.i32()? != 0)
    }

    fn non_negative(&mut self, name: &str) -> Result<usize, FormatError> {
        let value = self.i32()?;
        usize::try_from(value).map_err(|_| self.malformed(format!("{name} is negative ({value})")))
    }

    fn list(&mut self, name: &str) -> Result<Vec<usize>, FormatError> {
        let list = ListRef {
            count: self.i32()?,
            block: self.i32()?,
        };
        let values = self.reader.list(list, "parameter list")?;
        values
            .into_iter()
            .map(|v| {
                usize::try_from(v)
                    .map_err(|_| self.malformed(format!("{name} contains negative entry {v}")))
            })
            .collect()
    }

    /// A list whose element count must fit in `usize`.
    fn shape(&mut self, name: &str) -> Result<Vec<usize>, FormatError> {
        let dims = self.list(name)?;
        if dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)).is_none() {
            return Err(self.malformed(format!("{name} {dims:?} overflows the element count")));
        }
        Ok(dims)
    }

    fn pooling(&mut self, with_including_pad: bool) -> Result<PoolingParams, FormatError> {
        let kernel = self.list("kernel")?;
        let stride = self.list("stride")?;
        let ignore_border = self.flag()?;
        let pad = self.list("pad")?;
        let including_pad = if with_including_pad {
            self.flag()?
        } else {
            false
        };
        Ok(PoolingParams {
            kernel,
            stride,
            ignore_border,
            pad,
            including_pad,
        })
    }
}
