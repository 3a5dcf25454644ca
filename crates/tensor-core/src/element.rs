// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element encodings stored in variable buffers.
//!
//! Fixed-point variants store `round(value * 2^frac_bits)` as a signed
//! integer; reading multiplies by `2^-frac_bits`. Writes saturate at the
//! integer range instead of wrapping.

use std::fmt;

/// The encoding of a single element inside a variable buffer.
///
/// The runtime uses `ElementType` to size buffers and to choose between the
/// `f32` fast path and the coercing generic path of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ElementType {
    /// 32-bit IEEE 754 floating point.
    Float32,
    /// 16-bit signed fixed point with `frac_bits` fractional bits.
    Int16 { frac_bits: u8 },
    /// 8-bit signed fixed point with `frac_bits` fractional bits.
    Int8 { frac_bits: u8 },
}

/// Largest fractional-bit count the 4-bit field of a variable record can carry.
pub const MAX_FRAC_BITS: u8 = 15;

impl ElementType {
    /// Decodes the on-disk type code (0 = f32, 1 = i16, 2 = i8).
    ///
    /// Returns `None` for unknown codes or out-of-range fractional bits.
    pub fn from_code(code: u32, frac_bits: u8) -> Option<Self> {
        if frac_bits > MAX_FRAC_BITS {
            return None;
        }
        match code {
            0 => Some(Self::Float32),
            1 => Some(Self::Int16 { frac_bits }),
            2 => Some(Self::Int8 { frac_bits }),
            _ => None,
        }
    }

    /// Returns the on-disk type code.
    pub fn code(self) -> u32 {
        match self {
            Self::Float32 => 0,
            Self::Int16 { .. } => 1,
            Self::Int8 { .. } => 2,
        }
    }

    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Int16 { .. } => 2,
            Self::Int8 { .. } => 1,
        }
    }

    /// Number of fractional bits (always 0 for `Float32`).
    pub fn frac_bits(self) -> u8 {
        match self {
            Self::Float32 => 0,
            Self::Int16 { frac_bits } | Self::Int8 { frac_bits } => frac_bits,
        }
    }

    /// Returns `true` for the floating-point encoding.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32)
    }

    /// Value of one least-significant bit, `2^-frac_bits` (1.0 for `Float32`).
    pub fn coefficient(self) -> f32 {
        1.0 / (1u32 << self.frac_bits()) as f32
    }

    /// Reads element `index` from `bytes` and converts it to `f32`.
    ///
    /// Returns `None` if the element lies outside `bytes`.
    #[inline]
    pub fn read(self, bytes: &[u8], index: usize) -> Option<f32> {
        let size = self.size_bytes();
        let start = index.checked_mul(size)?;
        let raw = bytes.get(start..start + size)?;
        let value = match self {
            Self::Float32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            Self::Int16 { .. } => i16::from_le_bytes([raw[0], raw[1]]) as f32 * self.coefficient(),
            Self::Int8 { .. } => raw[0] as i8 as f32 * self.coefficient(),
        };
        Some(value)
    }

    /// Converts `value` to this encoding and stores it as element `index`.
    ///
    /// Returns `None` if the element lies outside `bytes`.
    #[inline]
    pub fn write(self, bytes: &mut [u8], index: usize, value: f32) -> Option<()> {
        let size = self.size_bytes();
        let start = index.checked_mul(size)?;
        let raw = bytes.get_mut(start..start + size)?;
        match self {
            Self::Float32 => raw.copy_from_slice(&value.to_le_bytes()),
            Self::Int16 { .. } => {
                let q = self.quantize(value, i16::MIN as f32, i16::MAX as f32) as i16;
                raw.copy_from_slice(&q.to_le_bytes());
            }
            Self::Int8 { .. } => {
                let q = self.quantize(value, i8::MIN as f32, i8::MAX as f32) as i8;
                raw[0] = q as u8;
            }
        }
        Some(())
    }

    /// Scales, rounds to nearest and saturates into `[min, max]`.
    /// NaN maps to zero.
    fn quantize(self, value: f32, min: f32, max: f32) -> f32 {
        let scaled = (value / self.coefficient()).round();
        if scaled.is_nan() {
            0.0
        } else {
            scaled.clamp(min, max)
        }
    }

    /// Returns a short human-readable label (`f32`, `i16q8`, `i8q4`, ...).
    pub fn label(self) -> String {
        match self {
            Self::Float32 => "f32".to_string(),
            Self::Int16 { frac_bits } => format!("i16q{frac_bits}"),
            Self::Int8 { frac_bits } => format!("i8q{frac_bits}"),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
