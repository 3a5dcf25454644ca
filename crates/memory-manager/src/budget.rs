// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory budget configuration and parsing.

use crate::MemoryError;
use std::fmt;
use std::str::FromStr;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// Recognised suffixes, longest first so `"MB"` wins over `"B"`.
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// A hard ceiling on the bytes one arena may hand out.
///
/// # Parsing
/// Case-insensitive, with optional binary suffixes:
/// `"4M"` / `"4MB"` → 4 × 1024² bytes, `"1G"`, `"512K"`, `"300B"`, or a plain
/// byte count such as `"65536"`.
///
/// # Examples
/// ```
/// use memory_manager::MemoryBudget;
///
/// let b = MemoryBudget::parse("1G").unwrap();
/// assert_eq!(b.as_mb(), 1024);
///
/// let b: MemoryBudget = "256K".parse().unwrap();
/// assert_eq!(b.as_bytes(), 256 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: usize,
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::from_mb(64)
    }
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_kb(kb: usize) -> Self {
        Self::from_bytes(kb * KIB)
    }

    pub fn from_mb(mb: usize) -> Self {
        Self::from_bytes(mb * MIB)
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the budget in megabytes (truncated).
    pub fn as_mb(&self) -> usize {
        self.bytes / MIB
    }

    /// Returns `true` if `bytes` more can be handed out on top of `used`.
    pub fn admits(&self, used: usize, bytes: usize) -> bool {
        used.checked_add(bytes).is_some_and(|total| total <= self.bytes)
    }

    /// Parses a human-readable budget string.
    ///
    /// # Errors
    /// [`MemoryError::InvalidBudget`] for empty, non-numeric, zero or
    /// overflowing values.
    pub fn parse(input: &str) -> Result<Self, MemoryError> {
        let invalid = |reason| MemoryError::InvalidBudget {
            input: input.to_string(),
            reason,
        };
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty string"));
        }

        let upper = trimmed.to_ascii_uppercase();
        let (digits, multiplier) = SUFFIXES
            .iter()
            .find_map(|&(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest, mult)))
            .unwrap_or((upper.as_str(), 1));

        let value: usize = digits
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number with an optional K/M/G suffix"))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("value overflows"))?;
        if bytes == 0 {
            return Err(invalid("budget must be non-zero"));
        }
        Ok(Self { bytes })
    }
}

impl FromStr for MemoryBudget {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (unit, size) in [("GB", GIB), ("MB", MIB), ("KB", KIB)] {
            if self.bytes >= size && self.bytes % size == 0 {
                return write!(f, "{} {unit}", self.bytes / size);
            }
        }
        write!(f, "{} B", self.bytes)
    }
}
