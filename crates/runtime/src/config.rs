// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Context configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! memory_budget = "4M"
//! enable_profiling = false
//! fast_paths = true
//! ```

use memory_manager::MemoryBudget;
use std::path::Path;

/// Configuration for an execution context.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Arena ceiling for variable buffers (human-readable, e.g., `"4M"`).
    pub memory_budget: String,
    /// Whether to record per-node timings in [`ForwardMetrics`](crate::ForwardMetrics).
    pub enable_profiling: bool,
    /// Whether built-ins may bind type-specialised `f32` kernels.
    /// `false` forces the generic per-element path everywhere.
    pub fast_paths: bool,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, super::RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            super::RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, super::RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| super::RuntimeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, super::RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| super::RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Parses the memory budget string into a [`MemoryBudget`].
    pub fn parse_budget(&self) -> Result<MemoryBudget, super::RuntimeError> {
        MemoryBudget::parse(&self.memory_budget)
            .map_err(|e| super::RuntimeError::Config(format!("invalid budget: {e}")))
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_budget: "64M".to_string(),
            enable_profiling: false,
            fast_paths: true,
        }
    }
}
