// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the helpers they share.

pub mod infer;
pub mod inspect;

use std::fs::File;
use std::path::Path;

use anyhow::Context as _;
use memmap2::Mmap;
use runtime::RuntimeConfig;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber; `RUST_LOG` overrides the verbosity flags.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reads the TOML config if one was given, otherwise the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => Ok(RuntimeConfig::from_file(path)?),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Memory-maps a graph blob read-only.
pub fn map_graph(path: &Path) -> anyhow::Result<Mmap> {
    let file = File::open(path).with_context(|| format!("cannot open '{}'", path.display()))?;
    // SAFETY: the map is read-only and the blob is not expected to change
    // while the command runs.
    let map = unsafe { Mmap::map(&file) }
        .with_context(|| format!("cannot map '{}'", path.display()))?;
    Ok(map)
}
