// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt inspect` command: display graph structure and arena requirement.

use std::path::PathBuf;

use graph_ir::NetworkLoader;

pub fn execute(graph: PathBuf) -> anyhow::Result<()> {
    let blob = super::map_graph(&graph)?;
    let network = NetworkLoader::load(&blob)
        .map_err(|e| anyhow::anyhow!("invalid graph '{}': {e}", graph.display()))?;

    // ── Summary ────────────────────────────────────────────────
    println!("  Graph: {}", graph.display());
    println!("  {}", network.summary());
    println!();

    // ── Variables ──────────────────────────────────────────────
    println!("  Variables:");
    for var in network.variables() {
        let role = if network.inputs().contains(&var.id) {
            " (input)"
        } else if network.outputs().contains(&var.id) {
            " (output)"
        } else {
            ""
        };
        println!("   {}{role}", var.summary());
    }
    println!();

    // ── Functions ──────────────────────────────────────────────
    println!("  Functions:");
    for function in network.functions() {
        let builtin = if runtime::has_builtin(function.function_type) {
            ""
        } else {
            "  [needs callback]"
        };
        println!("   {}{builtin}", function.summary());
    }
    println!();

    // ── Arena ──────────────────────────────────────────────────
    println!("  Arena buffers:");
    for (index, bytes) in network.buffer_requirements().iter().enumerate() {
        println!("   buffer {index}: {bytes} bytes");
    }
    println!(
        "  Arena total: {:.1} KB, constants: {:.1} KB",
        network.arena_bytes() as f64 / 1024.0,
        network.constant_bytes() as f64 / 1024.0,
    );
    Ok(())
}
