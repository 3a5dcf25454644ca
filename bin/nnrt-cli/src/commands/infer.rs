// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt infer` command: run a graph over raw input files.
//!
//! Inputs are copied byte for byte into the graph's input buffers, so they
//! must already be in the variable's element encoding (little-endian).

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context as _};
use runtime::{Context, RuntimeConfig};

pub fn execute(
    config: RuntimeConfig,
    graph: PathBuf,
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    repeat: usize,
) -> anyhow::Result<()> {
    let blob = super::map_graph(&graph)?;
    let mut ctx = Context::with_config(config)?;
    ctx.initialize(&blob)
        .with_context(|| format!("cannot initialise '{}'", graph.display()))?;

    if inputs.len() != ctx.num_inputs() {
        bail!(
            "graph expects {} input files, got {}",
            ctx.num_inputs(),
            inputs.len()
        );
    }
    for (index, path) in inputs.iter().enumerate() {
        let data =
            std::fs::read(path).with_context(|| format!("cannot read '{}'", path.display()))?;
        let expected = ctx.input_size(index)?;
        if data.len() != expected {
            bail!(
                "input {index} ('{}') has {} bytes, expected {expected}",
                path.display(),
                data.len()
            );
        }
        ctx.input_buffer(index)?.copy_from_slice(&data);
    }

    let started = Instant::now();
    for _ in 0..repeat.max(1) {
        ctx.forward()?;
    }
    let elapsed = started.elapsed();
    tracing::info!(passes = repeat.max(1), ?elapsed, "forward complete");

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("cannot create '{}'", output_dir.display()))?;
    for index in 0..ctx.num_outputs() {
        let path = output_dir.join(format!("output_{index}.bin"));
        std::fs::write(&path, ctx.output_buffer(index)?)
            .with_context(|| format!("cannot write '{}'", path.display()))?;
        let var = ctx.output_variable(index)?;
        println!("  output {index}: {} {} → {}", var.element, var.shape, path.display());
    }

    if let Some(metrics) = ctx.metrics() {
        println!("  {}", metrics.summary());
    }
    let stats = ctx.arena_stats();
    println!("  {}", stats.summary());

    ctx.destroy()?;
    Ok(())
}
