// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # nnrt
//!
//! Command-line interface for the nnrt execution context.
//!
//! ## Usage
//! ```bash
//! # Print the variables, functions and arena requirement of a graph blob
//! nnrt inspect --graph model.nnb
//!
//! # Run a graph over raw little-endian input files
//! nnrt -c nnrt.toml infer --graph model.nnb --input x.bin --output-dir out --repeat 10
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "nnrt",
    about = "Embedded neural-network inference runtime",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialise a context and run forward passes over raw input files.
    Infer {
        /// Path to the graph blob.
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Raw input files, one per graph input, in order.
        #[arg(short, long = "input", num_args = 1..)]
        inputs: Vec<std::path::PathBuf>,

        /// Directory receiving `output_<i>.bin` files.
        #[arg(short, long, default_value = ".")]
        output_dir: std::path::PathBuf,

        /// Number of forward passes.
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },

    /// Inspect a graph blob: variables, functions and arena requirement.
    Inspect {
        /// Path to the graph blob.
        #[arg(short, long)]
        graph: std::path::PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Infer {
            graph,
            inputs,
            output_dir,
            repeat,
        } => commands::infer::execute(config, graph, inputs, output_dir, repeat),
        Commands::Inspect { graph } => commands::inspect::execute(graph),
    }
}
