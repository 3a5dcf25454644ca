// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: Override one node with a user kernel.
//!
//! Builds a two-node graph whose `MulScalar` node carries implementation
//! id 100, registers a callback that claims that id, and runs it next to
//! the built-in `ReLU`.
//!
//! ```bash
//! cargo run -p runtime --example callback
//! ```

use graph_ir::NetworkBuilder;
use runtime::{
    Context, ElementType, FunctionContext, FunctionParams, FunctionType, ImplementationMatcher,
    Kernel, KernelIo, KernelStatus,
};

/// Multiplies by the node's scalar, then clamps to `[-limit, limit]`.
struct ClampedScale {
    scale: f32,
    limit: f32,
    len: usize,
}

impl Kernel for ClampedScale {
    fn name(&self) -> &str {
        "clamped_scale"
    }

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        for i in 0..self.len {
            let v = io.get(0, i)? * self.scale;
            io.set(0, i, v.clamp(-self.limit, self.limit))?;
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let mut b = NetworkBuilder::new();
    let buf_in = b.buffer(6);
    let buf_out = b.buffer(6);
    let x = b.variable(&[2, 3], ElementType::Float32, buf_in);
    let h = b.variable(&[2, 3], ElementType::Float32, buf_out);
    let y = b.variable(&[2, 3], ElementType::Float32, buf_in);
    b.function(
        FunctionType::MulScalar,
        100,
        &[x],
        &[h],
        &FunctionParams::Scalar { value: 4.0 },
    );
    b.function(FunctionType::Relu, 0, &[h], &[y], &FunctionParams::None);
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    ctx.register_callback(
        FunctionType::MulScalar,
        ImplementationMatcher::new(100, |function: &FunctionContext<'_>| {
            let scale = match function.params() {
                FunctionParams::Scalar { value } => *value,
                _ => 1.0,
            };
            let len = function.output(0).map_or(0, |v| v.num_elements());
            Box::new(ClampedScale {
                scale,
                limit: 5.0,
                len,
            }) as Box<dyn Kernel>
        }),
    )?;
    ctx.initialize(&blob)?;

    for node in 0..ctx.num_functions() {
        println!(
            "node {node}: {} ({:?})",
            ctx.kernel_name(node).unwrap_or("-"),
            ctx.kernel_origin(node)
        );
    }

    let x: Vec<f32> = vec![-2.0, -0.5, 0.25, 0.5, 1.0, 3.0];
    let bytes: Vec<u8> = x.iter().flat_map(|v| v.to_le_bytes()).collect();
    ctx.input_buffer(0)?.copy_from_slice(&bytes);
    ctx.forward()?;

    let y: Vec<f32> = ctx
        .output_buffer(0)?
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    println!("x = {x:?}");
    println!("y = {y:?}");

    ctx.destroy()?;
    Ok(())
}
