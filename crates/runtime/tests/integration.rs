// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: blob → context → dispatch → forward → destroy.
//!
//! Graphs are encoded with `NetworkBuilder`, except for the converter-made
//! Affine blob shared with the `graph-ir` tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use graph_ir::{NetworkBuilder, PoolingParams};
use memory_manager::MemoryError;
use runtime::{
    Context, ContextState, ElementType, FunctionContext, FunctionParams, FunctionType,
    ImplementationMatcher, Kernel, KernelIo, KernelOrigin, KernelStatus, Resolution,
    RuntimeConfig, RuntimeError, VariableStorage,
};

const AFFINE_BLOB: &[u8] = include_bytes!("../../graph-ir/tests/data/affine_impl100.nnb");

// ── Helpers ────────────────────────────────────────────────────

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn f32_values(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-5, "element {i}: {a} vs {e}");
    }
}

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32 - 10.0).collect()
}

/// `y = x * value` over 24 elements, tagged with `implementation`.
fn mul_scalar_blob(implementation: u16, value: f32) -> Vec<u8> {
    let mut b = NetworkBuilder::new();
    let in_buf = b.buffer(24);
    let out_buf = b.buffer(24);
    let x = b.variable(&[2, 3, 4], ElementType::Float32, in_buf);
    let y = b.variable(&[2, 3, 4], ElementType::Float32, out_buf);
    b.function(
        FunctionType::MulScalar,
        implementation,
        &[x],
        &[y],
        &FunctionParams::Scalar { value },
    );
    b.input(x).output(y);
    b.build()
}

/// Single unary node with its own input and output buffers.
fn unary_blob(function_type: FunctionType, dims: &[usize], params: FunctionParams<'_>) -> Vec<u8> {
    let len: usize = dims.iter().product();
    let mut b = NetworkBuilder::new();
    let in_buf = b.buffer(len);
    let out_buf = b.buffer(len);
    let x = b.variable(dims, ElementType::Float32, in_buf);
    let y = b.variable(dims, ElementType::Float32, out_buf);
    b.function(function_type, 0, &[x], &[y], &params);
    b.input(x).output(y);
    b.build()
}

/// Affine(4 → 3) → ReLU → Softmax, with constant weight and bias.
fn mlp_blob() -> Vec<u8> {
    let mut b = NetworkBuilder::new();
    let in_buf = b.buffer(8);
    let hidden_buf = b.buffer(6);
    let out_buf = b.buffer(6);
    let x = b.variable(&[2, 4], ElementType::Float32, in_buf);
    let w = b.constant_f32(
        &[4, 3],
        &[0.5, -0.25, 1.0, 0.1, 0.2, -0.3, -1.0, 0.75, 0.0, 0.3, -0.6, 0.9],
    );
    let bias = b.constant_f32(&[3], &[0.1, -0.2, 0.05]);
    let h = b.variable(&[2, 3], ElementType::Float32, hidden_buf);
    let r = b.variable(&[2, 3], ElementType::Float32, out_buf);
    let y = b.variable(&[2, 3], ElementType::Float32, hidden_buf);
    b.function(
        FunctionType::Affine,
        0,
        &[x, w, bias],
        &[h],
        &FunctionParams::Affine { base_axis: 1 },
    );
    b.function(FunctionType::Relu, 0, &[h], &[r], &FunctionParams::None);
    b.function(
        FunctionType::Softmax,
        0,
        &[r],
        &[y],
        &FunctionParams::Softmax { axis: 1 },
    );
    b.input(x).output(y);
    b.build()
}

/// Copies input 0 to output 0 byte for byte and counts its lifecycle.
struct CopyKernel {
    name: &'static str,
    executions: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
}

impl Kernel for CopyKernel {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&mut self, io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        io.with_output(0, |inputs, out| {
            out.copy_from_slice(inputs.bytes(0)?);
            Ok(())
        })
    }

    fn teardown(self: Box<Self>) -> Result<(), KernelStatus> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default, Clone)]
struct Counters {
    allocations: Arc<AtomicUsize>,
    executions: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
}

impl Counters {
    fn get(counter: &Arc<AtomicUsize>) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// A matcher for `implementation` that builds a counted [`CopyKernel`].
    fn copy_matcher(
        &self,
        implementation: u16,
        name: &'static str,
    ) -> ImplementationMatcher<impl Fn(&FunctionContext<'_>) -> Box<dyn Kernel> + Send> {
        let counters = self.clone();
        ImplementationMatcher::new(implementation, move |_function: &FunctionContext<'_>| {
            counters.allocations.fetch_add(1, Ordering::SeqCst);
            Box::new(CopyKernel {
                name,
                executions: Arc::clone(&counters.executions),
                teardowns: Arc::clone(&counters.teardowns),
            }) as Box<dyn Kernel>
        })
    }
}

// ── Dispatch protocol ──────────────────────────────────────────

#[test]
fn test_callback_binds_matching_implementation() {
    let blob = mul_scalar_blob(100, 3.0);
    let counters = Counters::default();
    let mut ctx = Context::allocate();
    ctx.register_callback(FunctionType::MulScalar, counters.copy_matcher(100, "copy"))
        .unwrap();
    ctx.initialize(&blob).unwrap();

    assert_eq!(ctx.kernel_origin(0), Some(KernelOrigin::Callback { candidate: 0 }));
    assert_eq!(ctx.kernel_name(0), Some("copy"));
    assert_eq!(ctx.input_size(0).unwrap(), 24 * 4);

    let x = ramp(24);
    ctx.input_buffer(0).unwrap().copy_from_slice(&f32_bytes(&x));
    ctx.forward().unwrap();

    // The callback copies instead of multiplying.
    assert_eq!(f32_values(ctx.output_buffer(0).unwrap()), x);
    assert_eq!(Counters::get(&counters.executions), 1);

    ctx.destroy().unwrap();
    assert_eq!(Counters::get(&counters.teardowns), 1);
}

#[test]
fn test_builtin_mul_scalar() {
    let blob = mul_scalar_blob(0, 2.5);
    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();

    assert_eq!(ctx.kernel_origin(0), Some(KernelOrigin::Builtin));
    assert_eq!(ctx.kernel_name(0), Some("mul_scalar_f32"));

    let x = ramp(24);
    ctx.input_buffer(0).unwrap().copy_from_slice(&f32_bytes(&x));
    ctx.forward().unwrap();

    let expected: Vec<f32> = x.iter().map(|v| v * 2.5).collect();
    assert_close(&f32_values(ctx.output_buffer(0).unwrap()), &expected);
}

#[test]
fn test_declining_callbacks_fall_back_to_builtin() {
    let blob = mul_scalar_blob(0, 2.0);
    let counters = Counters::default();
    let declined = Arc::new(AtomicUsize::new(0));
    let declined_count = Arc::clone(&declined);

    let mut ctx = Context::allocate();
    ctx.register_callback(FunctionType::MulScalar, counters.copy_matcher(7, "copy"))
        .unwrap();
    ctx.register_callback(
        FunctionType::MulScalar,
        move |_function: &FunctionContext<'_>| {
            declined_count.fetch_add(1, Ordering::SeqCst);
            Resolution::NotMatched
        },
    )
    .unwrap();
    ctx.initialize(&blob).unwrap();

    assert_eq!(ctx.kernel_origin(0), Some(KernelOrigin::Builtin));
    assert_eq!(Counters::get(&counters.allocations), 0);
    assert_eq!(declined.load(Ordering::SeqCst), 1);
}

#[test]
fn test_registration_order_breaks_ties() {
    let blob = mul_scalar_blob(100, 1.0);
    let counters = Counters::default();
    let mut ctx = Context::allocate();
    ctx.register_callback(FunctionType::MulScalar, counters.copy_matcher(100, "first"))
        .unwrap();
    ctx.register_callback(FunctionType::MulScalar, counters.copy_matcher(100, "second"))
        .unwrap();
    ctx.initialize(&blob).unwrap();

    assert_eq!(ctx.kernel_name(0), Some("first"));
    assert_eq!(Counters::get(&counters.allocations), 1);
}

#[test]
fn test_callbacks_for_other_types_are_ignored() {
    let blob = mul_scalar_blob(100, 2.0);
    let counters = Counters::default();
    let mut ctx = Context::allocate();
    ctx.register_callback(FunctionType::AddScalar, counters.copy_matcher(100, "copy"))
        .unwrap();
    ctx.initialize(&blob).unwrap();

    assert_eq!(ctx.kernel_origin(0), Some(KernelOrigin::Builtin));
    assert_eq!(Counters::get(&counters.allocations), 0);
}

#[test]
fn test_callback_sees_node_description() {
    let blob = mul_scalar_blob(100, 4.0);
    let seen = Arc::new(std::sync::Mutex::new(None));
    let recorder = Arc::clone(&seen);

    let mut ctx = Context::allocate();
    ctx.register_callback(
        FunctionType::MulScalar,
        move |function: &FunctionContext<'_>| {
            let x = function.input(0).map(|v| v.shape.dims().to_vec());
            let scalar = match function.params() {
                FunctionParams::Scalar { value } => Some(*value),
                _ => None,
            };
            *recorder.lock().unwrap() = Some((
                function.index(),
                function.implementation(),
                scalar,
                x,
                function.output_aliases_input(0),
            ));
            Resolution::NotMatched
        },
    )
    .unwrap();
    ctx.initialize(&blob).unwrap();

    let seen = seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen, (0, 100, Some(4.0), Some(vec![2, 3, 4]), false));
}

#[test]
fn test_resolution_happens_once() {
    let blob = mul_scalar_blob(100, 1.0);
    let counters = Counters::default();
    let mut ctx = Context::allocate();
    ctx.register_callback(FunctionType::MulScalar, counters.copy_matcher(100, "copy"))
        .unwrap();
    ctx.initialize(&blob).unwrap();

    for _ in 0..3 {
        ctx.forward().unwrap();
    }
    assert_eq!(Counters::get(&counters.allocations), 1);
    assert_eq!(Counters::get(&counters.executions), 3);
}

#[test]
fn test_unknown_function_requires_callback() {
    let blob = {
        let mut b = NetworkBuilder::new();
        let buf_in = b.buffer(4);
        let buf_out = b.buffer(4);
        let x = b.variable(&[4], ElementType::Float32, buf_in);
        let y = b.variable(&[4], ElementType::Float32, buf_out);
        b.function(
            FunctionType::Unknown(400),
            3,
            &[x],
            &[y],
            &FunctionParams::Opaque(&[9, 0, 0, 0]),
        );
        b.input(x).output(y);
        b.build()
    };

    let mut ctx = Context::allocate();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::UnsupportedFunction {
            node: 0,
            function_type: FunctionType::Unknown(400)
        }
    ));
    assert_eq!(ctx.state(), ContextState::Failed);

    let counters = Counters::default();
    let mut ctx = Context::allocate();
    ctx.register_callback(FunctionType::Unknown(400), counters.copy_matcher(3, "custom"))
        .unwrap();
    ctx.initialize(&blob).unwrap();
    ctx.input_buffer(0)
        .unwrap()
        .copy_from_slice(&f32_bytes(&[1.0, 2.0, 3.0, 4.0]));
    ctx.forward().unwrap();
    assert_eq!(f32_values(ctx.output_buffer(0).unwrap()), vec![1.0, 2.0, 3.0, 4.0]);
}

// ── Setup errors ───────────────────────────────────────────────

#[test]
fn test_shape_mismatch_binds_nothing() {
    let mut b = NetworkBuilder::new();
    let buf_in = b.buffer(24);
    let buf_out = b.buffer(24);
    let x = b.variable(&[24], ElementType::Float32, buf_in);
    let y = b.variable(&[23], ElementType::Float32, buf_out);
    b.function(
        FunctionType::MulScalar,
        0,
        &[x],
        &[y],
        &FunctionParams::Scalar { value: 2.0 },
    );
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(matches!(err, RuntimeError::Shape { node: 0, .. }), "{err}");
    assert_eq!(ctx.state(), ContextState::Failed);
    assert_eq!(ctx.kernel_name(0), None);
    assert!(matches!(ctx.forward(), Err(RuntimeError::Lifecycle { .. })));
    ctx.destroy().unwrap();
}

#[test]
fn test_arity_error() {
    let mut b = NetworkBuilder::new();
    let buf_in = b.buffer(4);
    let buf_out = b.buffer(4);
    let x = b.variable(&[4], ElementType::Float32, buf_in);
    let y = b.variable(&[4], ElementType::Float32, buf_out);
    b.function(FunctionType::Add2, 0, &[x], &[y], &FunctionParams::None);
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(
        matches!(
            err,
            RuntimeError::Arity {
                node: 0,
                port: "input",
                actual: 1,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn test_format_error_is_reported() {
    let mut b = NetworkBuilder::new();
    b.revision(0x0010_0000);
    let blob = b.build();

    let mut ctx = Context::allocate();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(matches!(err, RuntimeError::Format(_)), "{err}");
    assert_eq!(ctx.arena_stats().total_allocations, 0);
}

#[test]
fn test_out_of_memory_is_reported() {
    let blob = mul_scalar_blob(0, 1.0);
    let config = RuntimeConfig {
        memory_budget: "128".into(),
        ..Default::default()
    };
    let mut ctx = Context::with_config(config).unwrap();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(
        matches!(err, RuntimeError::Alloc(MemoryError::OutOfMemory { .. })),
        "{err}"
    );
    assert_eq!(ctx.state(), ContextState::Failed);
}

#[test]
fn test_invalid_budget_is_a_config_error() {
    let config = RuntimeConfig {
        memory_budget: "plenty".into(),
        ..Default::default()
    };
    assert!(matches!(
        Context::with_config(config),
        Err(RuntimeError::Config(_))
    ));
}

#[test]
fn test_partial_initialize_is_torn_down_by_destroy() {
    let mut b = NetworkBuilder::new();
    let buf_a = b.buffer(4);
    let buf_b = b.buffer(4);
    let x = b.variable(&[4], ElementType::Float32, buf_a);
    let h = b.variable(&[4], ElementType::Float32, buf_b);
    let y = b.variable(&[3], ElementType::Float32, buf_a);
    b.function(FunctionType::Identity, 100, &[x], &[h], &FunctionParams::None);
    b.function(FunctionType::Relu, 0, &[h], &[y], &FunctionParams::None);
    b.input(x).output(y);
    let blob = b.build();

    let counters = Counters::default();
    let mut ctx = Context::allocate();
    ctx.register_callback(FunctionType::Identity, counters.copy_matcher(100, "copy"))
        .unwrap();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(matches!(err, RuntimeError::Shape { node: 1, .. }), "{err}");
    assert_eq!(ctx.kernel_name(0), Some("copy"));
    assert_eq!(ctx.kernel_name(1), None);

    ctx.destroy().unwrap();
    assert_eq!(Counters::get(&counters.teardowns), 1);
}

// ── Lifecycle ──────────────────────────────────────────────────

#[test]
fn test_forward_before_initialize() {
    let mut ctx = Context::allocate();
    let err = ctx.forward().unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Lifecycle {
            state: ContextState::Allocated,
            ..
        }
    ));
    assert_eq!(ctx.num_inputs(), 0);
    assert!(ctx.input_buffer(0).is_err());
    assert_eq!(ctx.arena_stats().total_allocations, 0);
}

#[test]
fn test_register_after_initialize_is_rejected() {
    let blob = mul_scalar_blob(0, 1.0);
    let counters = Counters::default();
    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    let err = ctx
        .register_callback(FunctionType::MulScalar, counters.copy_matcher(0, "late"))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Lifecycle {
            state: ContextState::Initialized,
            ..
        }
    ));
    assert_eq!(ctx.kernel_origin(0), Some(KernelOrigin::Builtin));
}

#[test]
fn test_initialize_twice_is_rejected() {
    let blob = mul_scalar_blob(0, 1.0);
    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    assert!(matches!(
        ctx.initialize(&blob),
        Err(RuntimeError::Lifecycle { .. })
    ));
    assert_eq!(ctx.state(), ContextState::Initialized);
}

#[test]
fn test_io_accessors() {
    let blob = mul_scalar_blob(0, 1.0);
    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();

    assert_eq!(ctx.num_inputs(), 1);
    assert_eq!(ctx.num_outputs(), 1);
    assert_eq!(ctx.num_functions(), 1);
    let x = ctx.input_variable(0).unwrap();
    assert_eq!(x.shape.dims(), &[2, 3, 4]);
    assert_eq!(x.element, ElementType::Float32);
    assert_eq!(ctx.output_size(0).unwrap(), 96);
    assert!(matches!(
        ctx.input_size(1),
        Err(RuntimeError::InvalidIo {
            kind: "input",
            index: 1,
            count: 1
        })
    ));
    assert!(matches!(
        ctx.output_buffer(3),
        Err(RuntimeError::InvalidIo { kind: "output", .. })
    ));
}

#[test]
fn test_kernel_failure_reports_node() {
    struct Failing;

    impl Kernel for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn execute(&mut self, _io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
            Err(KernelStatus::new(42, "sensor offline"))
        }
    }

    let blob = mul_scalar_blob(9, 1.0);
    let mut ctx = Context::allocate();
    ctx.register_callback(
        FunctionType::MulScalar,
        ImplementationMatcher::new(9, |_function: &FunctionContext<'_>| {
            Box::new(Failing) as Box<dyn Kernel>
        }),
    )
    .unwrap();
    ctx.initialize(&blob).unwrap();

    let err = ctx.forward().unwrap_err();
    match err {
        RuntimeError::KernelExecution {
            node,
            function_type,
            status,
        } => {
            assert_eq!(node, 0);
            assert_eq!(function_type, FunctionType::MulScalar);
            assert_eq!(status.code, 42);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ctx.state(), ContextState::Initialized);
    assert!(ctx.forward().is_err());
}

#[test]
fn test_teardown_failure_is_reported_after_all_kernels() {
    struct Stubborn(Arc<AtomicUsize>);

    impl Kernel for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        fn execute(&mut self, _io: &mut KernelIo<'_, '_>) -> Result<(), KernelStatus> {
            Ok(())
        }

        fn teardown(self: Box<Self>) -> Result<(), KernelStatus> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(KernelStatus::new(7, "device busy"))
        }
    }

    let mut b = NetworkBuilder::new();
    let buf_a = b.buffer(4);
    let buf_b = b.buffer(4);
    let x = b.variable(&[4], ElementType::Float32, buf_a);
    let h = b.variable(&[4], ElementType::Float32, buf_b);
    let y = b.variable(&[4], ElementType::Float32, buf_a);
    b.function(FunctionType::Tanh, 1, &[x], &[h], &FunctionParams::None);
    b.function(FunctionType::Tanh, 1, &[h], &[y], &FunctionParams::None);
    b.input(x).output(y);
    let blob = b.build();

    let torn_down = Arc::new(AtomicUsize::new(0));
    let recorder = Arc::clone(&torn_down);
    let mut ctx = Context::allocate();
    ctx.register_callback(
        FunctionType::Tanh,
        ImplementationMatcher::new(1, move |_function: &FunctionContext<'_>| {
            Box::new(Stubborn(Arc::clone(&recorder))) as Box<dyn Kernel>
        }),
    )
    .unwrap();
    ctx.initialize(&blob).unwrap();

    let err = ctx.destroy().unwrap_err();
    assert!(matches!(err, RuntimeError::Teardown { node: 0, .. }), "{err}");
    assert_eq!(torn_down.load(Ordering::SeqCst), 2);
}

#[test]
fn test_drop_tears_down_kernels() {
    let blob = mul_scalar_blob(100, 1.0);
    let counters = Counters::default();
    {
        let mut ctx = Context::allocate();
        ctx.register_callback(FunctionType::MulScalar, counters.copy_matcher(100, "copy"))
            .unwrap();
        ctx.initialize(&blob).unwrap();
    }
    assert_eq!(Counters::get(&counters.teardowns), 1);
}

#[test]
fn test_destroy_releases_arena() {
    let blob = mul_scalar_blob(0, 1.0);
    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    let stats = ctx.arena_stats();
    assert_eq!(stats.total_allocations, 2);
    assert_eq!(stats.peak_allocated_bytes, 192);
    ctx.destroy().unwrap();
}

#[test]
fn test_context_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Context<'static>>();
}

// ── Built-in kernels ───────────────────────────────────────────

#[test]
fn test_fast_and_generic_paths_agree() {
    let blob = mlp_blob();
    let x = [0.3, -1.2, 2.0, 0.7, -0.4, 0.9, 1.5, -2.2];

    let run = |fast_paths: bool| {
        let config = RuntimeConfig {
            fast_paths,
            ..Default::default()
        };
        let mut ctx = Context::with_config(config).unwrap();
        ctx.initialize(&blob).unwrap();
        ctx.input_buffer(0).unwrap().copy_from_slice(&f32_bytes(&x));
        ctx.forward().unwrap();
        let names: Vec<String> = (0..ctx.num_functions())
            .map(|n| ctx.kernel_name(n).unwrap().to_string())
            .collect();
        (f32_values(ctx.output_buffer(0).unwrap()), names)
    };

    let (fast, fast_names) = run(true);
    let (generic, generic_names) = run(false);
    assert_close(&fast, &generic);
    assert!(generic_names.iter().all(|n| n.ends_with("_generic")));
    assert_eq!(fast_names[1], "relu_f32");

    // Each row of the softmax output sums to one.
    for row in fast.chunks(3) {
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_affine_reference_values() {
    let mut b = NetworkBuilder::new();
    let in_buf = b.buffer(4);
    let out_buf = b.buffer(3);
    let x = b.variable(&[1, 4], ElementType::Float32, in_buf);
    let w = b.constant_f32(
        &[4, 3],
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0],
    );
    let bias = b.constant_f32(&[3], &[0.5, 0.5, 0.5]);
    let y = b.variable(&[1, 3], ElementType::Float32, out_buf);
    b.function(
        FunctionType::Affine,
        0,
        &[x, w, bias],
        &[y],
        &FunctionParams::Affine { base_axis: 1 },
    );
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    ctx.input_buffer(0)
        .unwrap()
        .copy_from_slice(&f32_bytes(&[1.0, 0.0, -1.0, 2.0]));
    ctx.forward().unwrap();
    // [1 0 -1 2] · W = [1-7+20, 2-8+22, 3-9+24] = [14, 16, 18]
    assert_close(&f32_values(ctx.output_buffer(0).unwrap()), &[14.5, 16.5, 18.5]);
}

#[test]
fn test_in_place_relu_uses_generic_path() {
    let mut b = NetworkBuilder::new();
    let buf = b.buffer(6);
    let x = b.variable(&[6], ElementType::Float32, buf);
    let y = b.variable(&[6], ElementType::Float32, buf);
    b.function(FunctionType::Relu, 0, &[x], &[y], &FunctionParams::None);
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    assert_eq!(ctx.kernel_name(0), Some("relu_generic"));
    ctx.input_buffer(0)
        .unwrap()
        .copy_from_slice(&f32_bytes(&[-1.0, 2.0, -3.0, 4.0, 0.0, -0.5]));
    ctx.forward().unwrap();
    assert_eq!(
        f32_values(ctx.output_buffer(0).unwrap()),
        vec![0.0, 2.0, 0.0, 4.0, 0.0, 0.0]
    );
}

fn in_place_relu_blob(x_element: ElementType, y_element: ElementType) -> Vec<u8> {
    let mut b = NetworkBuilder::new();
    let buf = b.buffer(4);
    let x = b.variable(&[4], x_element, buf);
    let y = b.variable(&[4], y_element, buf);
    b.function(FunctionType::Relu, 0, &[x], &[y], &FunctionParams::None);
    b.input(x).output(y);
    b.build()
}

#[test]
fn test_in_place_widening_is_rejected() {
    let blob = in_place_relu_blob(ElementType::Int16 { frac_bits: 0 }, ElementType::Float32);
    let mut ctx = Context::allocate();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(matches!(err, RuntimeError::Shape { node: 0, .. }), "{err}");
    assert_eq!(ctx.state(), ContextState::Failed);
}

#[test]
fn test_in_place_narrowing_reads_before_writing() {
    let blob = in_place_relu_blob(ElementType::Float32, ElementType::Int16 { frac_bits: 0 });
    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    assert_eq!(ctx.kernel_name(0), Some("relu_generic"));
    ctx.input_buffer(0)
        .unwrap()
        .copy_from_slice(&f32_bytes(&[1.0, -2.0, 3.0, 4.0]));
    ctx.forward().unwrap();
    let y: Vec<i16> = ctx.output_buffer(0).unwrap()[..8]
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect();
    assert_eq!(y, vec![1, 0, 3, 4]);
}

#[test]
fn test_in_place_softmax_requires_equal_width() {
    let mut b = NetworkBuilder::new();
    let buf = b.buffer(4);
    let x = b.variable(&[2, 2], ElementType::Float32, buf);
    let y = b.variable(&[2, 2], ElementType::Int16 { frac_bits: 8 }, buf);
    b.function(
        FunctionType::Softmax,
        0,
        &[x],
        &[y],
        &FunctionParams::Softmax { axis: 1 },
    );
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    assert!(matches!(
        ctx.initialize(&blob),
        Err(RuntimeError::Shape { node: 0, .. })
    ));
}

#[test]
fn test_repeated_forward_is_deterministic() {
    let blob = mlp_blob();
    let x = f32_bytes(&[0.3, -1.2, 2.0, 0.7, -0.4, 0.9, 1.5, -2.2]);
    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();

    ctx.input_buffer(0).unwrap().copy_from_slice(&x);
    ctx.forward().unwrap();
    let first = ctx.output_buffer(0).unwrap().to_vec();

    for _ in 0..3 {
        // A pass over other data rewrites the hidden and output buffers.
        ctx.input_buffer(0).unwrap().fill(0xA5);
        ctx.forward().unwrap();
        assert_ne!(ctx.output_buffer(0).unwrap(), first.as_slice());

        ctx.input_buffer(0).unwrap().copy_from_slice(&x);
        ctx.forward().unwrap();
        assert_eq!(ctx.output_buffer(0).unwrap(), first.as_slice());
    }
}

#[test]
fn test_reshape_target_overflow_is_a_format_error() {
    let mut b = NetworkBuilder::new();
    let buf_in = b.buffer(4);
    let buf_out = b.buffer(4);
    let x = b.variable(&[4], ElementType::Float32, buf_in);
    let y = b.variable(&[4], ElementType::Float32, buf_out);
    let huge = i32::MAX as usize;
    b.function(
        FunctionType::Reshape,
        0,
        &[x],
        &[y],
        &FunctionParams::Reshape {
            shape: vec![huge, huge, huge, 4],
        },
    );
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(matches!(err, RuntimeError::Format(_)), "{err}");
}

#[test]
fn test_in_place_reshape_is_a_view() {
    let mut b = NetworkBuilder::new();
    let buf = b.buffer(6);
    let x = b.variable(&[2, 3], ElementType::Float32, buf);
    let y = b.variable(&[3, 2], ElementType::Float32, buf);
    b.function(
        FunctionType::Reshape,
        0,
        &[x],
        &[y],
        &FunctionParams::Reshape { shape: vec![3, 2] },
    );
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    assert_eq!(ctx.kernel_name(0), Some("view"));
    let x = f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    ctx.input_buffer(0).unwrap().copy_from_slice(&x);
    ctx.forward().unwrap();
    assert_eq!(ctx.output_buffer(0).unwrap(), x.as_slice());
}

#[test]
fn test_reshape_rejects_wrong_target() {
    let mut b = NetworkBuilder::new();
    let buf_in = b.buffer(6);
    let buf_out = b.buffer(6);
    let x = b.variable(&[2, 3], ElementType::Float32, buf_in);
    let y = b.variable(&[6], ElementType::Float32, buf_out);
    b.function(
        FunctionType::Reshape,
        0,
        &[x],
        &[y],
        &FunctionParams::Reshape { shape: vec![4] },
    );
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    assert!(matches!(
        ctx.initialize(&blob),
        Err(RuntimeError::Shape { node: 0, .. })
    ));
}

#[test]
fn test_fixed_point_output() {
    let mut b = NetworkBuilder::new();
    let buf_in = b.buffer(4);
    let buf_out = b.buffer(2);
    let x = b.variable(&[4], ElementType::Float32, buf_in);
    let y = b.variable(&[4], ElementType::Int16 { frac_bits: 8 }, buf_out);
    b.function(
        FunctionType::MulScalar,
        0,
        &[x],
        &[y],
        &FunctionParams::Scalar { value: 2.0 },
    );
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    assert_eq!(ctx.kernel_name(0), Some("mul_scalar_generic"));
    ctx.input_buffer(0)
        .unwrap()
        .copy_from_slice(&f32_bytes(&[0.5, -1.0, 0.0019, 1000.0]));
    ctx.forward().unwrap();

    let out: Vec<i16> = ctx
        .output_buffer(0)
        .unwrap()
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect();
    // 1.0 → 256, -2.0 → -512, 0.0038 → 1, 2000 saturates.
    assert_eq!(out, vec![256, -512, 1, i16::MAX]);
}

#[test]
fn test_binary_ops_and_quantizers() {
    let mut b = NetworkBuilder::new();
    let buf_a = b.buffer(4);
    let buf_b = b.buffer(4);
    let buf_c = b.buffer(4);
    let buf_d = b.buffer(4);
    let x = b.variable(&[4], ElementType::Float32, buf_a);
    let k = b.constant_f32(&[4], &[1.0, -1.0, 2.0, -4.0]);
    let s = b.variable(&[4], ElementType::Float32, buf_b);
    let q = b.variable(&[4], ElementType::Float32, buf_c);
    let t = b.variable(&[4], ElementType::Float32, buf_d);
    b.function(FunctionType::Mul2, 0, &[x, k], &[s], &FunctionParams::None);
    b.function(FunctionType::BinaryTanh, 0, &[s], &[q], &FunctionParams::None);
    b.function(FunctionType::Sub2, 0, &[q, s], &[t], &FunctionParams::None);
    b.input(x).output(q).output(t);
    let blob = b.build();

    let mut ctx = Context::allocate();
    ctx.initialize(&blob).unwrap();
    ctx.input_buffer(0)
        .unwrap()
        .copy_from_slice(&f32_bytes(&[0.5, 0.5, -1.0, 0.25]));
    ctx.forward().unwrap();

    // s = [0.5, -0.5, -2.0, -1.0]
    assert_eq!(
        f32_values(ctx.output_buffer(0).unwrap()),
        vec![1.0, -1.0, -1.0, -1.0]
    );
    assert_close(
        &f32_values(ctx.output_buffer(1).unwrap()),
        &[0.5, -0.5, 1.0, 0.0],
    );
}

#[test]
fn test_max_and_average_pooling() {
    let pooling = |function_type, pad: Vec<usize>, including_pad| {
        let mut b = NetworkBuilder::new();
        let buf_in = b.buffer(16);
        let buf_out = b.buffer(4);
        let (in_dims, out_dims): (&[usize], &[usize]) = if pad.iter().any(|&p| p > 0) {
            (&[1, 1, 2, 2], &[1, 1, 2, 2])
        } else {
            (&[1, 1, 4, 4], &[1, 1, 2, 2])
        };
        let x = b.variable(in_dims, ElementType::Float32, buf_in);
        let y = b.variable(out_dims, ElementType::Float32, buf_out);
        b.function(
            function_type,
            0,
            &[x],
            &[y],
            &FunctionParams::Pooling(PoolingParams {
                kernel: vec![2, 2],
                stride: vec![],
                ignore_border: true,
                pad,
                including_pad,
            }),
        );
        b.input(x).output(y);
        b.build()
    };
    let run = |blob: &[u8], x: &[f32]| {
        let mut ctx = Context::allocate();
        ctx.initialize(blob).unwrap();
        ctx.input_buffer(0).unwrap().copy_from_slice(&f32_bytes(x));
        ctx.forward().unwrap();
        f32_values(ctx.output_buffer(0).unwrap())
    };

    let grid: Vec<f32> = (1..=16).map(|v| v as f32).collect();
    let max = pooling(FunctionType::MaxPooling, vec![0, 0], false);
    assert_eq!(run(&max, &grid), vec![6.0, 8.0, 14.0, 16.0]);
    let sum = pooling(FunctionType::SumPooling, vec![0, 0], false);
    assert_eq!(run(&sum, &grid), vec![14.0, 22.0, 46.0, 54.0]);
    let avg = pooling(FunctionType::AveragePooling, vec![0, 0], false);
    assert_eq!(run(&avg, &grid), vec![3.5, 5.5, 11.5, 13.5]);

    let small = [1.0, 2.0, 3.0, 4.0];
    let avg_excl = pooling(FunctionType::AveragePooling, vec![1, 1], false);
    assert_eq!(run(&avg_excl, &small), vec![1.0, 2.0, 3.0, 4.0]);
    let avg_incl = pooling(FunctionType::AveragePooling, vec![1, 1], true);
    assert_close(&run(&avg_incl, &small), &[0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn test_pooling_rejects_wrong_output_shape() {
    let mut b = NetworkBuilder::new();
    let buf_in = b.buffer(16);
    let buf_out = b.buffer(9);
    let x = b.variable(&[1, 4, 4], ElementType::Float32, buf_in);
    let y = b.variable(&[1, 3, 3], ElementType::Float32, buf_out);
    b.function(
        FunctionType::MaxPooling,
        0,
        &[x],
        &[y],
        &FunctionParams::Pooling(PoolingParams {
            kernel: vec![2, 2],
            stride: vec![2, 2],
            ignore_border: true,
            pad: vec![0, 0],
            including_pad: false,
        }),
    );
    b.input(x).output(y);
    let blob = b.build();

    let mut ctx = Context::allocate();
    let err = ctx.initialize(&blob).unwrap_err();
    assert!(matches!(err, RuntimeError::Shape { node: 0, .. }), "{err}");
}

// ── Converter-produced blob ────────────────────────────────────

#[test]
fn test_converter_blob_with_callback() {
    let seen_base_axis = Arc::new(AtomicUsize::new(usize::MAX));
    let recorder = Arc::clone(&seen_base_axis);

    let mut ctx = Context::allocate();
    ctx.register_callback(
        FunctionType::Affine,
        move |function: &FunctionContext<'_>| {
            if let FunctionParams::Affine { base_axis } = function.params() {
                recorder.store(*base_axis, Ordering::SeqCst);
            }
            if function.implementation() != 100 {
                return Resolution::NotMatched;
            }
            Resolution::Matched(Box::new(CopyKernel {
                name: "affine_impl100",
                executions: Arc::new(AtomicUsize::new(0)),
                teardowns: Arc::new(AtomicUsize::new(0)),
            }))
        },
    )
    .unwrap();
    ctx.initialize(AFFINE_BLOB).unwrap();

    assert_eq!(seen_base_axis.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.kernel_name(0), Some("affine_impl100"));
    assert_eq!(ctx.input_size(0).unwrap(), 96);
    assert_eq!(ctx.output_size(0).unwrap(), 48);
}

#[test]
fn test_converter_blob_builtin_affine() {
    let mut ctx = Context::allocate();
    ctx.initialize(AFFINE_BLOB).unwrap();
    assert_eq!(ctx.kernel_origin(0), Some(KernelOrigin::Builtin));

    let x: Vec<f32> = (0..24).map(|i| (i as f32 - 12.0) / 8.0).collect();
    ctx.input_buffer(0).unwrap().copy_from_slice(&f32_bytes(&x));
    ctx.forward().unwrap();
    let y = f32_values(ctx.output_buffer(0).unwrap());

    let network = ctx.network().unwrap();
    let constant = |id: usize| match network.variable(id).unwrap().storage {
        VariableStorage::Constant(bytes) => f32_values(bytes),
        VariableStorage::Buffer(_) => panic!("variable {id} must be constant"),
    };
    let (w, bias) = (constant(1), constant(2));

    // x is folded into [2, 12]; the weight is [12, 6].
    let mut expected = vec![0.0f32; 12];
    for row in 0..2 {
        for col in 0..6 {
            let mut acc = bias[col];
            for p in 0..12 {
                acc += x[row * 12 + p] * w[p * 6 + col];
            }
            expected[row * 6 + col] = acc;
        }
    }
    assert_close(&y, &expected);
}

#[test]
fn test_profiling_metrics() {
    let blob = mlp_blob();
    let config = RuntimeConfig {
        enable_profiling: true,
        ..Default::default()
    };
    let mut ctx = Context::with_config(config).unwrap();
    assert!(ctx.metrics().is_none());
    ctx.initialize(&blob).unwrap();
    ctx.forward().unwrap();
    ctx.forward().unwrap();

    let metrics = ctx.metrics().unwrap();
    assert_eq!(metrics.passes, 2);
    assert_eq!(metrics.nodes.len(), 3);
    assert!(metrics.nodes.iter().all(|n| n.calls == 2));
    assert!(metrics.summary().contains("2 passes"));
}
