mod kernels;

use kernels::*;
use pretty_assertions::assert_eq;
use serial_test::serial;
use tilecl_cpu::CpuRuntime;
use tilecl_runtime::{
    AccessMode, ArgKind, ComputeError, DispatchCode, ExecutionContext, KernelArg,
    KernelDefinition, ProgramSource, Runtime, SENTINEL, WorkPartition,
};

type Context = ExecutionContext<CpuRuntime>;

fn context() -> Context {
    install();

    let mut context = Context::create_default().unwrap();
    context.build(program(), "").unwrap();
    context
}

#[test_log::test]
fn default_catalog_has_one_host_device() {
    let catalog = CpuRuntime::catalog().unwrap();

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.select(0).unwrap().backend, "cpu");
}

#[test_log::test]
#[serial]
fn scale_over_many_groups() {
    let context = context();
    let buffers = context.buffers();
    let input: Vec<f32> = (0..1000).map(|i| i as f32).collect();
    let src = buffers.upload(&input, AccessMode::ReadOnly).unwrap();
    let dst = buffers.allocate(4 * 1000, AccessMode::WriteOnly).unwrap();

    let mut kernel = context.kernel(&SCALE).unwrap();
    kernel
        .bind_arguments([
            (0, KernelArg::Int(1000)),
            (1, KernelArg::Int(3)),
            (2, KernelArg::from(&src)),
            (3, KernelArg::from(&dst)),
        ])
        .unwrap();

    let dispatcher = context.dispatcher();
    let partition = dispatcher.compute_work_partition(1000).unwrap();
    assert_eq!(partition.local(), 8);
    dispatcher.submit(&kernel, partition).unwrap();

    let output = buffers.read::<f32>(&dst).unwrap();
    let expected: Vec<f32> = input.iter().map(|value| value * 3.0).collect();
    assert_eq!(output, expected);
}

#[test_log::test]
#[serial]
fn local_memory_with_barrier() {
    let context = context();
    let buffers = context.buffers();
    let input: Vec<f32> = (0..64).map(|i| i as f32).collect();
    let src = buffers.upload(&input, AccessMode::ReadOnly).unwrap();
    let dst = buffers.allocate(4 * 64, AccessMode::WriteOnly).unwrap();

    let dispatcher = context.dispatcher();
    let partition = dispatcher.compute_work_partition(64).unwrap();
    let local = partition.local();

    let mut kernel = context.kernel(&REVERSE).unwrap();
    kernel.set_arg(0, &src).unwrap();
    kernel.set_arg(1, &dst).unwrap();
    kernel
        .set_arg(2, dispatcher.request_local_scratch(4 * local as usize).unwrap())
        .unwrap();
    dispatcher.submit(&kernel, partition).unwrap();

    let expected: Vec<f32> = input
        .chunks(local as usize)
        .flat_map(|block| block.iter().rev().copied())
        .collect();
    assert_eq!(buffers.read::<f32>(&dst).unwrap(), expected);
}

#[test_log::test]
#[serial]
fn missing_barrier_faults_the_launch() {
    let context = context();
    let buffers = context.buffers();
    let src = buffers.upload(&[1.0f32; 16], AccessMode::ReadOnly).unwrap();
    let dst = buffers.allocate(4 * 16, AccessMode::WriteOnly).unwrap();

    let dispatcher = context.dispatcher();
    let partition = dispatcher.compute_work_partition(16).unwrap();

    let mut kernel = context.kernel(&RACY_REVERSE).unwrap();
    kernel.set_arg(0, &src).unwrap();
    kernel.set_arg(1, &dst).unwrap();
    kernel
        .set_arg(2, dispatcher.request_local_scratch(4 * 16).unwrap())
        .unwrap();
    dispatcher.submit(&kernel, partition).unwrap();

    match context.finish() {
        Err(ComputeError::RuntimeDispatchError { code, reason }) => {
            assert_eq!(code, DispatchCode::ExecutionFault);
            assert!(reason.contains("without a barrier"), "{reason}");
        }
        other => panic!("expected an execution fault, got {other:?}"),
    }
    assert_eq!(context.stats().executed, 0);
}

#[test_log::test]
#[serial]
fn panicking_kernel_poisons_the_queue() {
    let context = context();
    let buffers = context.buffers();
    let src = buffers.upload(&[2.0f32; 16], AccessMode::ReadOnly).unwrap();
    let dst = buffers.allocate(4 * 16, AccessMode::ReadWrite).unwrap();

    let dispatcher = context.dispatcher();
    let partition = WorkPartition::new(16, 4, &context.device().properties).unwrap();

    let mut kernel = context.kernel(&EXPLODE).unwrap();
    kernel
        .bind_arguments([
            (0, KernelArg::Int(16)),
            (1, KernelArg::Int(2)),
            (2, KernelArg::from(&src)),
            (3, KernelArg::from(&dst)),
        ])
        .unwrap();
    dispatcher.submit(&kernel, partition).unwrap();

    match context.finish() {
        Err(ComputeError::RuntimeDispatchError { code, reason }) => {
            assert_eq!(code, DispatchCode::ExecutionFault);
            assert!(reason.contains("panicked"), "{reason}");
            assert!(reason.contains("group 2 exploded"), "{reason}");
        }
        other => panic!("expected an execution fault, got {other:?}"),
    }
    assert_eq!(context.stats().executed, 0);
    assert!(buffers.read::<f32>(&dst).is_err());
}

#[test_log::test]
#[serial]
fn fresh_buffers_hold_the_sentinel() {
    let context = context();
    let buffer = context
        .buffers()
        .allocate(4 * 3, AccessMode::ReadWrite)
        .unwrap();

    assert_eq!(
        context.buffers().read::<f32>(&buffer).unwrap(),
        vec![SENTINEL; 3]
    );
}

#[test_log::test]
#[serial]
fn entry_points_need_a_native_kernel() {
    install();
    let mut context = Context::create_default().unwrap();
    let source = ProgramSource::new(
        "unknown.wgsl",
        "@compute @workgroup_size(1)\nfn not_implemented_anywhere() {}",
    );

    match context.build(source, "") {
        Err(ComputeError::BuildFailure { log }) => {
            assert!(log.contains("not_implemented_anywhere"), "{log}")
        }
        other => panic!("expected a build failure, got {other:?}"),
    }
}

#[test_log::test]
#[serial]
fn host_and_device_signatures_must_agree() {
    let context = context();
    let wrong = KernelDefinition {
        entry: "scale",
        args: &[ArgKind::Int, ArgKind::Int, ArgKind::Buffer(tilecl_runtime::Access::Read)],
    };
    let unknown = KernelDefinition {
        entry: "nothing",
        args: &[],
    };

    assert!(matches!(
        context.kernel(&wrong),
        Err(ComputeError::ArgumentMismatch { ordinal: 3, .. })
    ));
    assert!(matches!(
        context.kernel(&unknown),
        Err(ComputeError::ArgumentMismatch { ordinal: 0, .. })
    ));
}
