mod server;

pub use server::*;

use core::sync::atomic::{AtomicUsize, Ordering};

use tilecl_runtime::{
    Access, ArgKind, ComputeError, ComputeResult, DeviceCatalog, DeviceInfo, DeviceKind,
    DeviceProperties, KernelDefinition, ProgramSource, Runtime,
};

/// Number of servers created by [DummyRuntime].
pub static CREATED: AtomicUsize = AtomicUsize::new(0);

pub const PROGRAM: &str = include_str!("dummy.wgsl");

const BINARY: &[ArgKind] = &[
    ArgKind::Int,
    ArgKind::Buffer(Access::Read),
    ArgKind::Buffer(Access::Read),
    ArgKind::Buffer(Access::Write),
];

pub const ADD: KernelDefinition = KernelDefinition {
    entry: "add",
    args: BINARY,
};

pub const FAIL: KernelDefinition = KernelDefinition {
    entry: "fail",
    args: BINARY,
};

/// Keeps the queue thread busy until [RELEASE_HOLD] is set.
pub const HOLD: KernelDefinition = KernelDefinition {
    entry: "hold",
    args: BINARY,
};

pub fn program() -> ProgramSource {
    ProgramSource::new("dummy.wgsl", PROGRAM)
}

/// A runtime executing `u32` kernels on host byte buffers, without any threading of its own.
#[derive(Debug)]
pub struct DummyRuntime;

impl Runtime for DummyRuntime {
    type Server = DummyServer;

    fn name() -> &'static str {
        "dummy"
    }

    fn catalog() -> ComputeResult<DeviceCatalog> {
        Ok(DeviceCatalog::new(vec![
            device("dummy", DeviceProperties::new(64, 1024, true, 4096, 1024)),
            device(
                "dummy-no-local",
                DeviceProperties::new(16, 0, false, 4096, 1024),
            ),
        ]))
    }

    fn create_server(device: &DeviceInfo) -> ComputeResult<Self::Server> {
        if device.name.starts_with("unplugged") {
            return Err(ComputeError::DeviceUnavailable {
                reason: format!("{} was removed", device.name),
            });
        }

        CREATED.fetch_add(1, Ordering::SeqCst);
        Ok(DummyServer::default())
    }
}

fn device(name: &str, properties: DeviceProperties) -> DeviceInfo {
    DeviceInfo {
        index: 0,
        name: name.into(),
        kind: DeviceKind::Other,
        backend: DummyRuntime::name(),
        properties,
    }
}
