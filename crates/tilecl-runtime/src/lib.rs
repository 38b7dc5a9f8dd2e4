#![warn(missing_docs)]

//! tilecl runtime crate: device catalogs, execution contexts, buffer management and kernel
//! dispatch over a single in-order command queue.

#[macro_use]
extern crate derive_new;

mod id;

/// Configuration module.
pub mod config;
/// Execution context module.
pub mod context;
/// Device catalog module.
pub mod device;
/// Kernel dispatch module.
pub mod dispatch;
/// Kernel definitions and argument binding.
pub mod kernel;
/// Logging and profiling module.
pub mod logging;
/// Buffer management module.
pub mod memory;
/// Work partition module.
pub mod partition;
/// Program front-end module.
pub mod program;
/// Command queue module.
pub mod queue;
/// Compute server module.
pub mod server;

mod error;
mod runtime;

pub use context::ExecutionContext;
pub use device::{DeviceCatalog, DeviceInfo, DeviceKind, DeviceProperties};
pub use dispatch::KernelDispatcher;
pub use error::*;
pub use id::{BufferId, ContextId, ProgramId};
pub use kernel::{Access, ArgKind, Kernel, KernelArg, KernelDefinition};
pub use memory::{AccessMode, BufferHandle, BufferManager, MemoryUsage, PendingRead};
pub use partition::{LaunchGrid, WorkPartition};
pub use program::{BuildOptions, Program, ProgramSource};
pub use queue::{CommandQueue, QueueStats};
pub use runtime::*;

/// Bit pattern written into result buffers before computation, so that untouched output is
/// recognisable after download.
pub const SENTINEL: f32 = 0xdeadbeef_u32 as f32;
