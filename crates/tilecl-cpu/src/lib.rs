//! Host-emulated device for tilecl.
//!
//! Work-groups run on worker threads. Kernels are native Rust implementations registered under
//! the name of the WGSL entry point they stand for, see [kernel::register].

#[macro_use]
extern crate derive_new;

pub mod compute;
pub mod device;
pub mod kernel;
pub mod runtime;

pub use kernel::{GlobalBuffer, KernelFault, Lane, NativeKernel, WorkGroup, register};
pub use runtime::*;
