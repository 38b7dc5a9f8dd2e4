//! Run compute kernels on any device through one execution model: pick a device from a
//! catalog, build a program, move buffers, and launch kernels on an in-order queue.

pub use tilecl_runtime::*;

#[cfg(feature = "cpu")]
pub use tilecl_cpu as cpu;

#[cfg(feature = "wgpu")]
pub use tilecl_wgpu as wgpu;

#[cfg(feature = "linalg")]
pub use tilecl_linalg as linalg;
