//! Tiled matrix multiplication and vector kernels for tilecl, with the host-side reference
//! computations used to verify them.

#[macro_use]
extern crate derive_new;

/// Kernel definitions and program sources.
pub mod kernels;
/// Matrix multiplication launch and host reference.
pub mod matmul;
/// Host matrices.
pub mod matrix;
/// Vector addition launches.
pub mod vadd;
/// Result verification and reporting.
pub mod verify;

pub use matmul::*;
pub use matrix::*;
pub use verify::*;

#[cfg(feature = "export_tests")]
/// Tests shared by every runtime.
pub mod tests;
