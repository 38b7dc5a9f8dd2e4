#[macro_use]
extern crate derive_new;

mod compute;
mod device;
mod runtime;

pub use compute::*;
pub use device::*;
pub use runtime::*;
