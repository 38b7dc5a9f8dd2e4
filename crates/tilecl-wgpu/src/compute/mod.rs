mod errors;
mod server;
mod storage;

pub use server::*;
pub use storage::*;
