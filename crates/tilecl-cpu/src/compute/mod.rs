mod scheduler;
mod server;
mod storage;
mod worker;

pub use scheduler::*;
pub use server::*;
pub use storage::*;
