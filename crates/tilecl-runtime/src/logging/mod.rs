mod profiling;
mod server;

pub use profiling::{ProfileLevel, Profiled};
pub use server::ServerLogger;
