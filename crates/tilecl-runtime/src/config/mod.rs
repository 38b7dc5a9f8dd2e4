/// Compilation config module.
pub mod compilation;
/// Host device config module.
pub mod cpu;
/// Dispatch config module.
pub mod dispatch;
/// Profiling config module.
pub mod profiling;
/// Verification config module.
pub mod verify;

mod base;
mod logger;

pub use base::*;
pub use logger::{BinaryLogLevel, LogCrateLevel, LogLevel, Logger, LoggerConfig};
