use super::logger::{LogLevel, LoggerConfig};

/// Controls per-kernel execution profiling.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ProfilingConfig {
    /// Logger for the profiling output.
    #[serde(default)]
    pub logger: LoggerConfig<ProfilingLogLevel>,
}

/// How much profiling information is logged.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProfilingLogLevel {
    /// Profiling is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// Only the summary table, printed when a queue finishes.
    #[serde(rename = "basic")]
    Basic,

    /// The summary table and one line per kernel execution.
    #[serde(rename = "medium")]
    Medium,

    /// Everything, including the launch grid of each execution.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for ProfilingLogLevel {}
