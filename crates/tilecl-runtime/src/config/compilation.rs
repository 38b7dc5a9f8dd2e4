use super::logger::{BinaryLogLevel, LoggerConfig};

/// Controls where program sources and build logs are written.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompilationConfig {
    /// Logger for the compilation output.
    #[serde(default)]
    pub logger: LoggerConfig<CompilationLogLevel>,
}

/// Compilation logging is either off or logs every build.
pub type CompilationLogLevel = BinaryLogLevel;
