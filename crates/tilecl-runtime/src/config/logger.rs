use super::{GlobalConfig, compilation::CompilationLogLevel, profiling::ProfilingLogLevel};
use core::fmt::Display;
use hashbrown::HashMap;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};

/// Configuration of one logging channel, parameterized by its level type.
///
/// Several sinks can be enabled at the same time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct LoggerConfig<L: LogLevel> {
    /// Path to the log file, if file logging is enabled.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Whether to append to the log file (true) or truncate it (false).
    #[serde(default = "append_default")]
    pub append: bool,

    /// Whether to log to standard output.
    #[serde(default)]
    pub stdout: bool,

    /// Whether to log to standard error.
    #[serde(default)]
    pub stderr: bool,

    /// Forward messages to the `log` crate at this level.
    #[serde(default)]
    pub log: Option<LogCrateLevel>,

    /// Verbosity of the channel.
    #[serde(default)]
    pub level: L,
}

impl<L: LogLevel> Default for LoggerConfig<L> {
    fn default() -> Self {
        Self {
            file: None,
            append: true,
            stdout: false,
            stderr: false,
            log: None,
            level: L::default(),
        }
    }
}

/// Levels used when forwarding to the `log` crate.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum LogCrateLevel {
    /// Logs informational messages.
    #[default]
    #[serde(rename = "info")]
    Info,

    /// Logs debugging messages.
    #[serde(rename = "debug")]
    Debug,

    /// Logs trace-level messages.
    #[serde(rename = "trace")]
    Trace,
}

fn append_default() -> bool {
    true
}

/// Types usable as the level of a [LoggerConfig].
pub trait LogLevel:
    serde::de::DeserializeOwned + serde::Serialize + Clone + Copy + core::fmt::Debug + Default
{
}

/// Binary log level, either everything or nothing.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryLogLevel {
    /// Logging is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// Logging is fully enabled.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for BinaryLogLevel {}

/// Writes the compilation and profiling channels to their configured sinks.
///
/// Sinks shared by both channels are opened once.
#[derive(Debug)]
pub struct Logger {
    loggers: Vec<LoggerKind>,
    compilation_index: Vec<usize>,
    profiling_index: Vec<usize>,
    /// The configuration the logger was created from.
    pub config: Arc<GlobalConfig>,
}

#[derive(Hash, PartialEq, Eq)]
enum LoggerId {
    File(PathBuf),
    Stdout,
    Stderr,
    LogCrate(LogCrateLevel),
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a logger from the global configuration.
    pub fn new() -> Self {
        Self::from_config(GlobalConfig::get())
    }

    /// Creates a logger from an explicit configuration.
    pub fn from_config(config: Arc<GlobalConfig>) -> Self {
        let mut registry = Registry::default();
        let mut compilation_index = Vec::new();
        let mut profiling_index = Vec::new();

        if config.compilation.logger.level != CompilationLogLevel::Disabled {
            registry.register(&config.compilation.logger, &mut compilation_index);
        }

        if config.profiling.logger.level != ProfilingLogLevel::Disabled {
            registry.register(&config.profiling.logger, &mut profiling_index);
        }

        Self {
            loggers: registry.loggers,
            compilation_index,
            profiling_index,
            config,
        }
    }

    /// Logs a message to every compilation sink.
    pub fn log_compilation<S: Display>(&mut self, msg: &S) {
        Self::log_all(&mut self.loggers, &self.compilation_index, msg);
    }

    /// Logs a message to every profiling sink.
    pub fn log_profiling<S: Display>(&mut self, msg: &S) {
        Self::log_all(&mut self.loggers, &self.profiling_index, msg);
    }

    /// The compilation log level.
    pub fn log_level_compilation(&self) -> CompilationLogLevel {
        self.config.compilation.logger.level
    }

    /// The profiling log level.
    pub fn log_level_profiling(&self) -> ProfilingLogLevel {
        self.config.profiling.logger.level
    }

    fn log_all<S: Display>(loggers: &mut [LoggerKind], indices: &[usize], msg: &S) {
        match indices {
            [] => {}
            [index] => loggers[*index].log(msg),
            indices => {
                let msg = msg.to_string();
                for index in indices {
                    loggers[*index].log(&msg);
                }
            }
        }
    }
}

#[derive(Default)]
struct Registry {
    loggers: Vec<LoggerKind>,
    ids: HashMap<LoggerId, usize>,
}

impl Registry {
    fn register<L: LogLevel>(&mut self, config: &LoggerConfig<L>, indices: &mut Vec<usize>) {
        if let Some(path) = &config.file {
            let append = config.append;
            self.insert(LoggerId::File(path.clone()), indices, || {
                FileLogger::new(path, append).map(LoggerKind::File)
            });
        }

        if config.stdout {
            self.insert(LoggerId::Stdout, indices, || Some(LoggerKind::Stdout));
        }

        if config.stderr {
            self.insert(LoggerId::Stderr, indices, || Some(LoggerKind::Stderr));
        }

        if let Some(level) = config.log {
            self.insert(LoggerId::LogCrate(level), indices, || {
                Some(LoggerKind::Log(level))
            });
        }
    }

    fn insert<F: FnOnce() -> Option<LoggerKind>>(
        &mut self,
        id: LoggerId,
        indices: &mut Vec<usize>,
        create: F,
    ) {
        if let Some(index) = self.ids.get(&id) {
            indices.push(*index);
            return;
        }

        if let Some(logger) = create() {
            let index = self.loggers.len();
            self.ids.insert(id, index);
            self.loggers.push(logger);
            indices.push(index);
        }
    }
}

#[derive(Debug)]
enum LoggerKind {
    File(FileLogger),
    Stdout,
    Stderr,
    Log(LogCrateLevel),
}

impl LoggerKind {
    fn log<S: Display>(&mut self, msg: &S) {
        match self {
            LoggerKind::File(file_logger) => file_logger.log(msg),
            LoggerKind::Stdout => println!("{msg}"),
            LoggerKind::Stderr => eprintln!("{msg}"),
            LoggerKind::Log(level) => match level {
                LogCrateLevel::Info => log::info!("{msg}"),
                LogCrateLevel::Debug => log::debug!("{msg}"),
                LogCrateLevel::Trace => log::trace!("{msg}"),
            },
        }
    }
}

#[derive(Debug)]
struct FileLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileLogger {
    fn new(path: &PathBuf, append: bool) -> Option<Self> {
        let file = OpenOptions::new()
            .write(true)
            .append(append)
            .truncate(!append)
            .create(true)
            .open(path);

        match file {
            Ok(file) => Some(Self {
                path: path.clone(),
                writer: BufWriter::new(file),
            }),
            Err(err) => {
                log::warn!("Can't open log file {}: {err}", path.display());
                None
            }
        }
    }

    fn log<S: Display>(&mut self, msg: &S) {
        let result = writeln!(self.writer, "{msg}").and_then(|_| self.writer.flush());

        if let Err(err) = result {
            log::warn!("Can't write to log file {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_sinks_are_opened_once() {
        let mut config = GlobalConfig::default();
        config.compilation.logger.level = CompilationLogLevel::Full;
        config.compilation.logger.log = Some(LogCrateLevel::Debug);
        config.profiling.logger.level = ProfilingLogLevel::Basic;
        config.profiling.logger.log = Some(LogCrateLevel::Debug);
        config.profiling.logger.stderr = true;

        let logger = Logger::from_config(Arc::new(config));

        assert_eq!(logger.loggers.len(), 2);
        assert_eq!(logger.compilation_index, vec![0]);
        assert_eq!(logger.profiling_index, vec![0, 1]);
    }

    #[test]
    fn disabled_channels_have_no_sinks() {
        let mut config = GlobalConfig::default();
        config.compilation.logger.stdout = true;

        let logger = Logger::from_config(Arc::new(config));

        assert!(logger.loggers.is_empty());
    }
}
