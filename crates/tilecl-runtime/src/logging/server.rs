use core::fmt::Display;
use std::sync::Arc;

use crate::config::{
    GlobalConfig, Logger, compilation::CompilationLogLevel, profiling::ProfilingLogLevel,
};

use super::{ProfileLevel, Profiled};

/// Logger owned by a compute server: compilation output and kernel profiling.
#[derive(Debug, Default)]
pub struct ServerLogger {
    kind: DebugLoggerKind,
    profiled: Profiled,
}

#[derive(Debug)]
enum ServerLoggerOptions {
    CompilationOnly,
    ProfileOnly(ProfileLevel),
    All(ProfileLevel),
}

#[derive(Debug)]
enum DebugLoggerKind {
    Activated(Logger, ServerLoggerOptions),
    None,
}

impl Default for DebugLoggerKind {
    fn default() -> Self {
        Self::from_logger(Logger::new())
    }
}

impl ServerLogger {
    /// Create a server logger from an explicit configuration.
    pub fn from_config(config: Arc<GlobalConfig>) -> Self {
        Self {
            kind: DebugLoggerKind::from_logger(Logger::from_config(config)),
            profiled: Profiled::default(),
        }
    }

    /// Returns the profile level, none if profiling is deactivated.
    pub fn profile_level(&self) -> Option<ProfileLevel> {
        match &self.kind {
            DebugLoggerKind::Activated(_, option) => match option {
                ServerLoggerOptions::CompilationOnly => None,
                ServerLoggerOptions::ProfileOnly(level) | ServerLoggerOptions::All(level) => {
                    Some(*level)
                }
            },
            DebugLoggerKind::None => None,
        }
    }

    /// Returns true if compilation info should be logged.
    pub fn compilation_activated(&self) -> bool {
        matches!(
            &self.kind,
            DebugLoggerKind::Activated(
                _,
                ServerLoggerOptions::CompilationOnly | ServerLoggerOptions::All(_)
            )
        )
    }

    /// Register one kernel execution.
    ///
    /// `detail` is only evaluated at the full profile level.
    pub fn register_profiled<Name, D>(&mut self, name: Name, duration: core::time::Duration, detail: D)
    where
        Name: Display,
        D: FnOnce() -> String,
    {
        let Some(level) = self.profile_level() else {
            return;
        };

        let name = name.to_string();
        self.profiled.update(&name, duration);

        if let DebugLoggerKind::Activated(logger, _) = &mut self.kind {
            match level {
                ProfileLevel::Basic => {}
                ProfileLevel::Medium => {
                    logger.log_profiling(&format!("| {duration:<10?} | {name}"));
                }
                ProfileLevel::Full => {
                    let detail = detail();
                    logger.log_profiling(&format!("| {duration:<10?} | {name} | {detail}"));
                }
            }
        }
    }

    /// Log the argument when the compilation logger is activated.
    pub fn log_compilation<I>(&mut self, arg: I) -> I
    where
        I: Display,
    {
        if let DebugLoggerKind::Activated(
            logger,
            ServerLoggerOptions::CompilationOnly | ServerLoggerOptions::All(_),
        ) = &mut self.kind
        {
            logger.log_compilation(&arg);
        }

        arg
    }

    /// Log the profiling summary if activated and reset it.
    pub fn profile_summary(&mut self) {
        if self.profile_level().is_none() {
            return;
        }

        let profiled = core::mem::take(&mut self.profiled);

        if profiled.is_empty() {
            return;
        }

        if let DebugLoggerKind::Activated(logger, _) = &mut self.kind {
            logger.log_profiling(&profiled);
        }
    }
}

impl DebugLoggerKind {
    fn from_logger(logger: Logger) -> Self {
        let profile = match logger.log_level_profiling() {
            ProfilingLogLevel::Disabled => None,
            ProfilingLogLevel::Basic => Some(ProfileLevel::Basic),
            ProfilingLogLevel::Medium => Some(ProfileLevel::Medium),
            ProfilingLogLevel::Full => Some(ProfileLevel::Full),
        };
        let compilation = logger.log_level_compilation() == CompilationLogLevel::Full;

        let option = match (profile, compilation) {
            (Some(level), true) => ServerLoggerOptions::All(level),
            (Some(level), false) => ServerLoggerOptions::ProfileOnly(level),
            (None, true) => ServerLoggerOptions::CompilationOnly,
            (None, false) => return Self::None,
        };

        Self::Activated(logger, option)
    }
}
