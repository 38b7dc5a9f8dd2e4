use super::{
    compilation::{CompilationConfig, CompilationLogLevel},
    cpu::CpuConfig,
    dispatch::DispatchConfig,
    profiling::{ProfilingConfig, ProfilingLogLevel},
    verify::VerifyConfig,
};
use std::{path::Path, sync::Arc};

/// Static mutex holding the global configuration, initialized as `None`.
static TILECL_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

/// File names searched for, in order, in the current directory and its parents.
const CONFIG_FILES: [&str; 2] = ["tilecl.toml", "TileCL.toml"];

/// The global configuration of tilecl.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Kernel profiling.
    #[serde(default)]
    pub profiling: ProfilingConfig,

    /// Program compilation logging.
    #[serde(default)]
    pub compilation: CompilationConfig,

    /// Kernel dispatch.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Result verification.
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Host-emulated device.
    #[serde(default)]
    pub cpu: CpuConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it on first use.
    ///
    /// The configuration is read from `tilecl.toml` or `TileCL.toml` in the current directory or
    /// one of its parents, then environment overrides are applied. When no file is found the
    /// defaults are used.
    ///
    /// Calling this takes a global lock; read the values you need once instead of calling it on
    /// hot paths.
    pub fn get() -> Arc<Self> {
        let mut state = TILECL_GLOBAL_CONFIG.lock();

        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                let config = Arc::new(Self::from_current_dir().override_from_env());
                *state = Some(config.clone());
                config
            }
        }
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    ///
    /// Panics if the configuration has already been set or read. Call it at the start of the
    /// program, before any context is created.
    pub fn set(config: Self) {
        let mut state = TILECL_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Save the current configuration to the provided file path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overrides configuration fields based on environment variables.
    ///
    /// - `TILECL_DEBUG_LOG`: enables compilation and profiling logs, written to `stdout`,
    ///   `stderr`, a file path, or `/tmp/tilecl.log` for `1`/`true`. `0`/`false` disables them.
    /// - `TILECL_DEBUG_OPTION`: `debug`, `debug-full`, `profile`, `profile-medium` or
    ///   `profile-full`.
    /// - `TILECL_CPU_WORKERS`: worker threads of the host device.
    pub fn override_from_env(self) -> Self {
        self.override_with(|key| std::env::var(key).ok())
    }

    fn override_with<F: Fn(&str) -> Option<String>>(mut self, var: F) -> Self {
        if let Some(val) = var("TILECL_DEBUG_LOG") {
            self.compilation.logger.level = CompilationLogLevel::Full;
            self.profiling.logger.level = ProfilingLogLevel::Medium;

            match val.as_str() {
                "stdout" => {
                    self.compilation.logger.stdout = true;
                    self.profiling.logger.stdout = true;
                }
                "stderr" => {
                    self.compilation.logger.stderr = true;
                    self.profiling.logger.stderr = true;
                }
                "1" | "true" => {
                    let file_path = "/tmp/tilecl.log";
                    self.compilation.logger.file = Some(file_path.into());
                    self.profiling.logger.file = Some(file_path.into());
                }
                "0" | "false" => {
                    self.compilation.logger.level = CompilationLogLevel::Disabled;
                    self.profiling.logger.level = ProfilingLogLevel::Disabled;
                }
                file_path => {
                    self.compilation.logger.file = Some(file_path.into());
                    self.profiling.logger.file = Some(file_path.into());
                }
            }
        }

        if let Some(val) = var("TILECL_DEBUG_OPTION") {
            match val.as_str() {
                "debug" => {
                    self.compilation.logger.level = CompilationLogLevel::Full;
                    self.profiling.logger.level = ProfilingLogLevel::Medium;
                }
                "debug-full" => {
                    self.compilation.logger.level = CompilationLogLevel::Full;
                    self.profiling.logger.level = ProfilingLogLevel::Full;
                }
                "profile" => self.profiling.logger.level = ProfilingLogLevel::Basic,
                "profile-medium" => self.profiling.logger.level = ProfilingLogLevel::Medium,
                "profile-full" => self.profiling.logger.level = ProfilingLogLevel::Full,
                other => log::warn!("Unknown TILECL_DEBUG_OPTION '{other}', ignored"),
            }
        }

        if let Some(val) = var("TILECL_CPU_WORKERS") {
            match val.parse::<usize>() {
                Ok(workers) if workers > 0 => self.cpu.workers = Some(workers),
                _ => log::warn!("Invalid TILECL_CPU_WORKERS '{val}', ignored"),
            }
        }

        self
    }

    // Traverses up the directory tree until a configuration file is found or the root is
    // reached.
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            for name in CONFIG_FILES {
                let path = dir.join(name);
                if !path.is_file() {
                    continue;
                }

                match Self::from_file_path(&path) {
                    Ok(config) => {
                        log::debug!("Loaded configuration from {}", path.display());
                        return config;
                    }
                    Err(err) => log::warn!("Ignoring {}: {err}", path.display()),
                }
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    fn from_file_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}
