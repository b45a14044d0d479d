use crate::domain::LogLevel;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Path for {0} cannot be empty")]
    EmptyPath(&'static str),
}

/// Deployment mode. Only `production` runs without a console destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn attaches_console(self) -> bool {
        self != Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!(
                "unknown environment '{other}' (expected development|production|test)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub error_file: PathBuf,
    pub combined_file: PathBuf,
    pub exceptions_file: PathBuf,
    pub rejections_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::in_dir(Path::new(DEFAULT_LOG_DIR))
    }
}

impl Settings {
    /// Default level and environment with every sink under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            log_level: LogLevel::Info,
            environment: Environment::Development,
            error_file: dir.join("error.log"),
            combined_file: dir.join("combined.log"),
            exceptions_file: dir.join("exceptions.log"),
            rejections_file: dir.join("rejections.log"),
        }
    }

    /// Reads settings through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dir = lookup("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
        validate_path("LOG_DIR", Path::new(&dir))?;
        let mut settings = Settings::in_dir(Path::new(&dir));

        if let Some(level) = lookup("LOG_LEVEL") {
            settings.log_level = level.parse().map_err(|e: crate::domain::UnknownLevel| {
                ConfigError::InvalidValue {
                    name: "LOG_LEVEL",
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(mode) = lookup("APP_ENV") {
            settings.environment = mode
                .parse()
                .map_err(|reason| ConfigError::InvalidValue {
                    name: "APP_ENV",
                    reason,
                })?;
        }

        let overrides = [
            ("LOG_ERROR_FILE", &mut settings.error_file),
            ("LOG_COMBINED_FILE", &mut settings.combined_file),
            ("LOG_EXCEPTIONS_FILE", &mut settings.exceptions_file),
            ("LOG_REJECTIONS_FILE", &mut settings.rejections_file),
        ];
        for (name, slot) in overrides {
            if let Some(path) = lookup(name) {
                *slot = PathBuf::from(path);
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_path("LOG_ERROR_FILE", &self.error_file)?;
        validate_path("LOG_COMBINED_FILE", &self.combined_file)?;
        validate_path("LOG_EXCEPTIONS_FILE", &self.exceptions_file)?;
        validate_path("LOG_REJECTIONS_FILE", &self.rejections_file)?;
        Ok(())
    }
}

/// Validates that a sink path is not empty or whitespace-only.
fn validate_path(name: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(ConfigError::EmptyPath(name));
    }
    Ok(())
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    Settings::from_lookup(|name| env::var(name).ok())
}
