//! Daemon settings
//!
//! Layered with the `config` crate: serde defaults, then an optional TOML
//! file, then `ENROLLMENT_*` environment variables (`__` separates nested
//! keys, e.g. `ENROLLMENT_ENGINE__WORKER_COUNT=8`).

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use enrollment_core::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "ENROLLMENT";
/// Overrides the config file location
const CONFIG_PATH_ENV: &str = "ENROLLMENT_CONFIG";
const FALLBACK_DB_PATH: &str = "~/.enrollment/enrollment.db";
const DB_FILE_NAME: &str = "enrollment.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: LogFormat,
    /// Daily rolling log files are written here when set
    pub log_dir: Option<String>,
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 9630,
            log_format: LogFormat::Pretty,
            log_dir: None,
            engine: EngineConfig::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "enrollment-engine")
}

fn default_database_path() -> String {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(DB_FILE_NAME).to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_DB_PATH.to_string())
}

/// Config file used when none is given explicitly (may not exist)
fn default_config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn config_path_arg(mut args: impl Iterator<Item = String>) -> Option<PathBuf> {
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

impl Settings {
    /// Load settings; `--config <file>` wins over `ENROLLMENT_CONFIG`
    pub fn load() -> Result<Self> {
        let explicit = config_path_arg(std::env::args().skip(1))
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        Self::load_from(explicit.as_deref(), true)
    }

    /// Load settings with an optional explicit config file
    ///
    /// An explicit file must exist; the default one is optional.
    pub fn load_from(config_file: Option<&Path>, read_env: bool) -> Result<Self> {
        let mut builder = Config::builder();

        match config_file {
            Some(path) => {
                builder = builder.add_source(
                    File::from(path)
                        .format(FileFormat::Toml)
                        .required(true),
                );
            }
            None => {
                if let Some(path) = default_config_file() {
                    builder = builder.add_source(
                        File::from(path)
                            .format(FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        if read_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings
            .engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(settings)
    }

    /// Database path with `~` and env vars expanded
    pub fn database_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.database_path)
            .with_context(|| format!("Cannot expand database path '{}'", self.database_path))?;
        Ok(PathBuf::from(expanded.into_owned()))
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn write_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("enrollment-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.rpc_port, 9630);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.database_path.ends_with(DB_FILE_NAME));
        assert_eq!(settings.engine, EngineConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_config(
            r#"
            rpc_port = 9999
            log_format = "json"
            database_path = "~/data/enroll.db"

            [engine]
            worker_count = 8
            max_credits_per_term = 21
            "#,
        );

        let settings = assert_ok!(Settings::load_from(Some(&path), false));
        assert_eq!(settings.rpc_port, 9999);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.engine.worker_count, 8);
        assert_eq!(settings.engine.max_credits_per_term, 21);
        // Untouched engine keys keep their defaults
        assert_eq!(settings.engine.max_attempts, 3);
        assert!(!settings
            .database_path()
            .unwrap()
            .to_string_lossy()
            .starts_with('~'));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_invalid_engine_config_is_rejected() {
        let path = write_config("[engine]\nworker_count = 0\n");
        let err = assert_err!(Settings::load_from(Some(&path), false));
        assert!(format!("{:#}", err).contains("worker_count"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_zero_loop_interval_is_rejected() {
        let path = write_config("[engine]\nstall_check_interval_ms = 0\n");
        let err = assert_err!(Settings::load_from(Some(&path), false));
        assert!(format!("{:#}", err).contains("stall_check_interval_ms"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_config_flag_parsing() {
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter();
        assert_eq!(
            config_path_arg(args(&["--config", "a.toml"])),
            Some(PathBuf::from("a.toml"))
        );
        assert_eq!(
            config_path_arg(args(&["--config=b.toml"])),
            Some(PathBuf::from("b.toml"))
        );
        assert_eq!(config_path_arg(args(&["--verbose"])), None);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("enrollment-does-not-exist.toml");
        assert_err!(Settings::load_from(Some(&path), false));
    }
}
