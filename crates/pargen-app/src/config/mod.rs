//! Configuration loading and defaults.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE: &str = "config/settings";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("unable to resolve project directories")]
    MissingProjectDirs,
    #[error(transparent)]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub generator: GeneratorConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Secret used to sign time-limited download links. When unset, a random
    /// per-process secret is derived, which invalidates links on restart.
    pub url_signing_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    pub api_base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    /// Maximum number of retries for transient generation failures.
    pub max_retries: usize,
    pub min_retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
}

pub fn load() -> Result<AppConfig, AppConfigError> {
    let default_storage = default_storage_path()?;
    let builder = Config::builder()
        .set_default("server.listen_addr", "127.0.0.1:8080")?
        .set_default("server.url_signing_secret", None::<String>)?
        .set_default(
            "storage.path",
            default_storage.to_string_lossy().to_string(),
        )?
        .set_default("generator.api_base_url", "https://api.openai.com/v1")?
        .set_default("generator.model", "gpt-4o-mini")?
        .set_default("generator.request_timeout_secs", 120_u64)?
        .set_default("generator.max_retries", 3_u64)?
        .set_default("generator.min_retry_delay_ms", 500_u64)?
        .set_default("worker.poll_interval_ms", 1_000_u64)?
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(Environment::with_prefix("PARGEN").separator("__"));

    let cfg = builder.build()?.try_deserialize()?;
    Ok(cfg)
}

pub fn project_dirs() -> Result<ProjectDirs, AppConfigError> {
    ProjectDirs::from("dev", "pargen", "pargen").ok_or(AppConfigError::MissingProjectDirs)
}

fn default_storage_path() -> Result<PathBuf, AppConfigError> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let cfg = load().expect("load default config");
        assert!(!cfg.server.listen_addr.is_empty());
        assert_eq!(cfg.generator.model, "gpt-4o-mini");
        assert!(cfg.generator.request_timeout_secs > 0);
        assert!(cfg.worker.poll_interval_ms > 0);
    }
}
