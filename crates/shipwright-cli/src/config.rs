//! Daemon configuration.
//!
//! Layered from built-in defaults, an optional YAML file and `SHIPWRIGHT_*`
//! environment variables, in that order.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use shipwright_api::allowlist::{DEFAULT_METADATA_URL, DEFAULT_RANGE};
use shipwright_orchestrator::OrchestratorConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the hook server listens on.
    pub bind: String,
    /// Daemon address used by client commands such as `deploy`.
    pub server_url: String,
    /// Directory holding one subdirectory per target.
    pub targets_root: PathBuf,
    /// Trusted CIDR ranges used until the metadata refresh succeeds.
    pub allow_list: Vec<String>,
    /// Metadata document with hook ranges. Empty disables the refresh.
    pub metadata_url: String,
    pub metadata_timeout_seconds: u64,
    pub trust_forwarded_for: bool,
    /// Zero disables the timeout.
    pub pull_timeout_seconds: u64,
    /// Zero disables the timeout.
    pub run_timeout_seconds: u64,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:7777".to_string(),
            server_url: "http://127.0.0.1:7777".to_string(),
            targets_root: PathBuf::from("./targets"),
            allow_list: vec![DEFAULT_RANGE.to_string()],
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            metadata_timeout_seconds: 10,
            trust_forwarded_for: false,
            pull_timeout_seconds: 300,
            run_timeout_seconds: 1800,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Load configuration. Without `path`, `shipwright.yaml` in the working
    /// directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("shipwright").required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("SHIPWRIGHT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allow_list"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            pull_timeout: seconds(self.pull_timeout_seconds),
            run_timeout: seconds(self.run_timeout_seconds),
            ..Default::default()
        }
    }
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}
