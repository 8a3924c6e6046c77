pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the settings file directly
pub const CONFIG_ENV_VAR: &str = "PROVFLOW_CONFIG";

const CANDIDATES: [&str; 4] = [
    "provflow.local.yaml",
    ".provflow.local.yaml",
    "provflow.yaml",
    ".provflow.yaml",
];

const LOG_LEVELS: [&str; 6] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR", "FATAL"];

/// Find the ProvFlow settings file
///
/// Search order:
/// 1. `PROVFLOW_CONFIG` (direct path; it is an error if it does not exist)
/// 2. Current directory: provflow.local.yaml, .provflow.local.yaml, provflow.yaml, .provflow.yaml
/// 3. Same names inside `./.provflow/`
/// 4. `<config dir>/provflow/provflow.yaml` (global settings)
///
/// Returns `None` when no file exists; built-in defaults apply then.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(config_path);
        if !path.is_file() {
            return Err(ConfigError::ConfigFileMissing(path));
        }
        return Ok(Some(path));
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_in_dir(&current_dir) {
        return Ok(Some(path));
    }

    let project_dir = current_dir.join(".provflow");
    if project_dir.is_dir()
        && let Some(path) = find_in_dir(&project_dir)
    {
        return Ok(Some(path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("provflow").join("provflow.yaml");
        if global_config.is_file() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Which provisioning back-end drives the attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local `terraform apply` per attempt
    #[default]
    Terraform,
    /// Managed apply job per attempt
    Job,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Terraform => write!(f, "terraform"),
            BackendKind::Job => write!(f, "job"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terraform" => Ok(BackendKind::Terraform),
            "job" => Ok(BackendKind::Job),
            other => Err(format!(
                "unknown backend '{}' (expected 'terraform' or 'job')",
                other
            )),
        }
    }
}

/// Complete ProvFlow settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub backend: BackendKind,
    pub retry: RetryConfig,
    pub terraform: TerraformConfig,
    pub job_api: JobApiConfig,
    pub connection: ConnectionConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Seconds between a retryable failure and the next attempt
    pub interval_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerraformConfig {
    pub binary: String,
    pub config_dir: PathBuf,
    /// Local state file, passed to `terraform init` as backend config
    pub state_path: Option<PathBuf>,
    /// Exported as `TF_VAR_<name>`
    pub variables: BTreeMap<String, String>,
    pub skip_validate: bool,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            config_dir: PathBuf::from("terraform"),
            state_path: None,
            variables: BTreeMap::new(),
            skip_validate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobApiConfig {
    pub endpoint: Option<String>,
    pub stack_id: Option<String>,
    /// OCI config file holding the API key; `~/.oci/config` when unset
    pub oci_config: Option<PathBuf>,
    /// Profile (section) of the OCI config file
    pub profile: String,
    pub poll_interval_secs: u64,
    pub log_level: String,
    pub display_name_prefix: String,
}

impl Default for JobApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            stack_id: None,
            oci_config: None,
            profile: "DEFAULT".to_string(),
            poll_interval_secs: 60,
            log_level: "INFO".to_string(),
            display_name_prefix: "provflow".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Output holding the instance's address
    pub address_output: String,
    pub ssh_user: String,
    pub ssh_key: Option<PathBuf>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address_output: "public_ip".to_string(),
            ssh_user: "opc".to_string(),
            ssh_key: None,
        }
    }
}

/// Extra markers appended to the built-in classifier signatures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub capacity_markers: Vec<String>,
    pub fatal_markers: Vec<String>,
}

impl Settings {
    /// Load settings from `path`, or from the discovered file
    ///
    /// Also returns the file the settings came from, if any.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match path {
            Some(p) if !p.is_file() => return Err(ConfigError::ConfigFileMissing(p.to_path_buf())),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file()?,
        };

        match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                let settings = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;
                Ok((settings, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Check settings that cannot be expressed in the file format
    pub fn validate(&self) -> Result<()> {
        if self.retry.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retry.interval_secs must be greater than zero".into(),
            ));
        }

        if self.backend == BackendKind::Job {
            let job = &self.job_api;
            if job.endpoint.as_deref().is_none_or(|e| e.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "job_api.endpoint is required for the job backend".into(),
                ));
            }
            if job.stack_id.as_deref().is_none_or(|s| s.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "job_api.stack_id is required for the job backend".into(),
                ));
            }
            if job.poll_interval_secs == 0 {
                return Err(ConfigError::Invalid(
                    "job_api.poll_interval_secs must be greater than zero".into(),
                ));
            }
            if !LOG_LEVELS.contains(&job.log_level.to_ascii_uppercase().as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "job_api.log_level '{}' is not one of {}",
                    job.log_level,
                    LOG_LEVELS.join(", ")
                )));
            }
        }

        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry.interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.job_api.poll_interval_secs)
    }
}
