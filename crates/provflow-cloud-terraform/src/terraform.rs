//! terraform CLI wrapper
//!
//! Wraps the terraform commands needed to apply a fixed configuration
//! directory.

use crate::error::{Result, TerraformError};
use provflow_cloud::Outputs;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Placeholder shown instead of sensitive output values
pub const SENSITIVE_PLACEHOLDER: &str = "<sensitive>";

/// terraform CLI wrapper
#[derive(Debug, Clone)]
pub struct Terraform {
    binary: String,
    working_dir: PathBuf,
    variables: BTreeMap<String, String>,
}

/// Result of a command whose output is captured as one stream
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout and stderr lines in arrival order
    pub combined: String,
}

impl Terraform {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "terraform".to_string(),
            working_dir: working_dir.into(),
            variables: BTreeMap::new(),
        }
    }

    /// Use a specific terraform executable
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Variables passed to every command as `TF_VAR_<name>`
    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Whether `terraform init` has already run in the working directory
    pub fn is_initialized(&self) -> bool {
        self.working_dir.join(".terraform").is_dir()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.current_dir(&self.working_dir);
        cmd.env("TF_IN_AUTOMATION", "1");
        for (name, value) in &self.variables {
            cmd.env(format!("TF_VAR_{}", name), value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Own process group, so a terminal Ctrl-C never reaches a running apply
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> TerraformError {
        if err.kind() == std::io::ErrorKind::NotFound {
            if !self.working_dir.is_dir() {
                return TerraformError::ConfigDirNotFound(self.working_dir.display().to_string());
            }
            return TerraformError::TerraformNotFound(self.binary.clone());
        }
        TerraformError::IoError(err)
    }

    /// Run a terraform command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("Running: {} {}", self.binary, args.join(" "));

        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(TerraformError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                output: detail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command, merging stdout and stderr line by line as they arrive
    async fn run_streaming(&self, args: &[&str]) -> Result<CommandOutput> {
        tracing::debug!("Running: {} {}", self.binary, args.join(" "));

        let mut child = self.command(args).spawn().map_err(|e| self.spawn_error(e))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut combined = String::new();
        while let Some(line) = rx.recv().await {
            tracing::debug!(target: "provflow::terraform", "{}", line);
            combined.push_str(&line);
            combined.push('\n');
        }

        let status = child.wait().await?;
        Ok(CommandOutput {
            success: status.success(),
            exit_code: status.code(),
            combined,
        })
    }

    /// `terraform version`, also used to check the binary is installed
    pub async fn version(&self) -> Result<String> {
        let output = self.run_command(&["version"]).await?;
        output
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| TerraformError::InvalidOutput("empty version output".to_string()))
    }

    /// `terraform init`, optionally pointing the local backend at a state file
    pub async fn init(&self, state_path: Option<&Path>) -> Result<()> {
        let backend_config = state_path.map(|p| format!("-backend-config=path={}", p.display()));

        let mut args = vec!["init", "-input=false", "-no-color"];
        if let Some(ref config) = backend_config {
            args.push(config.as_str());
        }

        self.run_command(&args).await?;
        Ok(())
    }

    /// `terraform validate`
    pub async fn validate(&self) -> Result<()> {
        self.run_command(&["validate", "-no-color"]).await?;
        Ok(())
    }

    /// `terraform apply -auto-approve`, capturing all output
    pub async fn apply(&self) -> Result<CommandOutput> {
        self.run_streaming(&["apply", "-auto-approve", "-input=false", "-json"])
            .await
    }

    /// `terraform output -json` as an outputs map
    pub async fn outputs(&self) -> Result<Outputs> {
        let output = self.run_command(&["output", "-json"]).await?;
        parse_outputs(&output)
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
        }
    }
}

/// One entry of `terraform output -json`
#[derive(Debug, Deserialize)]
struct OutputEntry {
    #[serde(default)]
    sensitive: bool,
    value: serde_json::Value,
}

/// Parse `terraform output -json`, masking sensitive values
pub fn parse_outputs(json: &str) -> Result<Outputs> {
    if json.trim().is_empty() {
        return Ok(Outputs::new());
    }

    let entries: HashMap<String, OutputEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|(name, entry)| {
            let value = if entry.sensitive {
                serde_json::Value::String(SENSITIVE_PLACEHOLDER.to_string())
            } else {
                entry.value
            };
            (name, value)
        })
        .collect())
}
