//! Terraform back-end implementation

use crate::terraform::Terraform;
use async_trait::async_trait;
use provflow_cloud::{ProvisioningBackend, RawAttempt};
use std::path::PathBuf;

/// Apply executor: one `terraform apply` per attempt
pub struct TerraformBackend {
    terraform: Terraform,
    state_path: Option<PathBuf>,
    skip_validate: bool,
}

impl TerraformBackend {
    pub fn new(terraform: Terraform) -> Self {
        Self {
            terraform,
            state_path: None,
            skip_validate: false,
        }
    }

    /// Keep state in this file (passed to `terraform init` as backend config)
    pub fn with_state_path(mut self, state_path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(state_path.into());
        self
    }

    pub fn skip_validate(mut self, skip: bool) -> Self {
        self.skip_validate = skip;
        self
    }

    pub fn terraform(&self) -> &Terraform {
        &self.terraform
    }
}

#[async_trait]
impl ProvisioningBackend for TerraformBackend {
    fn name(&self) -> &str {
        "terraform"
    }

    async fn prepare(&self) -> provflow_cloud::Result<()> {
        let version = self.terraform.version().await?;
        tracing::info!("Using {}", version);

        if let Some(parent) = self.state_path.as_ref().and_then(|p| p.parent()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if self.terraform.is_initialized() {
            tracing::info!("terraform already initialized, skipping init");
        } else {
            tracing::info!(
                "Initializing terraform in {}",
                self.terraform.working_dir().display()
            );
            self.terraform.init(self.state_path.as_deref()).await?;
        }

        if !self.skip_validate {
            self.terraform.validate().await?;
            tracing::info!("terraform configuration is valid");
        }

        Ok(())
    }

    async fn apply(&self) -> provflow_cloud::Result<RawAttempt> {
        let output = self.terraform.apply().await?;

        if output.success {
            let outputs = match self.terraform.outputs().await {
                Ok(outputs) => outputs,
                Err(e) => {
                    tracing::warn!("Could not read terraform outputs: {}", e);
                    Default::default()
                }
            };
            return Ok(RawAttempt::success(output.combined, outputs));
        }

        let code = output
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        tracing::debug!("terraform apply exited with {}", code);

        let mut raw_output = output.combined;
        raw_output.push_str(&format!("terraform apply exited with status {}\n", code));
        Ok(RawAttempt::failure(raw_output))
    }
}
