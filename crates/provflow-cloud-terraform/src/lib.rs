//! Terraform back-end for ProvFlow
//!
//! This crate implements the ProvisioningBackend trait by running
//! `terraform apply` against a fixed configuration directory, once per
//! attempt.
//!
//! # Requirements
//!
//! - `terraform` CLI must be installed (or configured with an explicit path)
//! - Provider credentials are passed through the environment, either
//!   directly or as `TF_VAR_*` variables
//!
//! # Example
//!
//! ```ignore
//! use provflow_cloud::RetryController;
//! use provflow_cloud_terraform::{Terraform, TerraformBackend};
//!
//! let backend = TerraformBackend::new(Terraform::new("terraform"));
//! let mut controller = RetryController::new(backend);
//! controller.prepare().await?;
//! let outcome = controller.run().await;
//! ```

pub mod error;
pub mod provider;
pub mod terraform;

pub use error::{Result, TerraformError};
pub use provider::TerraformBackend;
pub use terraform::{CommandOutput, Terraform, parse_outputs};
