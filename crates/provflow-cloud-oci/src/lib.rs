//! OCI Resource Manager back-end for ProvFlow
//!
//! This crate implements the ProvisioningBackend trait on top of the
//! Resource Manager job API. Each attempt submits a fresh apply job for a
//! stack and watches it until it reaches a terminal state.
//!
//! # Requirements
//!
//! - An existing Resource Manager stack (its OCID)
//! - The regional endpoint, e.g. `https://resourcemanager.uk-london-1.oraclecloud.com`
//! - An OCI config profile with an API key (`~/.oci/config`, `[DEFAULT]`),
//!   used to sign every request
//!
//! # Example
//!
//! ```ignore
//! use provflow_cloud::RetryController;
//! use provflow_cloud_oci::{
//!     ApiConfig, JobMonitorBackend, JobMonitorConfig, OciProfile, ResourceManagerClient,
//! };
//!
//! let profile = OciProfile::from_file(&OciProfile::default_path(), "DEFAULT")?;
//! let api = ApiConfig::new(endpoint).with_profile(&profile)?;
//! let client = ResourceManagerClient::new(api)?;
//! let backend = JobMonitorBackend::new(client, JobMonitorConfig::new(stack_id));
//! let outcome = RetryController::new(backend).run().await;
//! ```

pub mod client;
pub mod error;
pub mod job;
pub mod provider;
pub mod signer;

pub use client::{ApiConfig, ResourceManagerClient};
pub use error::{OciError, Result};
pub use job::{FailureDetails, JobOutput, JobState, LogEntry, LogLevel, ProvisioningJob};
pub use provider::{JobMonitorBackend, JobMonitorConfig};
pub use signer::{DEFAULT_PROFILE, OciProfile, RequestSigner};
