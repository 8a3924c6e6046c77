//! Back-end selection from settings

use anyhow::Context;
use provflow_cloud::{ConnectionSettings, ErrorClassifier, ProvisioningBackend};
use provflow_cloud_oci::{
    ApiConfig, JobMonitorBackend, JobMonitorConfig, LogLevel, OciProfile, ResourceManagerClient,
};
use provflow_cloud_terraform::{Terraform, TerraformBackend};
use provflow_config::{BackendKind, Settings};

/// Build the configured back-end
pub fn build(settings: &Settings) -> anyhow::Result<Box<dyn ProvisioningBackend>> {
    match settings.backend {
        BackendKind::Terraform => {
            let tf = &settings.terraform;
            let terraform = Terraform::new(&tf.config_dir)
                .with_binary(&tf.binary)
                .with_variables(tf.variables.clone());

            let mut backend = TerraformBackend::new(terraform).skip_validate(tf.skip_validate);
            if let Some(ref state_path) = tf.state_path {
                backend = backend.with_state_path(state_path);
            }
            Ok(Box::new(backend))
        }
        BackendKind::Job => {
            let job = &settings.job_api;
            // validate() has already rejected missing values
            let endpoint = job.endpoint.clone().unwrap_or_default();
            let stack_id = job.stack_id.clone().unwrap_or_default();

            let oci_config = job
                .oci_config
                .clone()
                .unwrap_or_else(OciProfile::default_path);
            let profile = OciProfile::from_file(&oci_config, &job.profile)?;
            tracing::debug!(
                "Signing job API requests as {} from {}",
                profile.key_id(),
                oci_config.display()
            );
            let api = ApiConfig::new(endpoint)
                .with_profile(&profile)
                .with_context(|| format!("loading the API key of profile [{}]", job.profile))?;
            let client = ResourceManagerClient::new(api)?;

            let log_level = job
                .log_level
                .parse::<LogLevel>()
                .map_err(|e| anyhow::anyhow!(e))?;
            let config = JobMonitorConfig::new(stack_id)
                .with_poll_interval(settings.poll_interval())
                .with_log_level(log_level)
                .with_display_name_prefix(&job.display_name_prefix);

            Ok(Box::new(JobMonitorBackend::new(client, config)))
        }
    }
}

/// Built-in signatures plus configured markers
pub fn classifier(settings: &Settings) -> ErrorClassifier {
    ErrorClassifier::new()
        .with_capacity_markers(&settings.classifier.capacity_markers)
        .with_fatal_markers(&settings.classifier.fatal_markers)
}

pub fn connection_settings(settings: &Settings) -> ConnectionSettings {
    ConnectionSettings {
        address_output: settings.connection.address_output.clone(),
        ssh_user: settings.connection.ssh_user.clone(),
        ssh_key: settings.connection.ssh_key.clone(),
    }
}
