//! Resource Manager back-end implementation

use crate::client::ResourceManagerClient;
use crate::error::OciError;
use crate::job::{JobOutput, JobState, LogLevel, ProvisioningJob};
use async_trait::async_trait;
use provflow_cloud::{Outputs, ProvisioningBackend, RawAttempt};
use std::time::Duration;

/// Placeholder shown instead of sensitive output values
pub const SENSITIVE_PLACEHOLDER: &str = "<sensitive>";

/// Settings for one monitored stack
#[derive(Debug, Clone)]
pub struct JobMonitorConfig {
    pub stack_id: String,
    /// Wait between two status reads of a running job
    pub poll_interval: Duration,
    /// Minimum level of the log entries fetched after a failed job
    pub log_level: LogLevel,
    /// Job display names are `<prefix>-<UTC timestamp>`
    pub display_name_prefix: String,
}

impl JobMonitorConfig {
    pub fn new(stack_id: impl Into<String>) -> Self {
        Self {
            stack_id: stack_id.into(),
            poll_interval: Duration::from_secs(60),
            log_level: LogLevel::Info,
            display_name_prefix: "provflow".to_string(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_display_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.display_name_prefix = prefix.into();
        self
    }
}

/// Job monitor: one apply job per attempt, watched until it ends
pub struct JobMonitorBackend {
    client: ResourceManagerClient,
    config: JobMonitorConfig,
}

impl JobMonitorBackend {
    pub fn new(client: ResourceManagerClient, config: JobMonitorConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &JobMonitorConfig {
        &self.config
    }

    fn display_name(&self) -> String {
        format!(
            "{}-{}",
            self.config.display_name_prefix,
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        )
    }

    /// Poll until the job reaches a terminal state
    ///
    /// Transient read errors never end the watch: the job keeps running on
    /// the provider side and abandoning it could provision twice.
    async fn wait_for_job(&self, job_id: &str) -> Result<ProvisioningJob, OciError> {
        let mut last_state = None;
        loop {
            tokio::time::sleep(self.config.poll_interval).await;

            match self.client.get_job(job_id).await {
                Ok(job) if job.state.is_terminal() => return Ok(job),
                Ok(job) => {
                    if last_state != Some(job.state) {
                        tracing::info!(job_id, "job is {}", job.state);
                        last_state = Some(job.state);
                    }
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(job_id, "could not read job status, still waiting: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Failure details first, then the diagnostic log lines
    async fn failure_output(&self, job: &ProvisioningJob) -> String {
        let mut lines = Vec::new();

        if let Some(summary) = job.failure_details.as_ref().and_then(|d| d.summary()) {
            lines.push(summary);
        }

        match self.client.get_job_logs(&job.id, self.config.log_level).await {
            Ok(entries) => lines.extend(
                entries
                    .into_iter()
                    .filter(|e| e.is_diagnostic())
                    .map(|e| e.message),
            ),
            Err(e) => tracing::warn!(job_id = %job.id, "could not read job logs: {}", e),
        }

        if lines.is_empty() {
            return format!("job {} ended in state {}", job.id, job.state);
        }
        lines.join("\n")
    }

    async fn job_outputs(&self, job_id: &str) -> Outputs {
        match self.client.list_job_outputs(job_id).await {
            Ok(outputs) => collect_outputs(outputs),
            Err(e) => {
                tracing::warn!(job_id, "could not read job outputs: {}", e);
                Outputs::new()
            }
        }
    }
}

fn collect_outputs(outputs: Vec<JobOutput>) -> Outputs {
    outputs
        .into_iter()
        .map(|o| {
            let value = if o.is_sensitive {
                serde_json::Value::String(SENSITIVE_PLACEHOLDER.to_string())
            } else {
                o.output_value.unwrap_or(serde_json::Value::Null)
            };
            (o.output_name, value)
        })
        .collect()
}

#[async_trait]
impl ProvisioningBackend for JobMonitorBackend {
    fn name(&self) -> &str {
        "resource-manager"
    }

    async fn apply(&self) -> provflow_cloud::Result<RawAttempt> {
        let display_name = self.display_name();

        let job = match self
            .client
            .create_apply_job(&self.config.stack_id, &display_name)
            .await
        {
            Ok(job) => job,
            // Rejections carry the provider's code, which is what gets classified
            Err(e @ OciError::Api { .. }) => return Ok(RawAttempt::failure(e.to_string())),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(job_id = %job.id, "submitted apply job {}", display_name);

        let job = match self.wait_for_job(&job.id).await {
            Ok(job) => job,
            Err(e) => return Ok(RawAttempt::failure(e.to_string())),
        };

        match job.state {
            JobState::Succeeded => {
                let outputs = self.job_outputs(&job.id).await;
                Ok(RawAttempt::success(
                    format!("job {} succeeded", job.id),
                    outputs,
                ))
            }
            _ => Ok(RawAttempt::failure(self.failure_output(&job).await)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiConfig;
    use provflow_cloud::{ErrorKind, classify};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JOB: &str = "ocid1.ormjob.test";

    fn backend(server: &MockServer) -> JobMonitorBackend {
        let client = ResourceManagerClient::new(ApiConfig::new(server.uri())).unwrap();
        let config = JobMonitorConfig::new("ocid1.ormstack.test")
            .with_poll_interval(Duration::from_millis(10))
            .with_display_name_prefix("test");
        JobMonitorBackend::new(client, config)
    }

    fn job(state: &str) -> serde_json::Value {
        serde_json::json!({"id": JOB, "lifecycleState": state})
    }

    async fn mount_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/20180917/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("ACCEPTED")))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_succeeded_job_reports_outputs() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("SUCCEEDED")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}/outputs", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"outputName": "public_ip", "outputValue": "203.0.113.7", "isSensitive": false},
                    {"outputName": "password", "outputValue": "secret", "isSensitive": true}
                ]
            })))
            .mount(&server)
            .await;

        let raw = backend(&server).apply().await.unwrap();

        assert!(raw.succeeded);
        assert_eq!(raw.outputs["public_ip"], serde_json::json!("203.0.113.7"));
        assert_eq!(raw.outputs["password"], serde_json::json!(SENSITIVE_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_failed_job_collects_diagnostic_logs() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": JOB,
                "lifecycleState": "FAILED",
                "failureDetails": {"code": "TERRAFORM_EXECUTION_ERROR", "message": "apply failed"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}/logs", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"level": "INFO", "message": "[INFO] oci_core_instance.free: Creating..."},
                {"level": "INFO", "message": "[INFO] Error: 500-InternalError, Out of host capacity."}
            ])))
            .mount(&server)
            .await;

        let raw = backend(&server).apply().await.unwrap();

        assert!(!raw.succeeded);
        assert!(raw.raw_output.starts_with("TERRAFORM_EXECUTION_ERROR: apply failed"));
        assert!(raw.raw_output.contains("Out of host capacity"));
        assert!(!raw.raw_output.contains("Creating..."));
        assert_eq!(classify(&raw.raw_output).kind, ErrorKind::CapacityExhausted);
    }

    #[tokio::test]
    async fn test_transient_poll_errors_keep_watching() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}", JOB)))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("IN_PROGRESS")))
            .up_to_n_times(1)
            .with_priority(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("SUCCEEDED")))
            .with_priority(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}/outputs", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let raw = backend(&server).apply().await.unwrap();

        assert!(raw.succeeded);
        assert!(raw.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_submit_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/20180917/jobs"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "code": "NotAuthenticated",
                "message": "The required information to complete authentication was not provided."
            })))
            .mount(&server)
            .await;

        let raw = backend(&server).apply().await.unwrap();

        assert!(!raw.succeeded);
        assert!(raw.raw_output.starts_with("401-NotAuthenticated"));
        assert_eq!(classify(&raw.raw_output).kind, ErrorKind::AuthFailure);
    }

    #[tokio::test]
    async fn test_job_lost_while_polling_is_classified() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}", JOB)))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": "NotAuthorizedOrNotFound",
                "message": "Authorization failed or requested resource not found."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let raw = backend(&server).apply().await.unwrap();

        assert!(!raw.succeeded);
        assert!(raw.raw_output.starts_with("404-NotAuthorizedOrNotFound"));
        let outcome = classify(&raw.raw_output);
        assert_eq!(outcome.kind, ErrorKind::AuthFailure);
        assert!(!outcome.kind.is_retryable());
    }

    #[tokio::test]
    async fn test_failed_job_without_details() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("CANCELED")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/20180917/jobs/{}/logs", JOB)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let raw = backend(&server).apply().await.unwrap();

        assert_eq!(raw.raw_output, format!("job {} ended in state CANCELED", JOB));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let client = ResourceManagerClient::new(ApiConfig::new("http://127.0.0.1:9")).unwrap();
        let backend = JobMonitorBackend::new(client, JobMonitorConfig::new("stack"));

        assert!(backend.apply().await.is_err());
    }
}
