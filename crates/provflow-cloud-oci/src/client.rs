//! Resource Manager job API client
//!
//! Direct REST implementation of the four job operations ProvFlow needs:
//! create an apply job, read its state, read its logs, read its outputs.
//! Requests are signed with the API key of an OCI config profile.

use crate::error::{OciError, Result};
use crate::job::{JobOutput, LogEntry, LogLevel, ProvisioningJob};
use crate::signer::{OciProfile, RequestSigner};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_VERSION: &str = "20180917";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const NEXT_PAGE_HEADER: &str = "opc-next-page";
const MAX_LOG_PAGES: usize = 100;

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://resourcemanager.uk-london-1.oraclecloud.com`
    pub endpoint: String,
    /// Unsigned requests when `None`
    pub signer: Option<RequestSigner>,
}

impl ApiConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Sign with the API key of an OCI config profile
    pub fn with_profile(self, profile: &OciProfile) -> Result<Self> {
        Ok(self.with_signer(RequestSigner::from_profile(profile)?))
    }
}

/// Resource Manager job client
pub struct ResourceManagerClient {
    client: reqwest::Client,
    base_url: String,
    signer: Option<RequestSigner>,
}

impl ResourceManagerClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(OciError::InvalidConfig("job API endpoint is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/{}", endpoint, API_VERSION),
            signer: config.signer,
        })
    }

    /// Sign, send and check the status of one request
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut request = request.build()?;
        if let Some(ref signer) = self.signer {
            signer.sign(&mut request)?;
        }
        let response = self.client.execute(request).await?;
        check_status(response).await
    }

    /// Submit an auto-approved apply job for a stack
    pub async fn create_apply_job(
        &self,
        stack_id: &str,
        display_name: &str,
    ) -> Result<ProvisioningJob> {
        let url = format!("{}/jobs", self.base_url);

        let request_body = CreateJobRequest {
            stack_id: stack_id.to_string(),
            display_name: display_name.to_string(),
            operation: "APPLY".to_string(),
            apply_job_plan_resolution: ApplyJobPlanResolution {
                is_auto_approved: true,
            },
        };

        let response = self
            .send(self.client.post(&url).json(&request_body))
            .await?;
        Ok(response.json().await?)
    }

    /// Read a job's current state
    pub async fn get_job(&self, job_id: &str) -> Result<ProvisioningJob> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);

        let response = self.send(self.client.get(&url)).await?;
        Ok(response.json().await?)
    }

    /// Read all log entries at or above `level`, following pagination
    pub async fn get_job_logs(&self, job_id: &str, level: LogLevel) -> Result<Vec<LogEntry>> {
        let url = format!("{}/jobs/{}/logs", self.base_url, job_id);
        let mut entries = Vec::new();
        let mut page: Option<String> = None;

        for _ in 0..MAX_LOG_PAGES {
            let mut query = vec![("levelGreaterThanOrEqualTo", level.as_str().to_string())];
            if let Some(ref p) = page {
                query.push(("page", p.clone()));
            }

            let response = self.send(self.client.get(&url).query(&query)).await?;
            let next_page = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .filter(|p| !p.is_empty());

            let mut batch: Vec<LogEntry> = response.json().await?;
            entries.append(&mut batch);

            match next_page {
                Some(p) => page = Some(p),
                None => return Ok(entries),
            }
        }

        tracing::warn!(job_id, "job log has more than {} pages, truncating", MAX_LOG_PAGES);
        Ok(entries)
    }

    /// Read the outputs of a succeeded job
    pub async fn list_job_outputs(&self, job_id: &str) -> Result<Vec<JobOutput>> {
        let url = format!("{}/jobs/{}/outputs", self.base_url, job_id);

        let response = self.send(self.client.get(&url)).await?;
        let collection: OutputCollection = response.json().await?;
        Ok(collection.items)
    }
}

/// Turn a non-success response into [`OciError::Api`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(err) => (err.code, err.message),
        Err(_) => (
            status
                .canonical_reason()
                .unwrap_or("Error")
                .replace(' ', ""),
            body.trim().chars().take(200).collect(),
        ),
    };

    Err(OciError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

// ============ API Types ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobRequest {
    stack_id: String,
    display_name: String,
    operation: String,
    apply_job_plan_resolution: ApplyJobPlanResolution,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyJobPlanResolution {
    is_auto_approved: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct OutputCollection {
    #[serde(default)]
    items: Vec<JobOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::tests::{TEST_KEY, TEST_KEY_ID, signature_params, verify};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use sha2::{Digest, Sha256};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ResourceManagerClient {
        let signer = RequestSigner::new(TEST_KEY_ID, TEST_KEY).unwrap();
        let config = ApiConfig::new(format!("{}/", server.uri())).with_signer(signer);
        ResourceManagerClient::new(config).unwrap()
    }

    fn received_header<'a>(request: &'a wiremock::Request, name: &str) -> &'a str {
        request.headers.get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_create_apply_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/20180917/jobs"))
            .and(body_partial_json(serde_json::json!({
                "stackId": "ocid1.ormstack.test",
                "operation": "APPLY",
                "applyJobPlanResolution": {"isAutoApproved": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "ocid1.ormjob.test",
                "lifecycleState": "ACCEPTED"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let job = client(&server)
            .create_apply_job("ocid1.ormstack.test", "provflow-test")
            .await
            .unwrap();

        assert_eq!(job.id, "ocid1.ormjob.test");
        assert_eq!(job.state, crate::job::JobState::Accepted);

        let requests = server.received_requests().await.unwrap();
        let request = &requests[0];
        assert_eq!(
            received_header(request, "x-content-sha256"),
            STANDARD.encode(Sha256::digest(&request.body))
        );

        let authorization = received_header(request, "authorization");
        assert!(authorization.starts_with(&format!(
            r#"Signature version="1",keyId="{}",algorithm="rsa-sha256""#,
            TEST_KEY_ID
        )));
        let params = signature_params(authorization);
        assert_eq!(
            params["headers"],
            "date (request-target) host content-length content-type x-content-sha256"
        );
        let signing_string = format!(
            "date: {}\n(request-target): post /20180917/jobs\nhost: {}\ncontent-length: {}\ncontent-type: {}\nx-content-sha256: {}",
            received_header(request, "date"),
            received_header(request, "host"),
            request.body.len(),
            received_header(request, "content-type"),
            received_header(request, "x-content-sha256"),
        );
        verify(&signing_string, &params["signature"]);
    }

    #[tokio::test]
    async fn test_get_requests_are_signed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/20180917/jobs/j1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "j1",
                "lifecycleState": "IN_PROGRESS"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).get_job("j1").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let request = &requests[0];
        let params = signature_params(received_header(request, "authorization"));
        assert_eq!(params["headers"], "date (request-target) host");
        let signing_string = format!(
            "date: {}\n(request-target): get /20180917/jobs/j1\nhost: {}",
            received_header(request, "date"),
            received_header(request, "host"),
        );
        verify(&signing_string, &params["signature"]);
    }

    #[tokio::test]
    async fn test_api_error_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/20180917/jobs/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": "NotAuthorizedOrNotFound",
                "message": "Authorization failed or requested resource not found."
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_job("missing").await.unwrap_err();
        match err {
            OciError::Api { status, code, .. } => {
                assert_eq!(status, 404);
                assert_eq!(code, "NotAuthorizedOrNotFound");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_error_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/20180917/jobs/busy"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = client(&server).get_job("busy").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "503-ServiceUnavailable: upstream unavailable");
    }

    #[tokio::test]
    async fn test_get_job_logs_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/20180917/jobs/j1/logs"))
            .and(query_param("page", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"level": "INFO", "message": "second page"}
            ])))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/20180917/jobs/j1/logs"))
            .and(query_param("levelGreaterThanOrEqualTo", "INFO"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(NEXT_PAGE_HEADER, "p2")
                    .set_body_json(serde_json::json!([
                        {"level": "INFO", "message": "first page", "timestamp": "2025-01-01T00:00:00Z"}
                    ])),
            )
            .mount(&server)
            .await;

        let entries = client(&server)
            .get_job_logs("j1", LogLevel::Info)
            .await
            .unwrap();

        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first page", "second page"]);
    }

    #[tokio::test]
    async fn test_list_job_outputs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/20180917/jobs/j1/outputs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"outputName": "public_ip", "outputValue": "203.0.113.5", "outputType": "string", "isSensitive": false}
                ]
            })))
            .mount(&server)
            .await;

        let outputs = client(&server).list_job_outputs("j1").await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output_name, "public_ip");
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(ResourceManagerClient::new(ApiConfig::new("")).is_err());
    }
}
