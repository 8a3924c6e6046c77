//! OCI API request signing
//!
//! The OCI APIs authenticate every request with an HTTP signature
//! (`Signature version="1"`): an RSA-SHA256 signature over a fixed list of
//! headers, keyed by `<tenancy>/<user>/<fingerprint>`. The key material comes
//! from a profile of the OCI config file (`~/.oci/config`), the same file the
//! OCI CLI and terraform provider read.

use crate::error::{OciError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Profile read when none is named
pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// Credentials of one OCI config profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciProfile {
    pub tenancy: String,
    pub user: String,
    pub fingerprint: String,
    pub key_file: PathBuf,
    pub region: Option<String>,
}

impl OciProfile {
    /// `$OCI_CLI_CONFIG_FILE`, else `~/.oci/config`
    pub fn default_path() -> PathBuf {
        std::env::var("OCI_CLI_CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".oci"))
                    .unwrap_or_else(|| PathBuf::from(".oci"))
                    .join("config")
            })
    }

    pub fn from_file(path: &Path, profile: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OciError::Profile(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content, profile)
    }

    /// Parse an OCI config file
    ///
    /// Keys missing from the named profile fall back to `[DEFAULT]`.
    pub fn parse(content: &str, profile: &str) -> Result<Self> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let Some(own) = sections.get(profile) else {
            return Err(OciError::Profile(format!("profile [{}] not found", profile)));
        };
        let mut values = sections.get(DEFAULT_PROFILE).cloned().unwrap_or_default();
        values.extend(own.clone());

        let field = |key: &str| {
            values
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| OciError::Profile(format!("profile [{}] has no {}", profile, key)))
        };

        Ok(Self {
            tenancy: field("tenancy")?,
            user: field("user")?,
            fingerprint: field("fingerprint")?,
            key_file: expand_home(&field("key_file")?),
            region: values.get("region").cloned(),
        })
    }

    /// `keyId` of the signatures made with this profile's key
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy, self.user, self.fingerprint)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Signs API requests with an RSA API key
#[derive(Clone)]
pub struct RequestSigner {
    key_id: String,
    key: SigningKey<Sha256>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM
    pub fn new(key_id: impl Into<String>, pem: &str) -> Result<Self> {
        if pem.contains("ENCRYPTED") {
            return Err(OciError::Profile(
                "encrypted API keys are not supported, decrypt key_file first".into(),
            ));
        }
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| OciError::Profile(format!("invalid private key: {}", e)))?;

        Ok(Self {
            key_id: key_id.into(),
            key: SigningKey::<Sha256>::new(key),
        })
    }

    pub fn from_profile(profile: &OciProfile) -> Result<Self> {
        let pem = std::fs::read_to_string(&profile.key_file).map_err(|e| {
            OciError::Profile(format!(
                "cannot read key_file {}: {}",
                profile.key_file.display(),
                e
            ))
        })?;
        Self::new(profile.key_id(), &pem)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Add the signed headers and the `Authorization` header to a request
    ///
    /// Every request signs `date`, `(request-target)` and `host`. Requests
    /// with a body also sign `content-length`, `content-type` and
    /// `x-content-sha256`.
    pub fn sign(&self, request: &mut reqwest::Request) -> Result<()> {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let mut signed = vec![
            ("date", date),
            ("(request-target)", request_target(request)),
            ("host", host(request)?),
        ];

        if matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH) {
            let body = request.body().and_then(|b| b.as_bytes()).unwrap_or_default();
            let content_type = request
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/json")
                .to_string();
            signed.push(("content-length", body.len().to_string()));
            signed.push(("content-type", content_type));
            signed.push(("x-content-sha256", STANDARD.encode(Sha256::digest(body))));
        }

        let signing_string = signed
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n");
        let signature = self
            .key
            .try_sign(signing_string.as_bytes())
            .map_err(|e| OciError::Signing(e.to_string()))?;
        let header_names = signed
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(" ");
        let authorization = format!(
            r#"Signature version="1",keyId="{}",algorithm="rsa-sha256",headers="{}",signature="{}""#,
            self.key_id,
            header_names,
            STANDARD.encode(signature.to_bytes())
        );

        let headers = request.headers_mut();
        for &(name, ref value) in &signed {
            if name == "(request-target)" {
                continue;
            }
            headers.insert(HeaderName::from_static(name), header_value(value)?);
        }
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }
}

fn request_target(request: &reqwest::Request) -> String {
    let url = request.url();
    let mut target = format!(
        "{} {}",
        request.method().as_str().to_lowercase(),
        url.path()
    );
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn host(request: &reqwest::Request) -> Result<String> {
    let url = request.url();
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => Ok(format!("{}:{}", host, port)),
        (Some(host), None) => Ok(host.to_string()),
        (None, _) => Err(OciError::Signing(format!("URL has no host: {}", url))),
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| OciError::Signing(e.to_string()))
}
