//! HTTP transport contract and Gemini endpoint construction.
//!
//! The rest of the pipeline never touches `reqwest` directly. It builds an
//! [`HttpRequest`], hands it to an [`HttpTransport`], and branches on the
//! returned status code itself. A transport only fails when no response was
//! received at all; every HTTP status, including 4xx and 5xx, comes back as
//! `Ok(HttpResponse)` so the driver can tell a retryable 500 from a fatal 403.
//!
//! [`GeminiEndpoints`] owns URL layout and authentication so that switching
//! between an API key and an OAuth bearer token is a configuration choice,
//! not a branch in the driver.

use crate::error::InvoiceError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// HTTP method used by the three Gemini calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
    Delete,
}

/// Multipart upload body: JSON metadata part followed by the file part.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadForm {
    pub metadata: Value,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Request body variants.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Empty,
    Json(Value),
    Multipart(UploadForm),
}

/// A transport-agnostic HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
}

/// Status code and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the remote service.
///
/// Implementations must return `Ok` for every response that was received,
/// whatever its status.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, InvoiceError>;
}

// ── reqwest implementation ───────────────────────────────────────────────

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose every call times out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, InvoiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InvoiceError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (custom proxy, TLS roots, …).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, InvoiceError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = match method {
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        for (k, v) in &headers {
            builder = builder.header(k, v);
        }
        builder = match body {
            HttpBody::Empty => builder,
            HttpBody::Json(v) => builder.json(&v),
            HttpBody::Multipart(form) => builder.multipart(build_multipart(form)?),
        };

        // reqwest errors render the full URL, which may carry the API key.
        let response = builder.send().await.map_err(|e| {
            let timed_out = e.is_timeout();
            let e = e.without_url();
            InvoiceError::Transport {
                status: None,
                message: if timed_out {
                    format!("request to {} timed out: {e}", redact_key(&url))
                } else {
                    format!("request to {} failed: {e}", redact_key(&url))
                },
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| InvoiceError::Transport {
            status: Some(status),
            message: format!("failed to read response body: {}", e.without_url()),
        })?;
        debug!("{:?} {} -> HTTP {} ({} bytes)", method, redact_key(&url), status, body.len());

        Ok(HttpResponse { status, body })
    }
}

fn build_multipart(form: UploadForm) -> Result<reqwest::multipart::Form, InvoiceError> {
    use reqwest::multipart::{Form, Part};

    let metadata = Part::text(form.metadata.to_string())
        .mime_str("application/json")
        .map_err(|e| InvoiceError::Internal(format!("metadata part: {e}")))?;
    let file = Part::bytes(form.data)
        .file_name(form.file_name)
        .mime_str(&form.mime_type)
        .map_err(|e| InvoiceError::Internal(format!("file part: {e}")))?;

    Ok(Form::new().part("metadata", metadata).part("file", file))
}

/// Hide the value of a `key=` query parameter in log output.
fn redact_key(url: &str) -> String {
    match url.find("key=") {
        Some(pos) => {
            let end = url[pos..].find('&').map(|i| pos + i).unwrap_or(url.len());
            format!("{}key=***{}", &url[..pos], &url[end..])
        }
        None => url.to_string(),
    }
}

// ── Authentication & endpoints ───────────────────────────────────────────

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// `?key=…` query parameter.
    ApiKey(String),
    /// `Authorization: Bearer …` header (OAuth access token).
    Bearer(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

impl Auth {
    /// Read credentials from the environment.
    ///
    /// `GEMINI_API_KEY`, then `GOOGLE_API_KEY`, then `GEMINI_ACCESS_TOKEN`
    /// (used as a bearer token). Empty values are ignored.
    pub fn from_env() -> Option<Self> {
        let non_empty = |var: &str| std::env::var(var).ok().filter(|v| !v.trim().is_empty());

        non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("GOOGLE_API_KEY"))
            .map(Auth::ApiKey)
            .or_else(|| non_empty("GEMINI_ACCESS_TOKEN").map(Auth::Bearer))
    }
}

/// URL layout of the Gemini file and generate APIs.
#[derive(Debug, Clone)]
pub struct GeminiEndpoints {
    base_url: String,
    api_version: String,
    model: String,
    auth: Auth,
}

impl GeminiEndpoints {
    pub fn new(
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        model: impl Into<String>,
        auth: Auth,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_version: api_version.into(),
            model: normalise_model(&model.into()),
            auth,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `POST {base}/upload/{version}/files?uploadType=multipart`
    pub fn upload(&self, form: UploadForm) -> HttpRequest {
        let url = format!(
            "{}/upload/{}/files?uploadType=multipart",
            self.base_url, self.api_version
        );
        self.authorised(HttpMethod::Post, url, HttpBody::Multipart(form))
    }

    /// `POST {base}/{version}/{model}:generateContent`
    pub fn generate(&self, body: Value) -> HttpRequest {
        let url = format!(
            "{}/{}/{}:generateContent",
            self.base_url, self.api_version, self.model
        );
        self.authorised(HttpMethod::Post, url, HttpBody::Json(body))
    }

    /// `DELETE {base}/{version}/{name}` where `name` is e.g. `files/abc123`.
    pub fn delete(&self, name: &str) -> HttpRequest {
        let url = format!("{}/{}/{}", self.base_url, self.api_version, name);
        self.authorised(HttpMethod::Delete, url, HttpBody::Empty)
    }

    fn authorised(&self, method: HttpMethod, mut url: String, body: HttpBody) -> HttpRequest {
        let mut headers = Vec::new();
        match &self.auth {
            Auth::ApiKey(key) => {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str("key=");
                url.push_str(key);
            }
            Auth::Bearer(token) => {
                headers.push(("authorization".to_string(), format!("Bearer {token}")));
            }
        }
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

/// `gemini-1.5-pro` → `models/gemini-1.5-pro`; already-prefixed ids are kept.
pub fn normalise_model(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
