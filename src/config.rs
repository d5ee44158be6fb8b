//! Configuration types for invoice extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`].

use crate::error::InvoiceError;
use crate::pipeline::tools::ToolRegistry;
use crate::pipeline::transport::{Auth, HttpTransport};
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default model resource name.
pub const DEFAULT_MODEL: &str = "models/gemini-1.5-pro-latest";
/// Default API version path segment.
pub const DEFAULT_API_VERSION: &str = "v1beta";
/// Default API origin.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for one invoice extraction.
///
/// # Example
/// ```rust
/// use edgequake_invoice::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-2.0-flash")
///     .max_retries(3)
///     .tool_calling(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-2.0-flash");
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model identifier, with or without the `models/` prefix.
    /// Default: `models/gemini-1.5-pro-latest`.
    pub model: String,

    /// API version path segment. Default: `v1beta`.
    pub api_version: String,

    /// API origin. Default: `https://generativelanguage.googleapis.com`.
    pub base_url: String,

    /// Credentials. If `None`, read from the environment when the run starts
    /// (see [`Auth::from_env`]).
    pub auth: Option<Auth>,

    /// Shared retry budget for one conversation. Default: 5.
    ///
    /// HTTP 500, malformed JSON, missing text, and non-terminal tool
    /// round-trips all draw from the same counter, so a run sends at most
    /// `max_retries + 1` generate requests.
    pub max_retries: u32,

    /// Fixed wait before resending after an HTTP 500, in milliseconds. Default: 3000.
    pub retry_backoff_ms: u64,

    /// Offer the tool declarations to the model. Default: true.
    ///
    /// With tool calling the model returns the invoice as a function-call
    /// argument; without it the invoice is parsed out of the reply text.
    pub tool_calling: bool,

    /// Functions offered when `tool_calling` is on.
    /// Default: [`ToolRegistry::invoice_default`].
    pub tools: ToolRegistry,

    /// Custom prompt. If None, uses [`crate::prompts::DEFAULT_INVOICE_PROMPT`].
    pub prompt: Option<String>,

    /// Maximum uploads in flight. Default: 4.
    pub upload_concurrency: usize,

    /// Per-HTTP-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Pre-constructed transport. Takes precedence over the built-in reqwest transport.
    pub transport: Option<Arc<dyn HttpTransport>>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: None,
            max_retries: 5,
            retry_backoff_ms: 3000,
            tool_calling: true,
            tools: ToolRegistry::invoice_default(),
            prompt: None,
            upload_concurrency: 4,
            api_timeout_secs: 120,
            transport: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("tool_calling", &self.tool_calling)
            .field("tools", &self.tools.len())
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("upload_concurrency", &self.upload_concurrency)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("transport", &self.transport.as_ref().map(|_| "<dyn HttpTransport>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt that will actually be sent.
    pub fn effective_prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_INVOICE_PROMPT)
    }

    /// Upper bound on generate requests for one run.
    pub fn max_rounds(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.auth = Some(Auth::ApiKey(key.into()));
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth = Some(Auth::Bearer(token.into()));
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.config.auth = Some(auth);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn tool_calling(mut self, enabled: bool) -> Self {
        self.config.tool_calling = enabled;
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.config.tools = tools;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn upload_concurrency(mut self, n: usize) -> Self {
        self.config.upload_concurrency = n.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig("Model must not be empty".into()));
        }
        if c.api_version.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "API version must not be empty".into(),
            ));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(InvoiceError::InvalidConfig(format!(
                "Base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.upload_concurrency == 0 {
            return Err(InvoiceError::InvalidConfig(
                "Upload concurrency must be ≥ 1".into(),
            ));
        }
        if c.tool_calling && c.tools.is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "Tool calling is enabled but no tools are registered".into(),
            ));
        }
        Ok(self.config)
    }
}
