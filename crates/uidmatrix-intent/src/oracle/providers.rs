//! Networked oracle backends and their configuration.
//!
//! Configuration precedence, per setting:
//! 1) explicit override (CLI flag)
//! 2) environment variable
//! 3) built-in default
//!
//! All backends use blocking HTTP with a per-request timeout; expiry surfaces
//! as [`OracleError::Timeout`].

use super::{IntentOracle, OfflineOracle, OracleError, OracleRequest};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[cfg(any(feature = "llm-anthropic", feature = "llm-openai", feature = "llm-ollama"))]
use serde_json::{json, Value};

pub const UIDMATRIX_LLM_BACKEND_ENV: &str = "UIDMATRIX_LLM_BACKEND";
pub const UIDMATRIX_LLM_MODEL_ENV: &str = "UIDMATRIX_LLM_MODEL";
pub const UIDMATRIX_LLM_TIMEOUT_SECS_ENV: &str = "UIDMATRIX_LLM_TIMEOUT_SECS";
pub const UIDMATRIX_LLM_MAX_OUTPUT_TOKENS_ENV: &str = "UIDMATRIX_LLM_MAX_OUTPUT_TOKENS";

// External provider env vars.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const ANTHROPIC_VERSION_ENV: &str = "ANTHROPIC_VERSION";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

// Classification is a one-line JSON reply; a short timeout keeps the CLI responsive.
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LLM_MAX_OUTPUT_TOKENS: u32 = 256;

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
// IPv4 loopback: some Ollama installs do not listen on ::1.
const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";

const ERROR_BODY_PREVIEW_CHARS: usize = 512;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Anthropic,
    OpenAI,
    Ollama,
    /// Deterministic template matcher; no network.
    Offline,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Anthropic => "anthropic",
            Backend::OpenAI => "openai",
            Backend::Ollama => "ollama",
            Backend::Offline => "offline",
        }
    }

    /// Small, fast model tiers: the task is a fixed-vocabulary classification.
    pub fn default_model(self) -> &'static str {
        match self {
            Backend::Anthropic => "claude-haiku-4-5",
            Backend::OpenAI => "gpt-4o-mini",
            Backend::Ollama => "llama3.2",
            Backend::Offline => "templates",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Backend::Anthropic => DEFAULT_ANTHROPIC_BASE_URL,
            Backend::OpenAI => DEFAULT_OPENAI_BASE_URL,
            Backend::Ollama | Backend::Offline => DEFAULT_OLLAMA_HOST,
        }
    }

    fn base_url_env(self) -> Option<&'static str> {
        match self {
            Backend::Anthropic => Some(ANTHROPIC_BASE_URL_ENV),
            Backend::OpenAI => Some(OPENAI_BASE_URL_ENV),
            Backend::Ollama => Some(OLLAMA_HOST_ENV),
            Backend::Offline => None,
        }
    }

    fn api_key_env(self) -> Option<&'static str> {
        match self {
            Backend::Anthropic => Some(ANTHROPIC_API_KEY_ENV),
            Backend::OpenAI => Some(OPENAI_API_KEY_ENV),
            Backend::Ollama | Backend::Offline => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Backend::Anthropic),
            "openai" => Ok(Backend::OpenAI),
            "ollama" | "local" => Ok(Backend::Ollama),
            "offline" | "mock" => Ok(Backend::Offline),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown LLM backend {0:?} (expected anthropic, openai, ollama or offline)")]
    UnknownBackend(String),
    #[error("invalid {name}={value:?} ({expected})")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Values supplied on the command line; `None` defers to env/defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    /// Must be positive.
    pub timeout_secs: Option<u64>,
}

/// Resolved oracle configuration.
#[derive(Clone)]
pub struct OracleConfig {
    pub backend: Backend,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub anthropic_version: String,
    pub timeout: Duration,
    pub max_output_tokens: u32,
}

// Hand-written so the API key never reaches logs.
impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("anthropic_version", &self.anthropic_version)
            .field("timeout", &self.timeout)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl OracleConfig {
    /// Resolve from the process environment.
    pub fn from_env(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` in place of the environment.
    pub fn resolve(
        overrides: &ConfigOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend = match overrides.backend {
            Some(b) => b,
            None => match var(UIDMATRIX_LLM_BACKEND_ENV) {
                Some(v) => v.parse()?,
                None => Backend::Anthropic,
            },
        };

        let model = overrides
            .model
            .clone()
            .or_else(|| var(UIDMATRIX_LLM_MODEL_ENV))
            .unwrap_or_else(|| backend.default_model().to_string());

        let timeout_secs = match overrides.timeout_secs {
            Some(v) => Some(v.to_string()),
            None => var(UIDMATRIX_LLM_TIMEOUT_SECS_ENV),
        };
        let timeout_secs = match timeout_secs {
            Some(v) => match v.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: UIDMATRIX_LLM_TIMEOUT_SECS_ENV,
                        value: v,
                        expected: "positive integer seconds",
                    })
                }
            },
            None => DEFAULT_LLM_TIMEOUT_SECS,
        };

        let max_output_tokens = match var(UIDMATRIX_LLM_MAX_OUTPUT_TOKENS_ENV) {
            Some(v) => match v.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: UIDMATRIX_LLM_MAX_OUTPUT_TOKENS_ENV,
                        value: v,
                        expected: "positive integer",
                    })
                }
            },
            None => DEFAULT_LLM_MAX_OUTPUT_TOKENS,
        };

        let raw_base_url = backend
            .base_url_env()
            .and_then(|name| var(name))
            .unwrap_or_else(|| backend.default_base_url().to_string());
        let base_url = normalize_http_base_url(&raw_base_url, backend.default_base_url())?;

        Ok(Self {
            backend,
            model,
            base_url,
            api_key: backend.api_key_env().and_then(|name| var(name)),
            anthropic_version: var(ANTHROPIC_VERSION_ENV)
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_VERSION.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            max_output_tokens,
        })
    }

    /// Configuration for the network-free template oracle.
    pub fn offline() -> Self {
        Self {
            backend: Backend::Offline,
            model: Backend::Offline.default_model().to_string(),
            base_url: String::new(),
            api_key: None,
            anthropic_version: DEFAULT_ANTHROPIC_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            max_output_tokens: DEFAULT_LLM_MAX_OUTPUT_TOKENS,
        }
    }

    fn require_api_key(&self) -> Result<&str, OracleError> {
        match (&self.api_key, self.backend.api_key_env()) {
            (Some(key), _) => Ok(key.as_str()),
            (None, Some(env)) => Err(OracleError::NotConfigured(format!(
                "{} backend requires {env} (set it in your environment)",
                self.backend
            ))),
            (None, None) => Ok(""),
        }
    }
}

fn normalize_http_base_url(base_url: &str, default: &str) -> Result<String, ConfigError> {
    let mut host = base_url.trim().to_string();
    if host.is_empty() {
        host = default.to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("https://{host}");
    }
    let host = host.trim_end_matches('/').to_string();
    url::Url::parse(&host).map_err(|e| ConfigError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(host)
}

/// Build the oracle selected by `config`.
///
/// Missing credentials are reported here, before any query is sent.
pub fn build_oracle(config: &OracleConfig) -> Result<Box<dyn IntentOracle>, OracleError> {
    tracing::debug!(backend = %config.backend, model = %config.model, "building oracle");
    match config.backend {
        Backend::Offline => Ok(Box::new(OfflineOracle::new())),
        #[cfg(feature = "llm-anthropic")]
        Backend::Anthropic => Ok(Box::new(AnthropicOracle::new(config.clone())?)),
        #[cfg(feature = "llm-openai")]
        Backend::OpenAI => Ok(Box::new(OpenAiOracle::new(config.clone())?)),
        #[cfg(feature = "llm-ollama")]
        Backend::Ollama => Ok(Box::new(OllamaOracle::new(config.clone())?)),
        #[allow(unreachable_patterns)]
        other => Err(OracleError::NotConfigured(format!(
            "{other} backend not compiled in (enable the llm-{other} feature)"
        ))),
    }
}

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

#[cfg(any(feature = "llm-anthropic", feature = "llm-openai", feature = "llm-ollama"))]
fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, OracleError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OracleError::Network {
        endpoint: "(client)".to_string(),
        message: format!("failed to build http client: {e}"),
    })
}

#[cfg(any(feature = "llm-anthropic", feature = "llm-openai", feature = "llm-ollama"))]
fn transport_error(url: &str, timeout: Duration, e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout(timeout)
    } else {
        OracleError::Network {
            endpoint: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(any(feature = "llm-anthropic", feature = "llm-openai", feature = "llm-ollama"))]
fn post_json(
    client: &reqwest::blocking::Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
    timeout: Duration,
) -> Result<Value, OracleError> {
    let mut req = client.post(url).json(body);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }

    let resp = req.send().map_err(|e| transport_error(url, timeout, e))?;
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(OracleError::Auth {
            status: status.as_u16(),
        });
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        return Err(OracleError::RateLimited { retry_after_secs });
    }
    if !status.is_success() {
        let text = resp.text().unwrap_or_default();
        return Err(OracleError::Http {
            status: status.as_u16(),
            body: text.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
        });
    }

    resp.json::<Value>().map_err(|e| {
        if e.is_timeout() {
            OracleError::Timeout(timeout)
        } else {
            OracleError::EmptyResponse(format!("response body is not JSON: {e}"))
        }
    })
}

#[cfg(any(feature = "llm-anthropic", feature = "llm-openai", feature = "llm-ollama"))]
fn non_empty(text: Option<&str>, what: &str) -> Result<String, OracleError> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(OracleError::EmptyResponse(what.to_string())),
    }
}

// ============================================================================
// Anthropic (Messages API)
// ============================================================================

#[cfg(feature = "llm-anthropic")]
pub struct AnthropicOracle {
    client: reqwest::blocking::Client,
    config: OracleConfig,
}

#[cfg(feature = "llm-anthropic")]
impl AnthropicOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        config.require_api_key()?;
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }
}

#[cfg(feature = "llm-anthropic")]
fn anthropic_extract_output_text(v: &Value) -> Option<String> {
    let mut out = String::new();
    for block in v.get("content")?.as_array()? {
        if block.get("type").and_then(|t| t.as_str()) != Some("text") {
            continue;
        }
        if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(t);
        }
    }
    Some(out)
}

#[cfg(feature = "llm-anthropic")]
impl IntentOracle for AnthropicOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let body = json!({
            "model": self.config.model,
            "max_tokens": request.max_output_tokens,
            "temperature": 0,
            "system": request.instruction,
            "messages": [
                { "role": "user", "content": request.query_text }
            ]
        });
        let api_key = self.config.require_api_key()?;
        let v = post_json(
            &self.client,
            &url,
            &[
                ("x-api-key", api_key),
                ("anthropic-version", self.config.anthropic_version.as_str()),
            ],
            &body,
            self.config.timeout,
        )?;
        non_empty(
            anthropic_extract_output_text(&v).as_deref(),
            "anthropic: no text blocks in response",
        )
    }

    fn describe(&self) -> String {
        format!("anthropic({})", self.config.model)
    }
}

// ============================================================================
// OpenAI (Chat Completions, JSON mode)
// ============================================================================

#[cfg(feature = "llm-openai")]
pub struct OpenAiOracle {
    client: reqwest::blocking::Client,
    config: OracleConfig,
}

#[cfg(feature = "llm-openai")]
impl OpenAiOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        config.require_api_key()?;
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }
}

#[cfg(feature = "llm-openai")]
impl IntentOracle for OpenAiOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let body = json!({
            "model": self.config.model,
            "max_tokens": request.max_output_tokens,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": request.instruction },
                { "role": "user", "content": request.query_text }
            ]
        });
        let bearer = format!("Bearer {}", self.config.require_api_key()?);
        let v = post_json(
            &self.client,
            &url,
            &[("Authorization", bearer.as_str())],
            &body,
            self.config.timeout,
        )?;
        non_empty(
            v["choices"][0]["message"]["content"].as_str(),
            "openai: no message content in response",
        )
    }

    fn describe(&self) -> String {
        format!("openai({})", self.config.model)
    }
}

// ============================================================================
// Ollama (local /api/chat)
// ============================================================================

#[cfg(feature = "llm-ollama")]
pub struct OllamaOracle {
    client: reqwest::blocking::Client,
    config: OracleConfig,
}

#[cfg(feature = "llm-ollama")]
impl OllamaOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }
}

#[cfg(feature = "llm-ollama")]
impl IntentOracle for OllamaOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = format!("{}/api/chat", self.config.base_url);
        let body = json!({
            "model": self.config.model,
            "stream": false,
            "format": "json",
            "options": {
                "temperature": 0,
                "num_predict": request.max_output_tokens
            },
            "messages": [
                { "role": "system", "content": request.instruction },
                { "role": "user", "content": request.query_text }
            ]
        });
        let v = post_json(&self.client, &url, &[], &body, self.config.timeout)?;
        non_empty(
            v["message"]["content"].as_str(),
            "ollama: no message content in response",
        )
    }

    fn describe(&self) -> String {
        format!("ollama({})", self.config.model)
    }
}
