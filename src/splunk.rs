///
/// This module provides the HTTP transport to the Splunk REST API.
///
/// `SplunkTransport` is the seam the tool orchestrators talk to; `SplunkClient`
/// is its `reqwest` implementation. Every request carries `output_mode=json`
/// and JSON bodies. A 404 surfaces as `SplunkError::NotFound` so callers can
/// decide from the status code, not from message text.
///
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::env;
use std::time::Duration;

pub type QueryParams = Vec<(String, String)>;

#[derive(Debug, thiserror::Error)]
pub enum SplunkError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("resource not found: {path}")]
    NotFound { path: String },

    #[error("Splunk API returned error {status} with message {body}")]
    Api { status: u16, body: String },

    #[error("connection error occurred: {0}")]
    Connection(String),

    #[error("invalid response from {path}: {reason}")]
    InvalidResponse { path: String, reason: String },
}

impl SplunkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SplunkError::NotFound { .. })
    }
}

impl From<reqwest::Error> for SplunkError {
    fn from(e: reqwest::Error) -> Self {
        SplunkError::Connection(e.to_string())
    }
}

pub type SplunkResult<T> = Result<T, SplunkError>;

#[async_trait]
pub trait SplunkTransport: Send + Sync {
    /// GET; an empty body yields `Value::Null`.
    async fn get_by_path(&self, path: &str, query: &QueryParams) -> SplunkResult<Value>;

    /// POST a JSON body (create, and the API's POST-style updates).
    async fn create_update(&self, path: &str, body: &Value, query: &QueryParams) -> SplunkResult<Value>;

    /// PUT a JSON body.
    async fn update_by_path(&self, path: &str, body: &Value, query: &QueryParams) -> SplunkResult<Value>;

    async fn delete_by_path(&self, path: &str) -> SplunkResult<Value>;
}

#[derive(Debug, Clone)]
pub enum SplunkAuth {
    Token(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Clone)]
pub struct SplunkConfig {
    pub endpoint: String,
    pub auth: SplunkAuth,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub fn setup_splunk_configuration() -> Result<SplunkConfig, String> {
    let endpoint = env::var("SPLUNK_ENDPOINT").map_err(|_| {
        "SPLUNK_ENDPOINT environment variable not set. Please set it to your Splunk management URL (e.g., https://splunk.example.com:8089).".to_string()
    })?;

    let auth = match env::var("SPLUNK_TOKEN") {
        Ok(token) if !token.trim().is_empty() => SplunkAuth::Token(token),
        _ => {
            let username = env::var("SPLUNK_USERNAME").map_err(|_| {
                "Neither SPLUNK_TOKEN nor SPLUNK_USERNAME is set. Please provide a Splunk authentication token or username/password.".to_string()
            })?;
            let password = env::var("SPLUNK_PASSWORD").map_err(|_| {
                "SPLUNK_PASSWORD environment variable not set (required with SPLUNK_USERNAME).".to_string()
            })?;
            SplunkAuth::Basic { username, password }
        }
    };

    let verify_ssl = env::var("SPLUNK_VERIFY_SSL")
        .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
        .unwrap_or(true);

    let timeout_secs = match env::var("SPLUNK_TIMEOUT_SECS") {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|_| format!("SPLUNK_TIMEOUT_SECS must be a whole number of seconds, got '{}'", v))?,
        Err(_) => DEFAULT_TIMEOUT_SECS,
    };

    Ok(SplunkConfig {
        endpoint: endpoint.trim_end_matches('/').to_string(),
        auth,
        verify_ssl,
        timeout: Duration::from_secs(timeout_secs),
    })
}

pub struct SplunkClient {
    config: SplunkConfig,
    http: reqwest::Client,
}

impl SplunkClient {
    pub fn new(config: SplunkConfig) -> SplunkResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| SplunkError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &QueryParams,
        body: Option<&Value>,
    ) -> SplunkResult<Value> {
        let url = format!("{}/{}", self.config.endpoint, path.trim_start_matches('/'));
        let mut params: QueryParams = vec![("output_mode".to_string(), "json".to_string())];
        params.extend(query.iter().cloned());

        tracing::debug!(method = %method, url = %url, "Sending Splunk request");

        let mut request = self.http.request(method, &url).query(&params);
        request = match &self.config.auth {
            SplunkAuth::Token(token) => request.bearer_auth(token),
            SplunkAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(SplunkError::NotFound { path: path.to_string() });
        }
        if !status.is_success() {
            return Err(SplunkError::Api { status: status.as_u16(), body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| SplunkError::InvalidResponse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl SplunkTransport for SplunkClient {
    async fn get_by_path(&self, path: &str, query: &QueryParams) -> SplunkResult<Value> {
        self.send(Method::GET, path, query, None).await
    }

    async fn create_update(&self, path: &str, body: &Value, query: &QueryParams) -> SplunkResult<Value> {
        self.send(Method::POST, path, query, Some(body)).await
    }

    async fn update_by_path(&self, path: &str, body: &Value, query: &QueryParams) -> SplunkResult<Value> {
        self.send(Method::PUT, path, query, Some(body)).await
    }

    async fn delete_by_path(&self, path: &str) -> SplunkResult<Value> {
        self.send(Method::DELETE, path, &QueryParams::new(), None).await
    }
}

/// Builds query parameters, skipping `None` values.
pub fn query_params<const N: usize>(pairs: [(&str, Option<String>); N]) -> QueryParams {
    pairs
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect()
}
