use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Host used when neither the builder nor `LLM_HOST` sets one.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Model used when neither the builder nor `LLM_MODEL` sets one.
pub const DEFAULT_MODEL: &str = "llama3.2";

const BACKOFF_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Errors that can occur when calling the generation API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection failures, DNS resolution and body read errors
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// Response body was not the expected JSON
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The API answered but reported a problem
    #[error("LLM API error: {message}")]
    Api { message: String },

    /// The configured host is not a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl LlmError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e)
        } else {
            Self::Network(e)
        }
    }
}

/// Builder for [`LlmClient`].
///
/// # Examples
///
/// ```
/// use mindtree::llm::LlmClientBuilder;
///
/// let client = LlmClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3.2")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "llama3.2");
/// ```
#[derive(Debug, Default)]
pub struct LlmClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL, e.g. `http://localhost:11434`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name sent with every request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the whole-request timeout. Defaults to 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Environment Variables
    ///
    /// Without `base_url()`, `LLM_HOST` is read, defaulting to
    /// [`DEFAULT_HOST`]. Without `model()`, `LLM_MODEL` is read, defaulting
    /// to [`DEFAULT_MODEL`].
    pub fn build(self) -> Result<LlmClient, LlmError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var("LLM_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        };
        let model = match self.model {
            Some(model) => model,
            None => std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        };

        reqwest::Url::parse(&base_url)
            .map_err(|e| LlmError::InvalidUrl(format!("{base_url}: {e}")))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(LlmError::Network)?;

        Ok(LlmClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

/// Text generation seam used by the assistant.
///
/// Implemented by [`LlmClient`]; tests provide canned responses.
pub trait LanguageModel: Send + Sync {
    /// Generates a completion for `prompt`.
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Synchronous client for the `/api/generate` endpoint.
///
/// Construct it with [`LlmClientBuilder`].
pub struct LlmClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_once(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(LlmError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
            });
        }

        let text = response.text().map_err(LlmError::from_reqwest)?;
        parse_generate_response(&text)
    }
}

impl LanguageModel for LlmClient {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, chars = prompt.len(), "sending prompt");
        retry_with_backoff(|| self.generate_once(prompt))
    }
}

/// Extracts the `response` field, surfacing an `error` field as [`LlmError::Api`].
fn parse_generate_response(body: &str) -> Result<String, LlmError> {
    let json: serde_json::Value = serde_json::from_str(body).map_err(LlmError::Serialization)?;

    if let Some(message) = json.get("error").and_then(|e| e.as_str()) {
        return Err(LlmError::Api {
            message: message.to_string(),
        });
    }

    json.get("response")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::Api {
            message: "Missing 'response' field in API response".to_string(),
        })
}

/// Retries an operation with delays of 1s, 2s and 4s.
///
/// Only transient errors are retried: network failures, timeouts and 5xx
/// responses.
pub fn retry_with_backoff<F, T>(f: F) -> Result<T, LlmError>
where
    F: FnMut() -> Result<T, LlmError>,
{
    retry_with_delays(&BACKOFF_DELAYS, f)
}

/// Runs `f` once, then once more after each delay while the error is transient.
pub fn retry_with_delays<F, T>(delays: &[Duration], mut f: F) -> Result<T, LlmError>
where
    F: FnMut() -> Result<T, LlmError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for (attempt, delay) in delays.iter().enumerate() {
        tracing::warn!(attempt = attempt + 1, error = %last_error, "retrying LLM request");
        thread::sleep(*delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

fn should_retry(error: &LlmError) -> bool {
    match error {
        LlmError::Network(_) | LlmError::Timeout(_) => true,
        LlmError::Http { status } => (500..600).contains(status),
        LlmError::Serialization(_) | LlmError::Api { .. } | LlmError::InvalidUrl(_) => false,
    }
}
