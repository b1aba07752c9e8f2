// LLM backend module
// Capability surface for embedding and text generation, with one
// interchangeable client per configured provider

pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, warn};

use crate::config::{LlmConfig, LlmProvider};

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

pub(crate) const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
pub(crate) const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Capability surface of the generation/embedding backend.
///
/// Failure is always an `Err`; an empty completion is a valid result and is
/// returned as `Ok` with an empty string.
pub trait LlmClient: Send + Sync {
    /// Return a fixed-size embedding vector for the given text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate a completion for the prompt, optionally under a system
    /// instruction
    fn complete(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String>;
}

/// Build the backend client selected by configuration
#[inline]
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::new(config)?)),
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiClient::new(config)?)),
    }
}

pub(crate) fn default_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Issue a request with bounded retries and exponential backoff. Server and
/// transport errors are retried; client errors are not.
pub(crate) fn request_with_retry<F>(retry_attempts: u32, mut request_fn: F) -> Result<String>
where
    F: FnMut() -> std::result::Result<String, ureq::Error>,
{
    let mut last_error = None;

    for attempt in 1..=retry_attempts {
        debug!("HTTP request attempt {}/{}", attempt, retry_attempts);

        match request_fn() {
            Ok(response_text) => {
                return Ok(response_text);
            }
            Err(error) => {
                let should_retry = match &error {
                    ureq::Error::StatusCode(status) => {
                        if *status >= 500 {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, retry_attempts
                            );
                            true
                        } else {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                        }
                    }
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_) => {
                        warn!(
                            "Transport error: {}, attempt {}/{}",
                            error, attempt, retry_attempts
                        );
                        true
                    }
                    _ => {
                        warn!("Non-retryable error: {}", error);
                        false
                    }
                };

                if !should_retry {
                    return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                }

                last_error = Some(anyhow::anyhow!("Request error: {}", error));

                if attempt < retry_attempts {
                    let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                    let delay = Duration::from_millis(delay_ms);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All retry attempts failed");

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[test]
    fn factory_builds_configured_provider() {
        let ollama = LlmConfig {
            provider: LlmProvider::Ollama,
            ..LlmConfig::default()
        };
        assert!(build_client(&ollama).is_ok());

        let openai = LlmConfig {
            provider: LlmProvider::OpenAi,
            ..LlmConfig::default()
        };
        assert!(build_client(&openai).is_ok());
    }

    #[test]
    fn retry_returns_first_success() {
        let mut calls = 0;
        let result = request_with_retry(3, || {
            calls += 1;
            Ok("ok".to_string())
        });

        assert_eq!(result.expect("request succeeds"), "ok");
        assert_eq!(calls, 1);
    }
}
