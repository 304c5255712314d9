//! LLM client for generative extraction and translation.
//!
//! The client itself performs no retries; callers apply the shared
//! `generate_with_retry` policy (transient failures only, exponential
//! backoff with jitter).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base delay for retry backoff, doubled per attempt.
const RETRY_BASE_DELAY_MS: u64 = 200;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("cannot reach LLM service at {0}")]
    Connection(String),

    #[error("LLM request timed out {0}")]
    Timeout(String),

    #[error("LLM service returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Transient failures worth another attempt. 4xx means the request
    /// itself is wrong and a retry cannot help.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Connection(_) | LlmError::Timeout(_) => true,
            LlmError::Http { status, .. } => (500..=599).contains(status),
            LlmError::MalformedResponse(_) => false,
        }
    }
}

pub trait LlmClient: Send + Sync {
    fn generate(&self, prompt: &str, system: &str, temperature: f32)
        -> Result<String, LlmError>;

    /// Cheap reachability probe for hosts to gate on before accepting work.
    fn health(&self) -> Result<(), LlmError>;
}

/// Call the LLM with retries on transient failures. Non-retryable errors
/// propagate immediately.
pub fn generate_with_retry(
    client: &dyn LlmClient,
    prompt: &str,
    system: &str,
    temperature: f32,
    max_retries: u32,
) -> Result<String, LlmError> {
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            std::thread::sleep(backoff_delay(attempt));
        }

        match client.generate(prompt, system, temperature) {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                tracing::warn!(
                    attempt = attempt + 1,
                    error = %e,
                    "LLM call failed, retrying"
                );
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error
        .unwrap_or_else(|| LlmError::Connection("all retry attempts exhausted".into())))
}

/// Exponential backoff with random jitter up to half the base delay.
fn backoff_delay(attempt: u32) -> std::time::Duration {
    let base_ms = RETRY_BASE_DELAY_MS << (attempt.min(6) - 1);
    let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2);
    std::time::Duration::from_millis(base_ms + jitter_ms)
}

// ═══════════════════════════════════════════════════════════════════════
// Ollama client
// ═══════════════════════════════════════════════════════════════════════

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(format!("after {}s", self.timeout_secs))
        } else {
            LlmError::MalformedResponse(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl LlmClient for OllamaClient {
    fn generate(
        &self,
        prompt: &str,
        system: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            options: OllamaOptions { temperature },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }

    fn health(&self) -> Result<(), LlmError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Test clients
// ═══════════════════════════════════════════════════════════════════════

/// Mock LLM client for tests. Returns queued responses in order and keeps
/// repeating the final one once the queue drains.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self::with_responses(&[response])
    }

    pub fn with_responses(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        _prompt: &str,
        _system: &str,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let response = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(response)
    }

    fn health(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// Mock LLM client that always fails with a connection error.
pub struct FailingLlmClient;

impl LlmClient for FailingLlmClient {
    fn generate(
        &self,
        _prompt: &str,
        _system: &str,
        _temperature: f32,
    ) -> Result<String, LlmError> {
        Err(LlmError::Connection("http://mock".into()))
    }

    fn health(&self) -> Result<(), LlmError> {
        Err(LlmError::Connection("http://mock".into()))
    }
}
