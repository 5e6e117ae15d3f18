//! Reasoning-service boundary
//!
//! The orchestrator never talks to a model directly. It builds a `Prompt`,
//! hands it to a `ReasoningService` through a `Reasoner` (which bounds the
//! call with a timeout) and parses whatever comes back.

use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod gemini;
pub mod mock;
pub mod prompt;

pub use gemini::GeminiReasoningService;
pub use mock::MockReasoningService;
pub use prompt::{create_prompt, FunctionSpec, Prompt, PromptMessage, Role};

pub const DEFAULT_REASONING_TIMEOUT: Duration = Duration::from_secs(30);

/// External natural-language completion provider
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Send one prompt; the reply is expected to be a JSON document
    /// matching `prompt.function.parameters`.
    async fn send(&self, prompt: &Prompt) -> Result<String>;
}

/// Timeout-bounded handle to a shared reasoning service
#[derive(Clone)]
pub struct Reasoner {
    service: Arc<dyn ReasoningService>,
    timeout: Duration,
}

impl Reasoner {
    pub fn new(service: Arc<dyn ReasoningService>) -> Self {
        Self {
            service,
            timeout: DEFAULT_REASONING_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Raw completion. Transport failures and timeouts are errors.
    pub async fn complete(&self, prompt: &Prompt) -> Result<String> {
        debug!(function = %prompt.function_name, "Calling reasoning service");

        match tokio::time::timeout(self.timeout, self.service.send(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    function = %prompt.function_name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Reasoning service timed out"
                );
                Err(OrchestrationError::ReasoningTimeout(
                    self.timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Completion parsed as JSON. `Ok(None)` when the reply is not structured data.
    pub async fn complete_structured(&self, prompt: &Prompt) -> Result<Option<Value>> {
        let raw = self.complete(prompt).await?;
        let parsed = parse_structured(&raw);

        if parsed.is_none() {
            warn!(
                function = %prompt.function_name,
                raw = %truncate(&raw, 200),
                "Reasoning service returned malformed JSON"
            );
        }

        Ok(parsed)
    }
}

/// Parse a reply as JSON, tolerating a surrounding ```json fence
pub fn parse_structured(raw: &str) -> Option<Value> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(cleaned).ok()
}

/// Extract `field` as a list of strings; non-string entries are skipped.
/// Missing field or non-array yields an empty list.
pub fn string_list(value: Option<&Value>, field: &str) -> Vec<String> {
    value
        .and_then(|v| v.get(field))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
