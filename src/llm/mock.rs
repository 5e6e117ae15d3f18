//! Scripted reasoning service for development & testing
//! Keeps the orchestrator functional without an LLM dependency

use crate::error::OrchestrationError;
use crate::llm::{Prompt, ReasoningService};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

enum Reply {
    Text(String),
    Fail(String),
}

struct Rule {
    function_name: String,
    description_filter: Option<String>,
    reply: Reply,
}

/// Replies are looked up by function name, first matching rule wins.
/// Rules are not consumed, so concurrent calls see the same reply.
pub struct MockReasoningService {
    rules: Vec<Rule>,
    latency: Option<Duration>,
    calls: Mutex<Vec<Prompt>>,
}

impl MockReasoningService {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            latency: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer calls to `function_name` with `value` serialized as JSON
    pub fn respond(self, function_name: &str, value: Value) -> Self {
        self.push(function_name, None, Reply::Text(value.to_string()))
    }

    /// Answer only when the function description contains `description_filter`
    pub fn respond_for(self, function_name: &str, description_filter: &str, value: Value) -> Self {
        self.push(
            function_name,
            Some(description_filter),
            Reply::Text(value.to_string()),
        )
    }

    /// Answer with an arbitrary string (e.g. malformed JSON)
    pub fn respond_raw(self, function_name: &str, raw: &str) -> Self {
        self.push(function_name, None, Reply::Text(raw.to_string()))
    }

    /// Fail calls to `function_name` with an LLM error
    pub fn fail(self, function_name: &str, message: &str) -> Self {
        self.push(function_name, None, Reply::Fail(message.to_string()))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Prompts received so far, in arrival order
    pub fn calls(&self) -> Vec<Prompt> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self, function_name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|p| p.function_name == function_name)
            .count()
    }

    fn push(mut self, function_name: &str, filter: Option<&str>, reply: Reply) -> Self {
        self.rules.push(Rule {
            function_name: function_name.to_string(),
            description_filter: filter.map(str::to_string),
            reply,
        });
        self
    }
}

impl Default for MockReasoningService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningService for MockReasoningService {
    async fn send(&self, prompt: &Prompt) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.clone());
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let rule = self.rules.iter().find(|rule| {
            rule.function_name == prompt.function_name
                && rule
                    .description_filter
                    .as_deref()
                    .map(|f| prompt.function.description.contains(f))
                    .unwrap_or(true)
        });

        match rule.map(|r| &r.reply) {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail(message)) => Err(OrchestrationError::LlmError(message.clone())),
            None => Err(OrchestrationError::LlmError(format!(
                "No scripted response for {}",
                prompt.function_name
            ))),
        }
    }
}
