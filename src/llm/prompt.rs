//! Prompt construction for function-style reasoning calls
//!
//! Every call names a single function whose `parameters` schema is the
//! JSON document the service must answer with.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
    pub name: String,
}

impl PromptMessage {
    pub fn system(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A fully assembled reasoning request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    pub message: PromptMessage,
    pub function: FunctionSpec,
    pub function_name: String,
}

impl Prompt {
    /// Plain-text rendering for services without native function calling
    pub fn render(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.function.parameters)
            .unwrap_or_else(|_| self.function.parameters.to_string());

        format!(
            "{}\n\nRespond by calling `{}` ({}).\nReturn ONLY valid JSON matching this schema:\n{}",
            self.message.content.trim(),
            self.function_name,
            self.function.description,
            schema,
        )
    }
}

pub fn create_prompt(
    message: PromptMessage,
    function: FunctionSpec,
    function_name: impl Into<String>,
) -> Prompt {
    Prompt {
        message,
        function,
        function_name: function_name.into(),
    }
}
