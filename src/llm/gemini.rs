//! Gemini API client
//!
//! Sends each prompt as a single forced function call and returns the
//! call arguments as a JSON string.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::OrchestrationError;
use crate::llm::{Prompt, ReasoningService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiReasoningService {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiReasoningService {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_GEMINI_MODEL)
    }

    pub fn with_model(api_key: String, model: &str) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                model
            ),
        }
    }

    fn build_request(prompt: &Prompt) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt.render())],
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part::text(SYSTEM_PROMPT.to_string())],
            },
            tools: vec![Tool {
                function_declarations: vec![FunctionDeclaration {
                    name: prompt.function.name.clone(),
                    description: prompt.function.description.clone(),
                    parameters: to_gemini_schema(&prompt.function.parameters),
                }],
            }],
            tool_config: ToolConfig {
                function_calling_config: FunctionCallingConfig {
                    mode: "ANY".to_string(),
                    allowed_function_names: vec![prompt.function_name.clone()],
                },
            },
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
        }
    }
}

#[async_trait]
impl ReasoningService for GeminiReasoningService {
    async fn send(&self, prompt: &Prompt) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(OrchestrationError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let request = Self::build_request(prompt);

        info!(function = %prompt.function_name, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                OrchestrationError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(OrchestrationError::LlmError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            OrchestrationError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        extract_answer(&gemini_response)
    }
}

const SYSTEM_PROMPT: &str = r#"You are the reasoning engine of an assistant for securities trading on the Nairobi Securities Exchange.

Guidelines:
- Always answer by calling the requested function
- Arguments must match the declared parameter schema exactly
- Only use information present in the prompt
- Never invent prices, quantities or asset names"#;

/// Prefer the function-call arguments; fall back to a text part.
fn extract_answer(response: &GeminiResponse) -> crate::Result<String> {
    let candidate = response.candidates.first().ok_or_else(|| {
        OrchestrationError::LlmError("No response from Gemini API".to_string())
    })?;

    if let Some(call) = candidate
        .content
        .parts
        .iter()
        .find_map(|p| p.function_call.as_ref())
    {
        return Ok(call.args.to_string());
    }

    candidate
        .content
        .parts
        .iter()
        .find_map(|p| p.text.clone())
        .ok_or_else(|| OrchestrationError::LlmError("Empty response from Gemini".to_string()))
}

/// Gemini's function schemas are an OpenAPI subset; drop keywords it rejects.
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !matches!(k.as_str(), "additionalProperties" | "$schema" | "const"))
                .map(|(k, v)| (k.clone(), to_gemini_schema(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    tools: Vec<Tool>,
    tool_config: ToolConfig,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            function_call: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionCallingConfig {
    mode: String,
    allowed_function_names: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{create_prompt, FunctionSpec, PromptMessage};
    use crate::schema::object_schema;
    use serde_json::json;

    fn props_prompt() -> Prompt {
        create_prompt(
            PromptMessage::system("getUIBlockProps", "Buy 10 Safaricom"),
            FunctionSpec::new(
                "getUIBlockProps",
                "Get UI Block Props for PURCHASE_BUTTON",
                object_schema(&[("assetName", "string"), ("quantity", "number")]),
            ),
            "getUIBlockProps",
        )
    }

    #[test]
    fn test_request_serialization() {
        let request = GeminiReasoningService::build_request(&props_prompt());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json["toolConfig"]["functionCallingConfig"]["allowedFunctionNames"][0],
            "getUIBlockProps"
        );
        let params = &json["tools"][0]["functionDeclarations"][0]["parameters"];
        assert!(params.get("additionalProperties").is_none());
        assert_eq!(params["properties"]["quantity"]["type"], "number");
        assert!(json["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Buy 10 Safaricom"));
    }

    #[test]
    fn test_function_call_args_are_preferred() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "thinking out loud" },
                        { "functionCall": { "name": "getUIBlockProps", "args": { "quantity": 10 } } }
                    ]
                }
            }]
        }))
        .unwrap();

        assert_eq!(extract_answer(&response).unwrap(), r#"{"quantity":10}"#);
    }

    #[test]
    fn test_text_fallback_and_empty_candidates() {
        let text_only: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"blocks\":[]}" }] } }]
        }))
        .unwrap();
        assert_eq!(extract_answer(&text_only).unwrap(), "{\"blocks\":[]}");

        let empty: GeminiResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(extract_answer(&empty).is_err());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let service = GeminiReasoningService::new(String::new());
        let result = service.send(&props_prompt()).await;

        assert!(matches!(result, Err(OrchestrationError::ConfigError(_))));
    }
}
