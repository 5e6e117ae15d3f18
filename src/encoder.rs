//! Turns raw user text into a `Goal`

use crate::error::OrchestrationError;
use crate::llm::{create_prompt, FunctionSpec, PromptMessage, Reasoner};
use crate::models::Goal;
use crate::schema::object_schema;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

pub const TASK_ENCODING_FUNCTION: &str = "encodeTask";

pub const DEFAULT_COMPLETION_CRITERIA: &str =
    "The user's request has been answered with the information available to me";

#[async_trait]
pub trait GoalEncoder: Send + Sync {
    async fn encode(&self, prompt: &str, directive: &str) -> Result<Goal>;
}

fn require_prompt(prompt: &str) -> Result<&str> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(OrchestrationError::InvalidInput(
            "prompt must not be empty".to_string(),
        ));
    }
    Ok(prompt)
}

/// Uses the prompt as the task verbatim
pub struct DirectGoalEncoder;

#[async_trait]
impl GoalEncoder for DirectGoalEncoder {
    async fn encode(&self, prompt: &str, directive: &str) -> Result<Goal> {
        let task = require_prompt(prompt)?;
        Ok(Goal::new(task, directive, DEFAULT_COMPLETION_CRITERIA))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedTask {
    task: String,
    completion_criteria: String,
}

/// Asks the reasoning service to restate the request as a task with a
/// completion criterion. Unusable replies fall back to `DirectGoalEncoder`.
pub struct ReasoningGoalEncoder {
    reasoner: Reasoner,
}

impl ReasoningGoalEncoder {
    pub fn new(reasoner: Reasoner) -> Self {
        Self { reasoner }
    }
}

#[async_trait]
impl GoalEncoder for ReasoningGoalEncoder {
    async fn encode(&self, prompt: &str, directive: &str) -> Result<Goal> {
        let request = require_prompt(prompt)?;

        let content = format!(
            r#"<instructions>
Convert the human request into a single task I can execute, and a completion criteria that tells me when the task is done.
Stay within my prime directive.
</instructions>
<prime-directive>
{}
</prime-directive>
<human-request>
{}
</human-request>"#,
            directive.trim(),
            request,
        );

        let reasoning_prompt = create_prompt(
            PromptMessage::system(TASK_ENCODING_FUNCTION, content),
            FunctionSpec::new(
                TASK_ENCODING_FUNCTION,
                "Encode a human request into an execution task",
                object_schema(&[("task", "string"), ("completionCriteria", "string")]),
            ),
            TASK_ENCODING_FUNCTION,
        );

        let encoded = self
            .reasoner
            .complete_structured(&reasoning_prompt)
            .await?
            .and_then(|value| serde_json::from_value::<EncodedTask>(value).ok())
            .filter(|e| !e.task.trim().is_empty());

        match encoded {
            Some(e) => {
                debug!(task = %e.task, "Encoded request");
                let criteria = if e.completion_criteria.trim().is_empty() {
                    DEFAULT_COMPLETION_CRITERIA.to_string()
                } else {
                    e.completion_criteria
                };
                Ok(Goal::new(e.task.trim(), directive, criteria))
            }
            None => {
                warn!("Task encoding reply unusable, using the prompt as the task");
                DirectGoalEncoder.encode(request, directive).await
            }
        }
    }
}
