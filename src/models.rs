//! Core data models for the asset agent

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

//
// ================= Goal =================
//

/// Unit of work for one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub task: String,
    pub directive: String,
    pub completion_criteria: String,
    #[serde(default)]
    pub history: Vec<ExecutionStep>,
}

impl Goal {
    pub fn new(
        task: impl Into<String>,
        directive: impl Into<String>,
        completion_criteria: impl Into<String>,
    ) -> Self {
        Self {
            task: task.into(),
            directive: directive.into(),
            completion_criteria: completion_criteria.into(),
            history: Vec::new(),
        }
    }

    /// Append a completed step. History is append-only.
    pub fn record(&mut self, step: ExecutionStep) {
        self.history.push(step);
    }

    /// Textual result of the most recent step, or empty when nothing ran yet
    pub fn latest_result_text(&self) -> String {
        self.history
            .last()
            .map(ExecutionStep::result_text)
            .unwrap_or_default()
    }

    /// Execution stack rendered for prompt construction
    pub fn render_history(&self) -> String {
        render_execution_stack(&self.history)
    }
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub task: String,
    pub task_description: String,
    pub task_result: Value,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionStep {
    pub fn new(
        task: impl Into<String>,
        task_description: impl Into<String>,
        task_result: Value,
    ) -> Self {
        Self {
            task: task.into(),
            task_description: task_description.into(),
            task_result,
            completed_at: Utc::now(),
        }
    }

    /// Strings are used verbatim, everything else as compact JSON
    pub fn result_text(&self) -> String {
        match &self.task_result {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Render history as numbered BEGIN/END blocks
pub fn render_execution_stack(history: &[ExecutionStep]) -> String {
    history
        .iter()
        .enumerate()
        .map(|(i, step)| {
            format!(
                "BEGIN STEP {n}.\n{}.\n{}.\n{}.\nEND STEP {n}.",
                step.task,
                step.task_description,
                step.result_text(),
                n = i + 1,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//
// ================= UI Output =================
//

/// One validated UI instruction for the renderer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiBlock {
    pub name: String,
    pub description: String,
    pub props: Value,
}

impl UiBlock {
    /// Decode props into a renderer-side type
    pub fn props_as<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.props.clone())?)
    }
}

//
// ================= Entry Point I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
}
