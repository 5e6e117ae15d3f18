//! Main orchestrator
//!
//! INIT → GATHER CONTEXT → (COMPLETE? → GATHER CONTEXT)* → CHOOSE OUTPUT → DONE
//!
//! Gathering asks the library which oracles are relevant, consults them and
//! folds each result into the goal's history. With the default config this
//! happens once; `max_planning_rounds > 1` lets the reasoning service judge
//! the completion criterion between rounds. UI selection always runs exactly
//! once, after gathering.

use crate::actions::{ChooseUiBlockInput, ChooseUiBlockOutput, CHOOSE_UI_BLOCK};
use crate::capability::{consult_oracle, invoke_action, Oracle};
use crate::error::OrchestrationError;
use crate::library::Library;
use crate::llm::{create_prompt, FunctionSpec, PromptMessage};
use crate::models::{ExecutionStep, Goal, UiBlock};
use crate::schema;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const ORACLE_ARGS_FUNCTION: &str = "getOracleArgs";
pub const COMPLETION_CHECK_FUNCTION: &str = "checkCompletion";

pub const DEFAULT_DIRECTIVE: &str = "I help humans gain understanding about securities trading on the \
Nairobi Securities Exchange (NSE) by providing them with information about the assets they are curious about. \
I can get for them data from press releases, and I can also get them the price of a specific asset, or even \
all the assets on the NSE. After I have collected relevant information, I also choose the UI components to \
display the information to the user. If the user's request includes an action word like buy, I need to \
provide them with a UI block to complete this action as well as a summary of any financial information \
regarding the asset.";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Context-gathering rounds per run; 1 is a single pass
    pub max_planning_rounds: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_planning_rounds: 1,
        }
    }
}

/// Drives one goal from request to UI blocks
pub struct Orchestrator {
    library: Arc<Library>,
    directive: String,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(library: Arc<Library>, directive: impl Into<String>) -> Self {
        Self {
            library,
            directive: directive.into(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// Run a goal to completion
    pub async fn run(&self, goal: Goal) -> Result<Vec<UiBlock>> {
        let mut goal = goal;
        self.drive(&mut goal).await
    }

    /// Callback form: exactly one of the two arguments is `Some`
    pub async fn run_with_callback<F>(&self, goal: Goal, callback: F)
    where
        F: FnOnce(Option<Vec<UiBlock>>, Option<OrchestrationError>),
    {
        match self.run(goal).await {
            Ok(blocks) => callback(Some(blocks), None),
            Err(e) => callback(None, Some(e)),
        }
    }

    /// Run a goal in place; its history holds every completed step afterwards
    pub async fn drive(&self, goal: &mut Goal) -> Result<Vec<UiBlock>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("orchestration", %run_id);

        async move {
            let start = Instant::now();

            // The prime directive belongs to the orchestrator, not the request
            if goal.directive != self.directive {
                debug!("Replacing goal directive with the orchestrator's");
                goal.directive = self.directive.clone();
            }

            info!(task = %goal.task, "Orchestrator: starting run");

            let rounds = self.config.max_planning_rounds.max(1);
            for round in 1..=rounds {
                let consulted = self.gather_context(goal).await?;

                debug!(round, consulted, "Context gathering round complete");

                if round == rounds {
                    break;
                }
                if consulted == 0 {
                    debug!("No new context gathered, ending gathering");
                    break;
                }
                if self.is_complete(goal).await? {
                    debug!(round, "Completion criteria met");
                    break;
                }
            }

            let blocks = self.choose_output(goal).await?;

            info!(
                blocks = blocks.len(),
                steps = goal.history.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Orchestrator: run complete"
            );

            Ok(blocks)
        }
        .instrument(span)
        .await
    }

    /// Consult every relevant oracle; returns how many contributed
    async fn gather_context(&self, goal: &mut Goal) -> Result<usize> {
        let names = self.library.ask_oracle(goal).await?;
        let mut consulted = 0;

        for name in names {
            let Some(oracle) = self.library.get_oracle(&name) else {
                debug!(oracle = %name, "Oracle not registered, skipping");
                continue;
            };

            let Some(args) = self.derive_oracle_args(oracle.as_ref(), goal).await? else {
                warn!(oracle = %name, "Skipping oracle: could not derive valid arguments");
                continue;
            };

            let result = consult_oracle(oracle.as_ref(), args).await.map_err(|e| {
                error!(oracle = %name, error = %e, "Oracle failed");
                e
            })?;

            debug!(oracle = %name, "Oracle consulted");

            goal.record(ExecutionStep::new(
                oracle.name(),
                oracle.description(),
                result,
            ));
            consulted += 1;
        }

        Ok(consulted)
    }

    /// Oracles without declared input properties get the task text.
    /// `Ok(None)` when the reasoning service cannot produce valid arguments.
    async fn derive_oracle_args(&self, oracle: &dyn Oracle, goal: &Goal) -> Result<Option<Value>> {
        let input_schema = &oracle.descriptor().input_schema;

        if !schema::declares_properties(input_schema) {
            return Ok(Some(json!({ "task": goal.task })));
        }

        let content = format!(
            r#"<instructions>
Determine the arguments to call the oracle {}: {}
Use only information present in the task or the <execution-stack/>.
</instructions>
<original-task>
{}
</original-task>
<prime-directive>
{}
</prime-directive>

<execution-stack>
{}
</execution-stack>"#,
            oracle.name(),
            oracle.description(),
            goal.task.trim(),
            goal.directive.trim(),
            goal.render_history(),
        );

        let prompt = create_prompt(
            PromptMessage::system(ORACLE_ARGS_FUNCTION, content),
            FunctionSpec::new(
                ORACLE_ARGS_FUNCTION,
                format!("Get arguments for {}", oracle.name()),
                input_schema.clone(),
            ),
            ORACLE_ARGS_FUNCTION,
        );

        let Some(args) = self.library.reasoner().complete_structured(&prompt).await? else {
            return Ok(None);
        };
        let args = schema::retain_declared(args, input_schema);

        match schema::validate(&args, input_schema) {
            Ok(()) => Ok(Some(args)),
            Err(violation) => {
                warn!(oracle = %oracle.name(), %violation, "Oracle arguments failed validation");
                Ok(None)
            }
        }
    }

    /// Malformed replies count as complete so the run moves on
    async fn is_complete(&self, goal: &Goal) -> Result<bool> {
        let content = format!(
            r#"<instructions>
Decide whether the completion criteria is met by the information in the <execution-stack/>.
</instructions>
<original-task>
{}
</original-task>
<completion-criteria>
{}
</completion-criteria>

<execution-stack>
{}
</execution-stack>"#,
            goal.task.trim(),
            goal.completion_criteria.trim(),
            goal.render_history(),
        );

        let prompt = create_prompt(
            PromptMessage::system(COMPLETION_CHECK_FUNCTION, content),
            FunctionSpec::new(
                COMPLETION_CHECK_FUNCTION,
                "Check whether the task is complete",
                json!({
                    "type": "object",
                    "properties": { "complete": { "type": "boolean" } },
                    "required": ["complete"]
                }),
            ),
            COMPLETION_CHECK_FUNCTION,
        );

        let response = self.library.reasoner().complete_structured(&prompt).await?;

        Ok(response
            .as_ref()
            .and_then(|v| v.get("complete"))
            .and_then(Value::as_bool)
            .unwrap_or(true))
    }

    async fn choose_output(&self, goal: &mut Goal) -> Result<Vec<UiBlock>> {
        let action = self
            .library
            .get_action(CHOOSE_UI_BLOCK)
            .ok_or_else(|| OrchestrationError::ActionNotFound(CHOOSE_UI_BLOCK.to_string()))?;

        let input = ChooseUiBlockInput {
            response: goal.latest_result_text(),
            original_task: goal.task.clone(),
            prime_directive: goal.directive.clone(),
            context: goal.render_history(),
        };

        let output = invoke_action(action.as_ref(), serde_json::to_value(&input)?, goal)
            .await
            .map_err(|e| {
                error!(action = CHOOSE_UI_BLOCK, error = %e, "UI selection failed");
                e
            })?;

        let parsed: ChooseUiBlockOutput = serde_json::from_value(output.clone()).map_err(|e| {
            OrchestrationError::ActionError(format!(
                "{} returned malformed output: {}",
                CHOOSE_UI_BLOCK, e
            ))
        })?;

        goal.record(ExecutionStep::new(action.name(), action.description(), output));

        Ok(parsed.ui_blocks)
    }
}
