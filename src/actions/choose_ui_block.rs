//! CHOOSE_UI_BLOCK: pick UI blocks for a result and populate their props
//!
//! Two phases against the reasoning service:
//! 1. one `chooseUIBlocks` call selecting block names from the catalog
//! 2. one `getUIBlockProps` call per chosen block, dispatched concurrently,
//!    each reply validated against that block's props schema
//!
//! Malformed replies and invalid props drop only the affected block.

use crate::capability::{Action, CapabilityDescriptor};
use crate::error::OrchestrationError;
use crate::llm::{create_prompt, string_list, FunctionSpec, PromptMessage, Reasoner};
use crate::models::{Goal, UiBlock};
use crate::schema::{object_schema, string_list_schema};
use crate::ui::{BlockCatalog, UiBlockDefinition};
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const CHOOSE_UI_BLOCK: &str = "CHOOSE_UI_BLOCK";
pub const BLOCK_SELECTION_FUNCTION: &str = "chooseUIBlocks";
pub const BLOCK_PROPS_FUNCTION: &str = "getUIBlockProps";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooseUiBlockInput {
    /// Textual result of the latest step
    pub response: String,
    pub original_task: String,
    pub prime_directive: String,
    /// Rendered execution stack
    pub context: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooseUiBlockOutput {
    pub ui_blocks: Vec<UiBlock>,
}

pub struct ChooseUiBlockAction {
    descriptor: CapabilityDescriptor,
    reasoner: Reasoner,
    catalog: BlockCatalog,
}

impl ChooseUiBlockAction {
    pub fn new(reasoner: Reasoner, catalog: BlockCatalog) -> Self {
        let output_schema = json!({
            "type": "object",
            "properties": {
                "uiBlocks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "props", "description"],
                        "properties": {
                            "name": { "type": "string" },
                            "description": { "type": "string" }
                        }
                    }
                }
            },
            "required": ["uiBlocks"]
        });

        Self {
            descriptor: CapabilityDescriptor::new(
                CHOOSE_UI_BLOCK,
                "Choose a UI block to display, and determine the props to pass to it, based on the \
                 result of the task. There can be multiple UI blocks, chosen especially if the user \
                 asks to buy an asset",
                output_schema,
                object_schema(&[
                    ("response", "string"),
                    ("originalTask", "string"),
                    ("primeDirective", "string"),
                    ("context", "string"),
                ]),
            ),
            reasoner,
            catalog,
        }
    }

    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    async fn choose_blocks(&self, input: &ChooseUiBlockInput) -> Result<Vec<String>> {
        let content = format!(
            r#"<instructions>
choose a single or multiple UI Blocks to correctly display, and provide interactions for the following content:
original task: {}
prime directive: {}
</instructions>

<execution-stack>
{}
</execution-stack>

<previous-response>
{}
</previous-response>

Here are the available UI Blocks:
<options>
{}
</options>"#,
            input.original_task.trim(),
            input.prime_directive.trim(),
            input.context,
            input.response,
            self.catalog.menu(),
        );

        let prompt = create_prompt(
            PromptMessage::system(BLOCK_SELECTION_FUNCTION, content),
            FunctionSpec::new(
                BLOCK_SELECTION_FUNCTION,
                "Choose UI Blocks to display",
                string_list_schema("blocks"),
            ),
            BLOCK_SELECTION_FUNCTION,
        );

        let response = self.reasoner.complete_structured(&prompt).await?;
        Ok(string_list(response.as_ref(), "blocks"))
    }

    /// `Ok(None)` when the reply is malformed or fails validation
    async fn derive_props(
        &self,
        block: &UiBlockDefinition,
        input: &ChooseUiBlockInput,
    ) -> Result<Option<UiBlock>> {
        let content = format!(
            r#"<instructions>
Determine what props can be derived from this content for the UI Block {}: {} to be displayed to the user.
Use data from the <execution-stack/> or the <previous-results/>
</instructions>
<original-task>
{}
</original-task>
<prime-directive>
prime directive: {}
</prime-directive>

<execution-stack>
{}
</execution-stack>

<previous-results>
{}
</previous-results>"#,
            block.name,
            block.description,
            input.original_task.trim(),
            input.prime_directive.trim(),
            input.context,
            input.response,
        );

        let prompt = create_prompt(
            PromptMessage::system(BLOCK_PROPS_FUNCTION, content),
            FunctionSpec::new(
                BLOCK_PROPS_FUNCTION,
                format!("Get UI Block Props for {}", block.name),
                block.props_schema.clone(),
            ),
            BLOCK_PROPS_FUNCTION,
        );

        let Some(props) = self.reasoner.complete_structured(&prompt).await? else {
            warn!(block = %block.name, "Dropping block: props reply was not JSON");
            return Ok(None);
        };

        match block.instantiate(props) {
            Ok(ui_block) => Ok(Some(ui_block)),
            Err(violation) => {
                warn!(block = %block.name, %violation, "Dropping block: props failed validation");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Action for ChooseUiBlockAction {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn perform(&self, input: Value, goal: &Goal) -> Result<Value> {
        let input: ChooseUiBlockInput = serde_json::from_value(input).map_err(|e| {
            OrchestrationError::InvalidInput(format!("{} input: {}", CHOOSE_UI_BLOCK, e))
        })?;

        debug!(task = %goal.task, steps = goal.history.len(), "Choosing UI blocks");

        let names = self.choose_blocks(&input).await?;
        let chosen = self.catalog.select(&names);

        if chosen.is_empty() {
            info!(?names, "No known UI blocks chosen");
            return Ok(serde_json::to_value(ChooseUiBlockOutput::default())?);
        }

        let derived = join_all(chosen.iter().map(|block| self.derive_props(block, &input))).await;

        let mut ui_blocks = Vec::with_capacity(derived.len());
        for result in derived {
            if let Some(block) = result? {
                ui_blocks.push(block);
            }
        }

        info!(
            chosen = chosen.len(),
            rendered = ui_blocks.len(),
            "UI block selection complete"
        );

        Ok(serde_json::to_value(ChooseUiBlockOutput { ui_blocks })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::invoke_action;
    use crate::llm::MockReasoningService;
    use crate::ui::{PURCHASE_BUTTON, SUMMARY};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn action(service: MockReasoningService) -> (ChooseUiBlockAction, Arc<MockReasoningService>) {
        let service = Arc::new(service);
        (
            ChooseUiBlockAction::new(Reasoner::new(service.clone()), BlockCatalog::default()),
            service,
        )
    }

    fn input() -> Value {
        json!({
            "response": "Safaricom trades at 10.00 KES",
            "originalTask": "buy 10 shares of Safaricom",
            "primeDirective": "help NSE traders",
            "context": "BEGIN STEP 1.\nGET_ASSET_PRICE.\n...\nEND STEP 1."
        })
    }

    async fn run(action: &ChooseUiBlockAction) -> Result<ChooseUiBlockOutput> {
        let goal = Goal::new("buy 10 shares of Safaricom", "help NSE traders", "done");
        let value = invoke_action(action, input(), &goal).await?;
        Ok(serde_json::from_value(value)?)
    }

    #[tokio::test]
    async fn test_chosen_blocks_are_populated() {
        let (action, service) = action(
            MockReasoningService::new()
                .respond("chooseUIBlocks", json!({ "blocks": ["SUMMARY", "PURCHASE_BUTTON"] }))
                .respond_for("getUIBlockProps", PURCHASE_BUTTON, json!({ "assetName": "Safaricom", "quantity": 10 }))
                .respond_for("getUIBlockProps", SUMMARY, json!({ "content": "Purchasing 10 Safaricom shares." })),
        );

        let output = run(&action).await.unwrap();

        assert_eq!(output.ui_blocks.len(), 2);
        assert_eq!(output.ui_blocks[0].name, PURCHASE_BUTTON);
        assert_eq!(output.ui_blocks[0].props, json!({ "assetName": "Safaricom", "quantity": 10 }));
        assert_eq!(output.ui_blocks[1].name, SUMMARY);
        assert_eq!(service.call_count("getUIBlockProps"), 2);

        let selection = &service.calls()[0];
        assert!(selection.message.content.contains("- PURCHASE_BUTTON: A Button"));
        assert!(selection.message.content.contains("Safaricom trades at 10.00 KES"));
    }

    #[tokio::test]
    async fn test_empty_or_malformed_selection_short_circuits() {
        for reply in [r#"{"blocks": []}"#, "nonsense", r#"{"blocks": ["CHART"]}"#] {
            let (action, service) = action(MockReasoningService::new().respond_raw("chooseUIBlocks", reply));

            let output = run(&action).await.unwrap();

            assert!(output.ui_blocks.is_empty(), "reply {:?}", reply);
            assert_eq!(service.call_count("getUIBlockProps"), 0);
        }
    }

    #[tokio::test]
    async fn test_invalid_props_drop_only_that_block() {
        let (action, _) = action(
            MockReasoningService::new()
                .respond("chooseUIBlocks", json!({ "blocks": ["PURCHASE_BUTTON", "SUMMARY"] }))
                .respond_for("getUIBlockProps", PURCHASE_BUTTON, json!({ "assetName": "Safaricom", "quantity": "ten" }))
                .respond_for("getUIBlockProps", SUMMARY, json!({ "content": "Safaricom is at 10 KES." })),
        );

        let output = run(&action).await.unwrap();

        assert_eq!(output.ui_blocks.len(), 1);
        assert_eq!(output.ui_blocks[0].name, SUMMARY);
    }

    #[tokio::test]
    async fn test_undeclared_props_are_stripped() {
        let (action, _) = action(
            MockReasoningService::new()
                .respond("chooseUIBlocks", json!({ "blocks": ["SUMMARY"] }))
                .respond_for(
                    "getUIBlockProps",
                    SUMMARY,
                    json!({ "content": "Safaricom is at 10 KES.", "tone": "neutral" }),
                ),
        );

        let output = run(&action).await.unwrap();

        assert_eq!(output.ui_blocks.len(), 1);
        assert_eq!(output.ui_blocks[0].name, SUMMARY);
        assert_eq!(output.ui_blocks[0].props, json!({ "content": "Safaricom is at 10 KES." }));
    }

    #[tokio::test]
    async fn test_props_are_derived_concurrently() {
        let latency = Duration::from_millis(100);
        let (action, service) = action(
            MockReasoningService::new()
                .respond("chooseUIBlocks", json!({ "blocks": ["SUMMARY", "PURCHASE_BUTTON"] }))
                .respond_for("getUIBlockProps", PURCHASE_BUTTON, json!({ "assetName": "Safaricom", "quantity": 10 }))
                .respond_for("getUIBlockProps", SUMMARY, json!({ "content": "Purchasing 10 Safaricom shares." }))
                .with_latency(latency),
        );

        let start = Instant::now();
        let output = run(&action).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(output.ui_blocks.len(), 2);
        assert_eq!(service.call_count("getUIBlockProps"), 2);
        // One selection round trip plus one shared round for both props calls;
        // sequential derivation would take three.
        assert!(elapsed >= latency * 2, "took {:?}", elapsed);
        assert!(elapsed < latency * 2 + Duration::from_millis(80), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_non_json_props_drop_block() {
        let (action, _) = action(
            MockReasoningService::new()
                .respond("chooseUIBlocks", json!({ "blocks": ["SUMMARY"] }))
                .respond_raw("getUIBlockProps", "I cannot help with that"),
        );

        let output = run(&action).await.unwrap();

        assert!(output.ui_blocks.is_empty());
    }

    #[tokio::test]
    async fn test_props_transport_failure_fails_action() {
        let (action, _) = action(
            MockReasoningService::new()
                .respond("chooseUIBlocks", json!({ "blocks": ["SUMMARY"] }))
                .fail("getUIBlockProps", "connection reset"),
        );

        let result = run(&action).await;

        assert!(matches!(result, Err(OrchestrationError::LlmError(_))));
    }

    #[tokio::test]
    async fn test_bad_input_is_rejected() {
        let (action, service) = action(MockReasoningService::new());
        let goal = Goal::new("t", "d", "c");

        let result = invoke_action(&action, json!({ "response": 1 }), &goal).await;

        assert!(matches!(result, Err(OrchestrationError::InvalidInput(_))));
        assert!(service.calls().is_empty());
    }
}
