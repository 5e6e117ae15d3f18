//! Request entry point: prompt in, UI blocks out

use crate::agent::Orchestrator;
use crate::encoder::GoalEncoder;
use crate::error::OrchestrationError;
use crate::models::{CompletionRequest, UiBlock};
use crate::Result;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

#[derive(Clone)]
pub struct CompletionService {
    orchestrator: Arc<Orchestrator>,
    encoder: Arc<dyn GoalEncoder>,
}

impl CompletionService {
    pub fn new(orchestrator: Arc<Orchestrator>, encoder: Arc<dyn GoalEncoder>) -> Self {
        Self {
            orchestrator,
            encoder,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Encode the prompt into a goal and run it.
    ///
    /// Resolves with the run's UI blocks (empty when none were produced) or
    /// the error the run reported.
    pub async fn get_completion(&self, request: CompletionRequest) -> Result<Vec<UiBlock>> {
        let goal = self
            .encoder
            .encode(&request.prompt, self.orchestrator.directive())
            .await?;

        info!(task = %goal.task, "Completion requested");

        let (tx, rx) = oneshot::channel();
        self.orchestrator
            .run_with_callback(goal, move |result, error| {
                let _ = tx.send((result, error));
            })
            .await;

        let (result, error) = rx.await.map_err(|_| {
            OrchestrationError::ActionError("run finished without reporting a result".to_string())
        })?;

        match error {
            Some(e) => Err(e),
            None => Ok(result.unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DEFAULT_DIRECTIVE;
    use crate::capability::FnOracle;
    use crate::encoder::DirectGoalEncoder;
    use crate::library::{create_default_library, Library};
    use crate::llm::{MockReasoningService, Reasoner};
    use crate::oracles::StaticMarketData;
    use crate::ui::{PurchaseButtonProps, PURCHASE_BUTTON, SUMMARY};
    use serde_json::{json, Value};
    use tokio_test::{assert_err, assert_ok};

    fn service_over(library: Library) -> CompletionService {
        let orchestrator = Orchestrator::new(Arc::new(library), DEFAULT_DIRECTIVE);
        CompletionService::new(Arc::new(orchestrator), Arc::new(DirectGoalEncoder))
    }

    fn default_service(mock: MockReasoningService) -> (CompletionService, Arc<MockReasoningService>) {
        let mock = Arc::new(mock);
        let library = create_default_library(
            Reasoner::new(mock.clone()),
            Arc::new(StaticMarketData::default()),
        )
        .unwrap();
        (service_over(library), mock)
    }

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt.to_string(),
        }
    }

    #[tokio::test]
    async fn test_buy_safaricom_yields_two_blocks() {
        let (service, mock) = default_service(
            MockReasoningService::new()
                .respond("getOracles", json!({ "oracles": ["GET_ASSET_PRICE"] }))
                .respond("getOracleArgs", json!({ "asset": "Safaricom" }))
                .respond("chooseUIBlocks", json!({ "blocks": ["PURCHASE_BUTTON", "SUMMARY"] }))
                .respond_for("getUIBlockProps", PURCHASE_BUTTON, json!({ "assetName": "Safaricom", "quantity": 10 }))
                .respond_for("getUIBlockProps", SUMMARY, json!({ "content": "Purchasing 10 Safaricom shares." })),
        );

        let blocks = assert_ok!(service.get_completion(request("buy 10 shares of Safaricom")).await);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, PURCHASE_BUTTON);
        assert_eq!(blocks[0].props, json!({ "assetName": "Safaricom", "quantity": 10 }));
        assert_eq!(blocks[1].name, SUMMARY);
        assert_eq!(blocks[1].props, json!({ "content": "Purchasing 10 Safaricom shares." }));

        let button: PurchaseButtonProps = blocks[0].props_as().unwrap();
        assert_eq!(button.quantity, 10.0);

        // The asset price from the oracle reached the UI selection prompt
        let selection = mock
            .calls()
            .into_iter()
            .find(|p| p.function_name == "chooseUIBlocks")
            .unwrap();
        assert!(selection.message.content.contains(r#""symbol":"SCOM""#));
    }

    #[tokio::test]
    async fn test_no_blocks_chosen_resolves_empty() {
        let (service, mock) = default_service(
            MockReasoningService::new()
                .respond("getOracles", json!({ "oracles": [] }))
                .respond("chooseUIBlocks", json!({ "blocks": [] })),
        );

        let blocks = assert_ok!(service.get_completion(request("hello")).await);

        assert!(blocks.is_empty());
        assert_eq!(mock.call_count("getUIBlockProps"), 0);
    }

    #[tokio::test]
    async fn test_failing_oracle_rejects_completion() {
        let mock = Arc::new(
            MockReasoningService::new()
                .respond("getOracles", json!({ "oracles": ["PRICE_FEED"] }))
                .respond("chooseUIBlocks", json!({ "blocks": ["SUMMARY"] })),
        );
        let mut library = create_default_library(
            Reasoner::new(mock.clone()),
            Arc::new(StaticMarketData::default()),
        )
        .unwrap();
        library
            .add_oracle(Arc::new(FnOracle::define(
                "PRICE_FEED",
                "Live price feed",
                Value::Null,
                Value::Null,
                |_| async { Err(OrchestrationError::OracleError("feed unreachable".to_string())) },
            )))
            .unwrap();

        let error = assert_err!(service_over(library).get_completion(request("price of KQ")).await);

        assert!(matches!(error, OrchestrationError::OracleError(m) if m == "feed unreachable"));
        assert_eq!(mock.call_count("chooseUIBlocks"), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected_before_running() {
        let (service, mock) = default_service(MockReasoningService::new());

        let error = assert_err!(service.get_completion(request("  ")).await);

        assert!(matches!(error, OrchestrationError::InvalidInput(_)));
        assert!(mock.calls().is_empty());
    }
}
