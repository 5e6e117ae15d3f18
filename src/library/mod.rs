//! Capability registry
//!
//! Holds every known Action and Oracle. Registration needs `&mut Library`,
//! so once the library is shared behind an `Arc` it is read-only; runs can
//! never observe a registration in flight.

use crate::actions::ChooseUiBlockAction;
use crate::capability::{Action, Oracle};
use crate::error::OrchestrationError;
use crate::llm::{create_prompt, string_list, FunctionSpec, PromptMessage, Reasoner};
use crate::models::Goal;
use crate::oracles::{
    AssetPriceOracle, AssetPricesOracle, LatestPressReleasesOracle, MarketData,
    PressReleaseOracle,
};
use crate::schema::string_list_schema;
use crate::ui::BlockCatalog;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub const ORACLE_SELECTION_FUNCTION: &str = "getOracles";

pub struct Library {
    actions: Vec<Arc<dyn Action>>,
    oracles: Vec<Arc<dyn Oracle>>,
    reasoner: Reasoner,
}

impl Library {
    pub fn new(reasoner: Reasoner) -> Self {
        Self {
            actions: Vec::new(),
            oracles: Vec::new(),
            reasoner,
        }
    }

    pub fn add_action(&mut self, action: Arc<dyn Action>) -> Result<&mut Self> {
        self.ensure_unique(action.name())?;
        debug!(action = %action.name(), "Registering action");
        self.actions.push(action);
        Ok(self)
    }

    pub fn add_oracle(&mut self, oracle: Arc<dyn Oracle>) -> Result<&mut Self> {
        self.ensure_unique(oracle.name())?;
        debug!(oracle = %oracle.name(), "Registering oracle");
        self.oracles.push(oracle);
        Ok(self)
    }

    pub fn get_action(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.iter().find(|a| a.name() == name).cloned()
    }

    pub fn get_oracle(&self, name: &str) -> Option<Arc<dyn Oracle>> {
        self.oracles.iter().find(|o| o.name() == name).cloned()
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub fn oracles(&self) -> &[Arc<dyn Oracle>] {
        &self.oracles
    }

    pub fn reasoner(&self) -> &Reasoner {
        &self.reasoner
    }

    /// Ask the reasoning service which oracles are relevant to `goal`.
    ///
    /// Returns registered oracle names only, in registry order and without
    /// duplicates. Malformed replies degrade to an empty list; transport
    /// failures and timeouts are returned as errors.
    pub async fn ask_oracle(&self, goal: &Goal) -> Result<Vec<String>> {
        if self.oracles.is_empty() {
            debug!("No oracles registered, skipping oracle selection");
            return Ok(Vec::new());
        }

        let prompt = create_prompt(
            PromptMessage::system(ORACLE_SELECTION_FUNCTION, self.build_prompt(goal)),
            FunctionSpec::new(
                ORACLE_SELECTION_FUNCTION,
                "Get Oracles to provide context for my task.",
                string_list_schema("oracles"),
            ),
            ORACLE_SELECTION_FUNCTION,
        );

        let response = self.reasoner.complete_structured(&prompt).await?;
        let requested = string_list(response.as_ref(), "oracles");

        let selected: Vec<String> = self
            .oracles
            .iter()
            .map(|o| o.name())
            .filter(|name| requested.iter().any(|r| r == name))
            .map(str::to_string)
            .collect();

        if selected.len() < requested.len() {
            debug!(
                ?requested,
                ?selected,
                "Dropped unknown or duplicate oracle names"
            );
        }

        info!(oracle_count = selected.len(), "Oracle selection complete");

        Ok(selected)
    }

    fn build_prompt(&self, goal: &Goal) -> String {
        let oracle_summary = self
            .oracles
            .iter()
            .map(|o| format!("ORACLE: {}\nDESCRIPTION: {}\n", o.name(), o.description()))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"I AM A HUMAN ASSISTANT, MY PRIME DIRECTIVE IS TO: {}
I'LL END EXECUTION ONCE MY COMPLETION CRITERIA OF {} IS MET.
MY CURRENT TASK IS:
{}
I WANT TO COMPLETE THIS AS LONG AS IT'S ACHIEVABLE BY MY PRIME DIRECTIVE.

FIRST I WANT TO DETERMINE IF THE TASK NEEDS SOME CONTEXT DATA FROM MY ORACLES.
HERE ARE MY ORACLES:
{}
If any of the listed oracles are helpful towards achieving my task add them to the args.
If none of the oracles are useful do not include them."#,
            goal.directive.trim(),
            goal.completion_criteria.trim(),
            goal.task.trim(),
            oracle_summary,
        )
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        let taken = self.actions.iter().any(|a| a.name() == name)
            || self.oracles.iter().any(|o| o.name() == name);

        if taken {
            return Err(OrchestrationError::DuplicateCapability(name.to_string()));
        }
        Ok(())
    }
}

/// Library with the UI-selection action and the market-data oracles
pub fn create_default_library(reasoner: Reasoner, market: Arc<dyn MarketData>) -> Result<Library> {
    let mut library = Library::new(reasoner.clone());

    library
        .add_action(Arc::new(ChooseUiBlockAction::new(reasoner, BlockCatalog::default())))?
        .add_oracle(Arc::new(PressReleaseOracle::new(market.clone())))?
        .add_oracle(Arc::new(LatestPressReleasesOracle::new(market.clone())))?
        .add_oracle(Arc::new(AssetPriceOracle::new(market.clone())))?
        .add_oracle(Arc::new(AssetPricesOracle::new(market)))?;

    Ok(library)
}
