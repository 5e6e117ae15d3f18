//! UI block catalog
//!
//! The static set of display contracts the orchestrator may emit. Each
//! definition declares the JSON schema its props must satisfy; the renderer
//! owns the matching components.

use crate::models::UiBlock;
use crate::schema::{self, object_schema, SchemaViolation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PURCHASE_BUTTON: &str = "PURCHASE_BUTTON";
pub const SUMMARY: &str = "SUMMARY";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Display,
    Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiBlockDefinition {
    pub name: String,
    pub description: String,
    pub kind: BlockKind,
    pub props_schema: Value,
}

impl UiBlockDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: BlockKind,
        props_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            props_schema,
        }
    }

    /// Strip undeclared keys, validate what remains and build the block
    pub fn instantiate(&self, props: Value) -> Result<UiBlock, SchemaViolation> {
        let props = schema::retain_declared(props, &self.props_schema);
        schema::validate(&props, &self.props_schema)?;
        Ok(UiBlock {
            name: self.name.clone(),
            description: self.description.clone(),
            props,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseButtonProps {
    pub asset_name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryProps {
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct BlockCatalog {
    blocks: Vec<UiBlockDefinition>,
}

impl BlockCatalog {
    pub fn new(blocks: Vec<UiBlockDefinition>) -> Self {
        Self { blocks }
    }

    pub fn get(&self, name: &str) -> Option<&UiBlockDefinition> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UiBlockDefinition> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Definitions whose name is in `names`, in catalog order, each once
    pub fn select(&self, names: &[String]) -> Vec<&UiBlockDefinition> {
        self.blocks
            .iter()
            .filter(|b| names.iter().any(|n| *n == b.name))
            .collect()
    }

    /// `- NAME: description` lines for prompts
    pub fn menu(&self) -> String {
        self.blocks
            .iter()
            .map(|b| format!("- {}: {}", b.name, b.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for BlockCatalog {
    fn default() -> Self {
        Self::new(vec![
            UiBlockDefinition::new(
                PURCHASE_BUTTON,
                "A Button for purchasing an asset",
                BlockKind::Action,
                object_schema(&[("assetName", "string"), ("quantity", "number")]),
            ),
            UiBlockDefinition::new(
                SUMMARY,
                "Display a summary of the results. Display an explanation of the results",
                BlockKind::Display,
                object_schema(&[("content", "string")]),
            ),
        ])
    }
}
