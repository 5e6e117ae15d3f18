//! Asset Agent Orchestrator
//!
//! A goal-directed agent for NSE asset questions that:
//! - Asks a reasoning service which oracles can supply context for a task
//! - Consults those oracles and records every result in the goal history
//! - Chooses UI blocks for the result and derives their props
//! - Validates every reasoning reply against a JSON schema before use
//!
//! LOOP:
//! PROMPT → GOAL → GATHER CONTEXT → (COMPLETE?)* → CHOOSE UI BLOCKS → UI BLOCKS

pub mod actions;
pub mod agent;
pub mod api;
pub mod capability;
pub mod config;
pub mod encoder;
pub mod error;
pub mod library;
pub mod llm;
pub mod models;
pub mod oracles;
pub mod schema;
pub mod service;
pub mod ui;

pub use error::{OrchestrationError, Result};

// Re-export common types
pub use models::*;
pub use agent::{Orchestrator, OrchestratorConfig};
pub use library::Library;
