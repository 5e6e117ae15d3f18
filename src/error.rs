//! Error types for the asset agent orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Capability Errors
    // =============================

    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("Action error: {0}")]
    ActionError(String),

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Capability already registered: {0}")]
    DuplicateCapability(String),

    #[error("Capability panicked: {0}")]
    CapabilityPanicked(String),

    #[error("Invalid capability input: {0}")]
    InvalidInput(String),

    // =============================
    // Reasoning Service Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Reasoning service timed out after {0} ms")]
    ReasoningTimeout(u64),

    // =============================
    // Data / Environment
    // =============================

    #[error("Market data error: {0}")]
    MarketDataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}
