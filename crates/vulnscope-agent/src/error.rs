//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Reasoning-engine error.
    #[error("{0}")]
    Llm(#[from] vulnscope_llm::LlmError),

    /// A proposed query failed the guard.
    #[error("{0}")]
    Validation(String),

    /// The engine requested a tool that is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// No user-authored message survived history preparation.
    #[error("No user message provided.")]
    NoUserMessage,

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The tool-call loop ran past its bound.
    #[error("Maximum tool-call iterations ({0}) exceeded")]
    MaxIterations(u32),
}

impl AgentError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller's request (or the engine's proposal on its behalf)
    /// is at fault, as opposed to a failure on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::UnknownTool(_) | Self::NoUserMessage
        )
    }
}

impl From<vulnscope_warehouse::WarehouseError> for AgentError {
    fn from(err: vulnscope_warehouse::WarehouseError) -> Self {
        AgentError::Tool(err.to_string())
    }
}

impl From<vulnscope_reports::ReportError> for AgentError {
    fn from(err: vulnscope_reports::ReportError) -> Self {
        AgentError::Tool(err.to_string())
    }
}
