//! Tool framework for the orchestrator.
//!
//! This module defines the [`Tool`] trait every engine-callable capability
//! implements, the [`ToolRegistry`] that dispatches by name, and
//! [`ToolKind`], the closed set of tools the orchestrator knows how to
//! post-process.
//!
//! # Example
//!
//! ```rust,ignore
//! use vulnscope_agent::{Tool, ToolContext, ToolRegistry};
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Tool for Ping {
//!     fn name(&self) -> &str { "ping" }
//!     fn description(&self) -> &str { "Answers pong" }
//!     fn parameters(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<Value> {
//!         Ok(json!("pong"))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Ping);
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for tool parameter validation failures.
///
/// The message is fed back to the engine, so it names the parameter and how
/// to fix the call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParameterValidationError {
    /// A required parameter is missing.
    #[error("missing required parameter '{name}': {hint}")]
    MissingRequired {
        name: &'static str,
        hint: &'static str,
    },

    /// A parameter has an invalid type.
    #[error("invalid type for '{name}': expected {expected}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
    },
}

impl ParameterValidationError {
    pub fn missing(name: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { name, hint }
    }

    pub fn invalid_type(name: &'static str, expected: &'static str) -> Self {
        Self::InvalidType { name, expected }
    }
}

impl From<ParameterValidationError> for AgentError {
    fn from(err: ParameterValidationError) -> Self {
        AgentError::Tool(err.to_string())
    }
}

/// Result type for parameter validation.
pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Helper trait for extracting parameters from engine-supplied JSON.
pub trait ParamExt {
    /// Get a required string parameter.
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str>;

    /// Get an optional non-negative integer, accepting integral floats.
    fn optional_u64(&self, name: &'static str, default: u64) -> ParamResult<u64>;
}

impl ParamExt for serde_json::Value {
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => {
                Err(ParameterValidationError::missing(name, hint))
            }
            Some(v) => v
                .as_str()
                .ok_or_else(|| ParameterValidationError::invalid_type(name, "string")),
        }
    }

    fn optional_u64(&self, name: &'static str, default: u64) -> ParamResult<u64> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => Ok(default),
            // Engines often encode integers as floats.
            Some(v) => v
                .as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
                .ok_or_else(|| ParameterValidationError::invalid_type(name, "non-negative integer")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Kind
// ─────────────────────────────────────────────────────────────────────────────

/// The tools the orchestrator advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListTables,
    GetTableSchema,
    RunSql,
    GenerateReport,
    ApplicationReport,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::ListTables,
        ToolKind::GetTableSchema,
        ToolKind::RunSql,
        ToolKind::GenerateReport,
        ToolKind::ApplicationReport,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListTables => "list_tables",
            ToolKind::GetTableSchema => "get_table_schema",
            ToolKind::RunSql => "run_sql",
            ToolKind::GenerateReport => "generate_report",
            ToolKind::ApplicationReport => "application_report",
        }
    }

    /// Report tools return a download URL the loop wraps for the engine.
    pub fn is_report(self) -> bool {
        matches!(self, ToolKind::GenerateReport | ToolKind::ApplicationReport)
    }

    /// Tools whose `sql` argument passes the query guard before execution.
    pub fn is_query(self) -> bool {
        matches!(self, ToolKind::RunSql)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for engine-callable tools.
///
/// Each tool describes its parameters as a JSON Schema and returns a JSON
/// payload. An `Err` is reported back to the engine as `{"error": ...}`
/// rather than failing the request.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the engine calls this tool by.
    fn name(&self) -> &str;

    /// What the tool does, written for the engine.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<serde_json::Value>;
}

/// Per-call context handed to tools.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Conversation the call belongs to.
    pub conversation_id: String,
}

impl ToolContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of available tools, looked up by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Engine-facing definitions, sorted by name.
    pub fn to_llm_definitions(&self) -> Vec<vulnscope_llm::ToolDefinition> {
        let mut defs: Vec<_> = self
            .tools
            .values()
            .map(|tool| {
                vulnscope_llm::ToolDefinition::new(tool.name(), tool.description(), tool.parameters())
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        tool.execute(params, ctx).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
