//! Orchestrator core for vulnscope.
//!
//! This crate turns a chat history into an answer by driving the reasoning
//! engine through a bounded tool-call loop over the vulnerability warehouse
//! and the report pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                               │
//! │  - Compacts long histories                                  │
//! │  - Runs the tool-call loop                                  │
//! │  - Guards engine-written SQL                                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!         ┌──────────────┬─────┴────────┬──────────────┐
//!         ▼              ▼              ▼              ▼
//!   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐
//!   │ LlmBackend│  │ToolRegistry│ │ Compactor │  │  Audit    │
//!   │(vulnscope │  │ warehouse │  │ (summary  │  │ (bounded  │
//!   │   -llm)   │  │ + reports │  │   model)  │  │  queue)   │
//!   └───────────┘  └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! # Core Components
//!
//! - [`Orchestrator`]: immutable per-process context answering chat requests
//! - [`QueryValidator`]: lexical guard on engine-written SQL
//! - [`HistoryCompactor`]: summarizes older turns past the threshold
//! - [`AuditRecorder`]: fire-and-forget audit trail

pub mod audit;
pub mod compaction;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod tool;
pub mod tools;
pub mod types;
pub mod validator;

pub use error::{AgentError, Result};
pub use types::{ChatMessage, ChatReply, GenerationSettings};

pub use tool::{
    ParamExt, ParamResult, ParameterValidationError, Tool, ToolContext, ToolKind, ToolRegistry,
};

pub use validator::{DEFAULT_NAMESPACE, QueryRejection, QueryValidator};

pub use compaction::{
    CompactedHistory, CompactionOutcome, CompactorConfig, HistoryCompactor, SUMMARY_INSTRUCTION,
};

pub use audit::{
    AuditChannel, AuditEvent, AuditRecord, AuditRecorder, AuditSink, DEFAULT_AUDIT_CAPACITY,
    WarehouseAuditSink,
};

pub use orchestrator::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_MODEL, Orchestrator, OrchestratorBuilder, OrchestratorConfig,
};

pub use prompt::{build_system_prompt, preload_schemas};
