//! Reasoning-engine client abstraction for vulnscope.
//!
//! The orchestrator treats the engine as a black box mapping conversation
//! state to either a final answer or a single function-call request. This
//! crate defines that contract and its provider implementations.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!     ┌─────────┐       ┌──────────────┐
//!     │ Gemini  │       │ OpenAI-compat│
//!     └─────────┘       └──────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod types;

// Provider implementations
pub mod gemini;
pub mod openai;

pub use backend::{LlmBackend, SharedBackend, with_retry};
#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, MockResponse};
pub use error::{LlmError, RateLimitInfo, Result};
pub use types::{
    CompletionRequest, CompletionResponse, Content, ContentBlock, Message, Role, StopReason,
    ToolDefinition, ToolResultBlock, ToolUseBlock, Usage,
};

pub use gemini::{GeminiBackend, GeminiConfig};
pub use openai::{OpenAiBackend, OpenAiConfig};
