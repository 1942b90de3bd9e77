//! API routes.

pub mod chat;
pub mod health;
pub mod models;
pub mod reports;

pub use chat::{
    ChatCompletionRequest, ChatCompletionResponse, Choice, ChoiceMessage, chat_completions_handler,
};
pub use health::health_routes;
pub use models::{ModelCard, ModelList, list_models_handler};
pub use reports::download_report_handler;
