//! mdai-engine: Markdown question answering with chat models
//!
//! This crate provides the core logic for mdai, including:
//! - Extraction of the live quoted question at the end of a document
//! - Configuration and prompt templates for append and transform operations
//! - An OpenAI-compatible chat client with streaming support
//! - Model pricing and cost accounting
//! - Watch mode that answers on every save

pub mod append;
pub mod chat;
pub mod config;
pub mod document;
pub mod operation;
pub mod pricing;
pub mod quote;
pub mod template;
pub mod transform;
pub mod watch;

#[cfg(test)]
mod test_server;

// Re-export commonly used types
pub use append::{run_append, run_ask, AppendOutcome, ANSWER_OPERATION};
pub use chat::{ChatClient, ChatError, ChatResult, Usage};
pub use config::{init_config, Config, ConfigError, InitOutcome};
pub use document::{append_answer, DocumentError};
pub use operation::OperationError;
pub use pricing::{find_model, CostReport, ModelPricing, MODELS};
pub use quote::{extract_last_quote, LineSeparator, QuoteExtraction, QuoteExtractor};
pub use template::{Template, TemplateError};
pub use transform::{run_transform, TransformOutcome};
pub use watch::{watch_file, watch_file_until, WatchError, WatchExit, WatchOptions};

/// Returns the engine version.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
