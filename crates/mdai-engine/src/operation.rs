//! Types shared by append and transform operations.

use crate::chat::{ChatError, ChatResult};
use crate::config::ConfigError;
use crate::document::DocumentError;
use crate::pricing::find_model;
use crate::template::{TemplateError, TemplateVars};
use tracing::{info, warn};

/// System and user messages ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMessages {
    pub system: String,
    pub user: String,
}

/// Template variables for the document content and extra arguments.
///
/// Arguments are exposed as `Arg0`, `Arg1`, ...
pub fn base_vars(content: &str, extra_args: &[String]) -> TemplateVars {
    let mut vars = arg_vars(extra_args);
    vars.insert("Content".into(), content.to_string());
    vars
}

/// Template variables for extra arguments only.
pub fn arg_vars(extra_args: &[String]) -> TemplateVars {
    extra_args
        .iter()
        .enumerate()
        .map(|(i, arg)| (format!("Arg{i}"), arg.clone()))
        .collect()
}

/// Log the cost of a finished request. Unknown models only produce a warning.
pub fn log_cost(result: &ChatResult) {
    let Some(usage) = result.usage else {
        info!(model = %result.model, duration_ms = result.duration_ms, "no usage reported");
        return;
    };

    match find_model(&result.model) {
        Ok(pricing) => {
            let cost = pricing.cost(usage.prompt_tokens, usage.completion_tokens);
            info!(
                cost = %cost,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                duration_ms = result.duration_ms,
                "cost information"
            );
        }
        Err(e) => warn!(error = %e, "cost calculation skipped"),
    }
}

/// Errors from running an operation.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("fail in creating message: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    /// No live quote at the end of the document.
    #[error("no quote (line starting with >) found")]
    NoQuote,

    /// Language code not in the supported list.
    #[error("invalid language code: {0}. Please use standard language codes like 'en', 'ja', 'zh', etc.")]
    InvalidLanguage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
