//! Transform operations.
//!
//! A transform sends the whole document to the model and writes the reply
//! to a new file next to it, named by the operation's suffix template
//! (`guide.md` → `guide_sum.md`, `guide_ja.md`, ...).

use crate::chat::{ChatClient, ChatResult};
use crate::config::Config;
use crate::document::{load_document, output_path, validate_markdown};
use crate::operation::{arg_vars, base_vars, log_cost, OperationError, PreparedMessages};
use std::path::{Path, PathBuf};
use tracing::info;

/// Supported language codes and their display names.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("ja", "Japanese (日本語)"),
    ("zh", "Chinese (中文)"),
    ("ko", "Korean (한국어)"),
    ("es", "Spanish (Español)"),
    ("fr", "French (Français)"),
    ("de", "German (Deutsch)"),
    ("it", "Italian (Italiano)"),
    ("pt", "Portuguese (Português)"),
    ("ru", "Russian (Русский)"),
    ("ar", "Arabic (العربية)"),
    ("hi", "Hindi (हिन्दी)"),
    ("th", "Thai (ไทย)"),
    ("vi", "Vietnamese (Tiếng Việt)"),
    ("nl", "Dutch (Nederlands)"),
    ("sv", "Swedish (Svenska)"),
    ("no", "Norwegian (Norsk)"),
    ("da", "Danish (Dansk)"),
    ("fi", "Finnish (Suomi)"),
    ("pl", "Polish (Polski)"),
    ("tr", "Turkish (Türkçe)"),
    ("he", "Hebrew (עברית)"),
    ("id", "Indonesian (Bahasa Indonesia)"),
    ("ms", "Malay (Bahasa Melayu)"),
    ("ca", "Catalan (Català)"),
];

/// Whether `code` is a supported language code (case-insensitive).
pub fn is_valid_language_code(code: &str) -> bool {
    LANGUAGES
        .iter()
        .any(|(c, _)| c.eq_ignore_ascii_case(code))
}

/// Display name for a language code; unknown codes are returned unchanged.
pub fn language_name(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map_or(code, |&(_, name)| name)
}

/// Messages and output location for a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransform {
    pub messages: PreparedMessages,
    pub output: PathBuf,
}

/// Render the messages and output path for a transform of `path`.
pub fn prepare_transform(
    config: &Config,
    operation: &str,
    path: &Path,
    content: &str,
    extra_args: &[String],
) -> Result<PreparedTransform, OperationError> {
    let op = config.transform_operation(operation)?;
    op.args.validate(extra_args.len())?;

    let mut vars = base_vars(content, extra_args);
    if op.user_message.variables().contains(&"TargetLanguage") {
        let code = extra_args.first().map(String::as_str).unwrap_or_default();
        if !is_valid_language_code(code) {
            return Err(OperationError::InvalidLanguage(code.to_string()));
        }
        vars.insert("TargetLanguage".into(), language_name(code).to_string());
    }

    let suffix = match &op.suffix {
        Some(template) => template.render(&arg_vars(extra_args))?,
        None => format!("_{operation}"),
    };

    Ok(PreparedTransform {
        messages: PreparedMessages {
            system: op.system_prompt(),
            user: op.user_message.render(&vars)?,
        },
        output: output_path(path, &suffix),
    })
}

/// What a transform produced.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    /// File the reply was written to.
    pub output: PathBuf,
    /// The model reply.
    pub result: ChatResult,
}

/// Run a transform operation against `path`.
pub async fn run_transform(
    config: &Config,
    client: &ChatClient,
    path: &Path,
    operation: &str,
    extra_args: &[String],
) -> Result<TransformOutcome, OperationError> {
    validate_markdown(path)?;
    let content = load_document(path)?;
    let prepared = prepare_transform(config, operation, path, &content, extra_args)?;

    info!(
        operation,
        model = %client.model(),
        max_tokens = config.default.quality.effective_max_tokens(),
        temperature = config.default.quality.effective_temperature(),
        "using configuration"
    );

    let result = client
        .complete(
            &prepared.messages.system,
            &prepared.messages.user,
            &config.default.quality,
        )
        .await?;
    log_cost(&result);

    tokio::fs::write(&prepared.output, &result.content).await?;
    info!(
        input = %path.display(),
        output = %prepared.output.display(),
        "transformation completed successfully"
    );

    Ok(TransformOutcome {
        output: prepared.output,
        result,
    })
}
