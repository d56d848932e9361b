//! Append operations.
//!
//! An append operation answers the live question of a document and writes
//! the reply to the end of the same file. Which text counts as the question
//! is decided by [`QuoteExtractor`](crate::quote::QuoteExtractor).

use crate::chat::{ChatClient, ChatResult};
use crate::config::Config;
use crate::document::{load_document, validate_markdown, AppendWriter};
use crate::operation::{base_vars, log_cost, OperationError, PreparedMessages};
use crate::quote::{QuoteExtraction, QuoteExtractor};
use std::path::Path;
use tracing::info;

/// Name of the built-in question answering operation.
pub const ANSWER_OPERATION: &str = "answer";

/// Written between the document and an appended reply.
const ANSWER_SEPARATOR: &str = "\n\n";

/// System prompt for one-shot questions.
pub const ASK_SYSTEM_PROMPT: &str = "You are a helpful assistant. You are given a question and a context. You need to answer the question based on the context. You need to answer the question in the same language as the question.";

/// What an append operation did.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
    /// The reply was appended to the document.
    Appended(ChatResult),
    /// The document has no live question; nothing was sent.
    Skipped,
}

/// Quote extractor honoring the configured blank characters.
pub fn extractor_for(config: &Config) -> QuoteExtractor {
    QuoteExtractor::new().with_classifier(config.quote.classifier())
}

/// Render the messages for an append operation.
///
/// Returns `Ok(None)` when the operation needs a question and the document
/// has none.
pub fn prepare_append(
    config: &Config,
    operation: &str,
    content: &str,
    extra_args: &[String],
) -> Result<Option<PreparedMessages>, OperationError> {
    let op = config.append_operation(operation)?;
    op.args.validate(extra_args.len())?;

    let mut vars = base_vars(content, extra_args);

    let wants_quote = op
        .user_message
        .variables()
        .iter()
        .any(|name| matches!(*name, "Question" | "Context"));
    if wants_quote {
        let extraction = extractor_for(config).extract(content);
        let Some(question) = extraction.question() else {
            return Ok(None);
        };
        vars.insert("Question".into(), question.to_string());
        vars.insert("Context".into(), extraction.remainder.clone());
    }

    Ok(Some(PreparedMessages {
        system: op.system_prompt(),
        user: op.user_message.render(&vars)?,
    }))
}

/// Render the messages for a one-shot question.
pub fn prepare_ask(extraction: &QuoteExtraction) -> Result<PreparedMessages, OperationError> {
    let question = extraction.question().ok_or(OperationError::NoQuote)?;
    Ok(PreparedMessages {
        system: ASK_SYSTEM_PROMPT.to_string(),
        user: format!("Context: {}\n\nQuestion: {question}", extraction.remainder),
    })
}

/// Run an append operation against `path`.
pub async fn run_append(
    config: &Config,
    client: &ChatClient,
    path: &Path,
    operation: &str,
    extra_args: &[String],
    stream: bool,
) -> Result<AppendOutcome, OperationError> {
    validate_markdown(path)?;
    let content = load_document(path)?;

    let Some(messages) = prepare_append(config, operation, &content, extra_args)? else {
        info!(file = %path.display(), "no live quote found, skipping");
        return Ok(AppendOutcome::Skipped);
    };

    info!(
        model = %client.model(),
        max_tokens = config.default.quality.effective_max_tokens(),
        temperature = config.default.quality.effective_temperature(),
        "using configuration"
    );

    // Nothing is written until reply text arrives.
    let mut writer = AppendWriter::open(path)?;

    let quality = &config.default.quality;
    let result = if stream {
        let mut started = false;
        client
            .complete_streaming(&messages.system, &messages.user, quality, |delta| {
                if !started {
                    writer.write_str(ANSWER_SEPARATOR)?;
                    started = true;
                }
                writer.write_str(delta)
            })
            .await?
    } else {
        let result = client
            .complete(&messages.system, &messages.user, quality)
            .await?;
        writer.write_str(ANSWER_SEPARATOR)?;
        writer.write_str(&result.content)?;
        result
    };

    log_cost(&result);
    Ok(AppendOutcome::Appended(result))
}

/// Ask the live question of `content` and return the reply.
pub async fn run_ask(
    config: &Config,
    client: &ChatClient,
    content: &str,
) -> Result<ChatResult, OperationError> {
    let extraction = extractor_for(config).extract(content);
    let messages = prepare_ask(&extraction)?;
    let result = client
        .complete(&messages.system, &messages.user, &config.default.quality)
        .await?;
    log_cost(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatError, Usage};
    use crate::config::OperationConfig;
    use crate::document::DocumentError;
    use crate::quote::LineSeparator;
    use crate::template::Template;
    use crate::test_server::{serve_once, split_bytes, STREAM_BODY, STREAM_CONTENT};
    use tempfile::TempDir;

    fn sep() -> &'static str {
        LineSeparator::platform().as_str()
    }

    #[test]
    fn test_prepare_answer() {
        let config = Config::default();
        let content = format!("Notes about Rust{}> What is ownership?", sep());
        let messages = prepare_append(&config, ANSWER_OPERATION, &content, &[])
            .unwrap()
            .unwrap();

        assert!(messages.system.starts_with("You are a helpful and detailed assistant."));
        assert_eq!(
            messages.user,
            format!(
                "Context: Notes about Rust{}\n\nQuestion: What is ownership?",
                sep()
            )
        );
    }

    #[test]
    fn test_prepare_answer_without_quote() {
        let config = Config::default();
        let content = format!("> old question{}Some answer text", sep());
        let prepared = prepare_append(&config, ANSWER_OPERATION, &content, &[]).unwrap();
        assert!(prepared.is_none());
    }

    #[test]
    fn test_prepare_append_unknown_operation() {
        let config = Config::default();
        let err = prepare_append(&config, "critique", "> q", &[]).unwrap_err();
        assert!(matches!(err, OperationError::Config(_)));
    }

    #[test]
    fn test_prepare_append_content_only_template() {
        let mut config = Config::default();
        config.append.operations.insert(
            "review".into(),
            OperationConfig {
                system_message: "Review.".into(),
                user_message: Template::new("Review this ({{.Arg0}}):\n{{.Content}}"),
                suffix: None,
                args: crate::config::ArgsConfig {
                    min_count: 1,
                    max_count: 1,
                },
                target_length: 0,
            },
        );

        let messages = prepare_append(&config, "review", "no quotes here", &["brief".into()])
            .unwrap()
            .unwrap();
        assert_eq!(messages.system, "Review.");
        assert_eq!(messages.user, "Review this (brief):\nno quotes here");

        assert!(matches!(
            prepare_append(&config, "review", "x", &[]),
            Err(OperationError::Config(_))
        ));
    }

    #[test]
    fn test_prepare_append_respects_blank_chars() {
        let mut config = Config::default();
        let content = format!("intro{0}> question{0}\u{200B}", sep());
        assert!(prepare_append(&config, ANSWER_OPERATION, &content, &[])
            .unwrap()
            .is_none());

        config.quote.blank_chars = vec!['\u{200B}'];
        let messages = prepare_append(&config, ANSWER_OPERATION, &content, &[])
            .unwrap()
            .unwrap();
        assert!(messages.user.ends_with("Question: question"));
    }

    #[test]
    fn test_prepare_ask() {
        let extraction = QuoteExtraction {
            found: true,
            quote: "Why?".into(),
            remainder: "context\n".into(),
        };
        let messages = prepare_ask(&extraction).unwrap();
        assert_eq!(messages.system, ASK_SYSTEM_PROMPT);
        assert_eq!(messages.user, "Context: context\n\n\nQuestion: Why?");

        let missing = QuoteExtraction::default();
        assert!(matches!(
            prepare_ask(&missing),
            Err(OperationError::NoQuote)
        ));
    }

    fn write_doc(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_append_skips_without_live_quote() {
        let dir = TempDir::new().unwrap();
        let content = format!("> q{}prose", sep());
        let path = write_doc(&dir, "chat.md", &content);
        // Never contacted.
        let client = ChatClient::local("http://127.0.0.1:9/v1");

        let outcome = run_append(&Config::default(), &client, &path, ANSWER_OPERATION, &[], true)
            .await
            .unwrap();

        assert!(matches!(outcome, AppendOutcome::Skipped));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[tokio::test]
    async fn test_run_append_rejects_non_markdown() {
        let dir = TempDir::new().unwrap();
        let path = write_doc(&dir, "chat.txt", "> q");
        let client = ChatClient::local("http://127.0.0.1:9/v1");

        let err = run_append(&Config::default(), &client, &path, ANSWER_OPERATION, &[], true)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OperationError::Document(DocumentError::NotMarkdown(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "> q");
    }

    #[tokio::test]
    async fn test_run_append_streams_reply_into_document() {
        let dir = TempDir::new().unwrap();
        let content = format!("Notes{}> What is ownership?", sep());
        let path = write_doc(&dir, "chat.md", &content);
        let server = serve_once(
            "200 OK",
            "text/event-stream",
            split_bytes(STREAM_BODY, 5),
        )
        .await;
        let client = ChatClient::local(&server.base_url);

        let outcome = run_append(&Config::default(), &client, &path, ANSWER_OPERATION, &[], true)
            .await
            .unwrap();

        let AppendOutcome::Appended(result) = outcome else {
            panic!("expected an appended reply");
        };
        assert_eq!(result.content, STREAM_CONTENT);
        assert_eq!(
            result.usage,
            Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 3,
                total_tokens: 13
            })
        );
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            format!("{content}\n\n{STREAM_CONTENT}")
        );

        let request = server.request.await.unwrap();
        assert!(request.contains("Question: What is ownership?"));
    }

    #[tokio::test]
    async fn test_run_append_without_streaming() {
        let dir = TempDir::new().unwrap();
        let content = "> Why?";
        let path = write_doc(&dir, "chat.md", content);
        let body = r#"{"choices":[{"message":{"content":"Because."}}]}"#;
        let server = serve_once("200 OK", "application/json", split_bytes(body, 8)).await;
        let client = ChatClient::local(&server.base_url);

        let outcome = run_append(&Config::default(), &client, &path, ANSWER_OPERATION, &[], false)
            .await
            .unwrap();

        assert!(matches!(outcome, AppendOutcome::Appended(_)));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "> Why?\n\nBecause."
        );
    }

    #[tokio::test]
    async fn test_run_append_failed_request_leaves_document() {
        let dir = TempDir::new().unwrap();
        let content = "> Why?";
        let path = write_doc(&dir, "chat.md", content);
        let server = serve_once(
            "401 Unauthorized",
            "application/json",
            vec![br#"{"error":"bad key"}"#.to_vec()],
        )
        .await;
        let client = ChatClient::local(&server.base_url);

        let err = run_append(&Config::default(), &client, &path, ANSWER_OPERATION, &[], true)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OperationError::Chat(ChatError::Api { status: 401, .. })
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }
}
