//! Configuration types for mdai.
//!
//! The configuration lives in `~/.mdai/config.yml` and defines the model
//! settings plus the prompts used by each append and transform operation.
//! Every section has built-in defaults, so a missing file is not an error.

use crate::quote::LineClassifier;
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory under the home directory holding the config file.
pub const CONFIG_DIR: &str = ".mdai";

/// Config file name.
pub const CONFIG_FILE: &str = "config.yml";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default maximum completion tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Main configuration for mdai.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model and runtime settings.
    #[serde(default)]
    pub default: DefaultConfig,

    /// Quote detection settings.
    #[serde(default)]
    pub quote: QuoteConfig,

    /// Operations that append to the source document.
    #[serde(default = "default_append_operations")]
    pub append: OperationSet,

    /// Operations that write a new document next to the source.
    #[serde(default = "default_transform_operations")]
    pub transform: OperationSet,

    /// Watch mode settings.
    #[serde(default)]
    pub watch: WatchSettings,
}

/// Model and runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Model identifier sent to the API.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling settings.
    #[serde(default)]
    pub quality: QualityConfig,

    /// Log level (`debug`, `info`, `warn`, `error`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Wait for the whole reply instead of streaming it.
    #[serde(default)]
    pub disable_stream: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            quality: QualityConfig::default(),
            log_level: default_log_level(),
            disable_stream: false,
        }
    }
}

impl DefaultConfig {
    /// The configured log level; unknown values fall back to `info`.
    pub fn level(&self) -> tracing::Level {
        match self.log_level.to_ascii_lowercase().as_str() {
            "debug" => tracing::Level::DEBUG,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }
}

/// Sampling settings. Zero values mean "use the default".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Maximum completion tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl QualityConfig {
    /// Maximum tokens, substituting the default for zero.
    pub fn effective_max_tokens(&self) -> u32 {
        if self.max_tokens == 0 {
            DEFAULT_MAX_TOKENS
        } else {
            self.max_tokens
        }
    }

    /// Temperature, substituting the default for zero.
    #[allow(clippy::float_cmp)]
    pub fn effective_temperature(&self) -> f64 {
        if self.temperature == 0.0 {
            DEFAULT_TEMPERATURE
        } else {
            self.temperature
        }
    }
}

/// Quote detection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Characters treated as blank in addition to white space.
    #[serde(default)]
    pub blank_chars: Vec<char>,
}

impl QuoteConfig {
    /// Build the line classifier for these settings.
    pub fn classifier(&self) -> LineClassifier {
        LineClassifier::new().with_blank_chars(self.blank_chars.iter().copied())
    }
}

/// A named set of operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationSet {
    /// Operations by name.
    #[serde(default)]
    pub operations: BTreeMap<String, OperationConfig>,
}

/// Configuration for a single operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationConfig {
    /// System prompt.
    pub system_message: String,

    /// User message template.
    pub user_message: Template,

    /// Output file suffix template (transform operations only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<Template>,

    /// Accepted number of extra arguments.
    #[serde(default)]
    pub args: ArgsConfig,

    /// Approximate reply length in characters (0 = no guidance).
    #[serde(default)]
    pub target_length: u32,
}

impl OperationConfig {
    /// System prompt including the length guidance, if any.
    pub fn system_prompt(&self) -> String {
        if self.target_length == 0 {
            return self.system_message.clone();
        }
        format!(
            "{}\n\n**Length Guidance**: Please keep the response to approximately {} characters.",
            self.system_message, self.target_length
        )
    }
}

/// Accepted extra argument counts (`max_count` 0 = unlimited).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgsConfig {
    /// Minimum number of arguments.
    #[serde(default)]
    pub min_count: usize,
    /// Maximum number of arguments.
    #[serde(default)]
    pub max_count: usize,
}

impl ArgsConfig {
    /// Check an argument count against the limits.
    pub fn validate(&self, count: usize) -> Result<(), ConfigError> {
        if count < self.min_count {
            return Err(ConfigError::ArgumentCount(format!(
                "operation requires at least {} arguments, got {count}",
                self.min_count
            )));
        }
        if self.max_count > 0 && count > self.max_count {
            return Err(ConfigError::ArgumentCount(format!(
                "operation accepts at most {} arguments, got {count}",
                self.max_count
            )));
        }
        Ok(())
    }
}

/// Watch mode settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Delay between a change event and the operation.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Number of operations after which watching stops.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_max_cycles() -> u32 {
    20
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_cycles: default_max_cycles(),
        }
    }
}

const ANSWER_SYSTEM_MESSAGE: &str = r"You are a helpful and detailed assistant. When answering questions based on the given context, please follow these guidelines:

1. Answer in the same language as the question
2. Make full use of the context information
3. Add examples and explanations when necessary
4. Ensure answers are appropriately long and content-rich
5. Provide insights that deepen the questioner's understanding
6. Prefer rich markdown formatting";

const SUMMARIZE_SYSTEM_MESSAGE: &str = r"You are a helpful and detailed assistant specialized in summarizing markdown documents. When summarizing content, please follow these guidelines:

1. Provide a comprehensive yet concise summary of the main content
2. Maintain the key points and important information
3. Use clear and organized structure with markdown formatting
4. Include main headings and subheadings when relevant
5. Preserve important details, examples, and references
6. Keep the summary appropriately long - not too brief, not too verbose
7. Focus on the most valuable and actionable information";

const TRANSLATE_SYSTEM_MESSAGE: &str = r"You are a professional translator specialized in translating markdown documents. When translating content, please follow these guidelines:

1. Translate the content to the specified target language accurately and naturally
2. Maintain the original markdown formatting and structure
3. Preserve all headings, lists, code blocks, and formatting elements
4. Keep the same tone and style as the original document
5. Translate technical terms appropriately for the target language
6. Preserve any links, references, or citations
7. Make the translation sound natural to native speakers";

fn default_append_operations() -> OperationSet {
    let mut operations = BTreeMap::new();
    operations.insert(
        "answer".to_string(),
        OperationConfig {
            system_message: ANSWER_SYSTEM_MESSAGE.into(),
            user_message: Template::new("Context: {{.Context}}\n\nQuestion: {{.Question}}"),
            suffix: None,
            args: ArgsConfig::default(),
            target_length: 0,
        },
    );
    OperationSet { operations }
}

fn default_transform_operations() -> OperationSet {
    let mut operations = BTreeMap::new();
    operations.insert(
        "summarize".to_string(),
        OperationConfig {
            system_message: SUMMARIZE_SYSTEM_MESSAGE.into(),
            user_message: Template::new(
                "Please provide a comprehensive summary of the following markdown content:\n\n{{.Content}}\n\nPlease create a well-structured summary that captures the essence and key points of this content.",
            ),
            suffix: Some(Template::new("_sum")),
            args: ArgsConfig::default(),
            target_length: 800,
        },
    );
    operations.insert(
        "translate".to_string(),
        OperationConfig {
            system_message: TRANSLATE_SYSTEM_MESSAGE.into(),
            user_message: Template::new(
                "Please translate the following content to {{.TargetLanguage}}:\n\n{{.Content}}\n\nPlease maintain the original markdown formatting and structure while ensuring the translation is accurate and natural.",
            ),
            suffix: Some(Template::new("_{{.Arg0}}")),
            args: ArgsConfig {
                min_count: 1,
                max_count: 1,
            },
            target_length: 0,
        },
    );
    OperationSet { operations }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default: DefaultConfig::default(),
            quote: QuoteConfig::default(),
            append: default_append_operations(),
            transform: default_transform_operations(),
            watch: WatchSettings::default(),
        }
    }
}

/// Result of [`init_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A new config file was written.
    Created,
    /// A config file was already present and left untouched.
    AlreadyExists,
}

impl Config {
    /// Default config location, `~/.mdai/config.yml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_yaml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        std::fs::write(path, content).map_err(ConfigError::Io)
    }

    /// Get an append operation by name.
    pub fn append_operation(&self, name: &str) -> Result<&OperationConfig, ConfigError> {
        self.append
            .operations
            .get(name)
            .ok_or_else(|| ConfigError::UnknownOperation(format!("append/{name}")))
    }

    /// Get a transform operation by name.
    pub fn transform_operation(&self, name: &str) -> Result<&OperationConfig, ConfigError> {
        self.transform
            .operations
            .get(name)
            .ok_or_else(|| ConfigError::UnknownOperation(format!("transform/{name}")))
    }
}

/// Write the default configuration to `path` unless a file already exists.
pub fn init_config(path: &Path) -> Result<InitOutcome, ConfigError> {
    if path.exists() {
        return Ok(InitOutcome::AlreadyExists);
    }
    Config::default().save(path)?;
    Ok(InitOutcome::Created)
}

/// Errors that can occur when working with configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading or writing config.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing config YAML.
    #[error("Parse error: {0}")]
    Parse(#[source] serde_yaml::Error),

    /// Error serializing config to YAML.
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_yaml::Error),

    /// The home directory could not be determined.
    #[error("Failed to get home directory")]
    NoHomeDir,

    /// No operation with the given name is configured.
    #[error("Unsupported operation: {0}")]
    UnknownOperation(String),

    /// Wrong number of extra arguments.
    #[error("{0}")]
    ArgumentCount(String),
}
