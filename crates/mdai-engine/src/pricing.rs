//! Model catalog and cost accounting.

use serde::Serialize;
use std::fmt;

/// Model vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => f.pad("OpenAI"),
            Self::Anthropic => f.pad("Anthropic"),
        }
    }
}

/// Pricing and limits for a chat model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
    /// API identifier.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Vendor.
    pub provider: Provider,
    /// Context window in tokens.
    pub context_size: u32,
    /// USD per million prompt tokens.
    pub prompt_per_million: f64,
    /// USD per million completion tokens.
    pub completion_per_million: f64,
}

impl ModelPricing {
    /// Cost of `tokens` prompt tokens.
    pub fn prompt_cost(&self, tokens: u64) -> f64 {
        per_million(tokens, self.prompt_per_million)
    }

    /// Cost of `tokens` completion tokens.
    pub fn completion_cost(&self, tokens: u64) -> f64 {
        per_million(tokens, self.completion_per_million)
    }

    /// Full cost breakdown for a request.
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> CostReport {
        CostReport {
            model: self.id.to_string(),
            prompt: self.prompt_cost(prompt_tokens),
            completion: self.completion_cost(completion_tokens),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn per_million(tokens: u64, price: f64) -> f64 {
    tokens as f64 / 1_000_000.0 * price
}

/// Known chat models.
pub const MODELS: &[ModelPricing] = &[
    ModelPricing {
        id: "gpt-4o-mini",
        name: "GPT-4o-mini",
        provider: Provider::OpenAi,
        context_size: 128_000,
        prompt_per_million: 0.15,
        completion_per_million: 0.60,
    },
    ModelPricing {
        id: "gpt-4o",
        name: "GPT-4o",
        provider: Provider::OpenAi,
        context_size: 128_000,
        prompt_per_million: 2.50,
        completion_per_million: 10.00,
    },
    ModelPricing {
        id: "gpt-4-turbo",
        name: "GPT-4 Turbo",
        provider: Provider::OpenAi,
        context_size: 128_000,
        prompt_per_million: 10.00,
        completion_per_million: 30.00,
    },
    ModelPricing {
        id: "gpt-3.5-turbo",
        name: "GPT-3.5-turbo",
        provider: Provider::OpenAi,
        context_size: 16_385,
        prompt_per_million: 0.50,
        completion_per_million: 1.50,
    },
    ModelPricing {
        id: "claude-3-haiku-20240307",
        name: "Claude 3 Haiku",
        provider: Provider::Anthropic,
        context_size: 200_000,
        prompt_per_million: 0.25,
        completion_per_million: 1.25,
    },
    ModelPricing {
        id: "claude-3-sonnet-20240229",
        name: "Claude 3 Sonnet",
        provider: Provider::Anthropic,
        context_size: 200_000,
        prompt_per_million: 3.00,
        completion_per_million: 15.00,
    },
    ModelPricing {
        id: "claude-3-opus-20240229",
        name: "Claude 3 Opus",
        provider: Provider::Anthropic,
        context_size: 200_000,
        prompt_per_million: 15.00,
        completion_per_million: 75.00,
    },
];

/// Look up a model by its API identifier.
pub fn find_model(id: &str) -> Result<&'static ModelPricing, PricingError> {
    MODELS
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| PricingError::UnknownModel(id.to_string()))
}

/// Cost of a single request in USD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    /// Model identifier.
    pub model: String,
    /// Prompt cost.
    pub prompt: f64,
    /// Completion cost.
    pub completion: f64,
}

impl CostReport {
    /// Prompt plus completion cost.
    pub fn total(&self) -> f64 {
        self.prompt + self.completion
    }
}

impl fmt::Display for CostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ${:.5} (Input: ${:.5}, Output: ${:.5})",
            self.model,
            self.total(),
            self.prompt,
            self.completion
        )
    }
}

/// Errors from cost accounting.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("model not found: {0}")]
    UnknownModel(String),
}
