//! Token pricing

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::agents::domain::TokenUsage;

/// Price per thousand tokens, in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl ModelPricing {
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt_tokens as f64 / 1000.0) * self.prompt_per_1k
            + (usage.completion_tokens as f64 / 1000.0) * self.completion_per_1k
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            prompt_per_1k: 0.0015,
            completion_per_1k: 0.002,
        }
    }
}

/// Configured prices: per-model entries plus the linear fallback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingTable {
    #[serde(default)]
    pub default: ModelPricing,
    #[serde(default)]
    pub models: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Cost of `usage` on `model`.
    ///
    /// Precedence: pricing reported by the client, then the configured
    /// per-model entry, then the fixed fallback formula.
    pub fn cost(&self, model: &str, reported: Option<ModelPricing>, usage: &TokenUsage) -> f64 {
        let pricing = reported
            .or_else(|| self.models.get(model).copied())
            .unwrap_or(self.default);
        pricing.cost(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_pricing_wins() {
        let mut table = PricingTable::default();
        table.models.insert(
            "gpt-4o".into(),
            ModelPricing {
                prompt_per_1k: 1.0,
                completion_per_1k: 1.0,
            },
        );
        let usage = TokenUsage::new(1000, 1000);
        let reported = ModelPricing {
            prompt_per_1k: 10.0,
            completion_per_1k: 0.0,
        };

        assert_eq!(table.cost("gpt-4o", Some(reported), &usage), 10.0);
        assert_eq!(table.cost("gpt-4o", None, &usage), 2.0);
        let fallback = table.cost("unknown", None, &usage);
        assert!((fallback - 0.0035).abs() < 1e-9);
    }
}
