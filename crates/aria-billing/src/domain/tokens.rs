//! Context-size tier tables for per-million-token billing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::types::ModelName;

/// One priced bucket on the input-token axis.
///
/// `upper_bound` is inclusive; `None` marks the open-ended top tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTier {
    pub upper_bound: Option<u64>,
    /// Suffix appended to the recorded task type, e.g. `0_32k`. Flat-priced
    /// models carry no label.
    pub label: Option<String>,
    pub input_price: Decimal,
    pub output_price: Decimal,
}

impl TokenTier {
    fn flat(input_price: Decimal, output_price: Decimal) -> Self {
        Self {
            upper_bound: None,
            label: None,
            input_price,
            output_price,
        }
    }

    fn bounded(
        upper_bound: u64,
        label: &str,
        input_price: Decimal,
        output_price: Decimal,
    ) -> Self {
        Self {
            upper_bound: Some(upper_bound),
            label: Some(label.to_string()),
            input_price,
            output_price,
        }
    }

    fn top(label: &str, input_price: Decimal, output_price: Decimal) -> Self {
        Self {
            upper_bound: None,
            label: Some(label.to_string()),
            input_price,
            output_price,
        }
    }
}

/// Per-model tier tables with a fallback for unknown models.
///
/// Tiers are ordered by ascending upper bound; selection takes the first
/// tier whose bound is >= the input-token count, or the last tier when the
/// count exceeds every bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTierTable {
    pub models: HashMap<String, Vec<TokenTier>>,
    pub fallback: Vec<TokenTier>,
}

impl TokenTierTable {
    pub fn select(&self, model: &ModelName, input_tokens: u64) -> TokenTier {
        let tiers = self
            .models
            .get(model.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.fallback);

        tiers
            .iter()
            .find(|t| t.upper_bound.map_or(true, |bound| input_tokens <= bound))
            .or_else(|| tiers.last())
            .cloned()
            .unwrap_or_else(|| TokenTier::flat(dec!(1.0), dec!(8.0)))
    }
}

impl Default for TokenTierTable {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "MiniMax-M1".to_string(),
            vec![
                TokenTier::bounded(32_000, "0_32k", dec!(0.8), dec!(8.0)),
                TokenTier::bounded(128_000, "32_128k", dec!(1.2), dec!(16.0)),
                TokenTier::top("128k_plus", dec!(2.4), dec!(24.0)),
            ],
        );
        models.insert(
            "MiniMax-Text-01".to_string(),
            vec![TokenTier::flat(dec!(1.0), dec!(8.0))],
        );

        Self {
            models,
            fallback: vec![TokenTier::flat(dec!(1.0), dec!(8.0))],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundary_is_inclusive() {
        let table = TokenTierTable::default();
        let model = ModelName::new("MiniMax-M1");

        let tier = table.select(&model, 32_000);
        assert_eq!(tier.label.as_deref(), Some("0_32k"));
        assert_eq!(tier.input_price, dec!(0.8));

        let tier = table.select(&model, 32_001);
        assert_eq!(tier.label.as_deref(), Some("32_128k"));
        assert_eq!(tier.input_price, dec!(1.2));
        assert_eq!(tier.output_price, dec!(16.0));
    }

    #[test]
    fn test_exceeding_all_bounds_selects_top_tier() {
        let table = TokenTierTable::default();
        let tier = table.select(&ModelName::new("MiniMax-M1"), 500_000);
        assert_eq!(tier.label.as_deref(), Some("128k_plus"));
        assert_eq!(tier.input_price, dec!(2.4));
    }

    #[test]
    fn test_flat_model_has_no_label() {
        let table = TokenTierTable::default();
        let tier = table.select(&ModelName::new("MiniMax-Text-01"), 200_000);
        assert_eq!(tier.label, None);
        assert_eq!(tier.input_price, dec!(1.0));
    }

    #[test]
    fn test_unknown_model_uses_fallback() {
        let table = TokenTierTable::default();
        let tier = table.select(&ModelName::new("mystery-model"), 10);
        assert_eq!(tier.input_price, dec!(1.0));
        assert_eq!(tier.output_price, dec!(8.0));
    }
}
