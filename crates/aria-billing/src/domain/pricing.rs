//! Pricing rules and the default catalog seeded into an empty store.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::types::{BillingModel, ModelName, TaskType};

/// One row of the pricing catalog, keyed by (task_type, model_name).
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRule {
    pub task_type: TaskType,
    pub model_name: ModelName,
    pub unit_price: Decimal,
    pub billing_model: BillingModel,
    pub active: bool,
    pub description: String,
}

impl PricingRule {
    pub fn new(
        task_type: &str,
        model_name: &str,
        unit_price: Decimal,
        billing_model: BillingModel,
        description: &str,
    ) -> Self {
        Self {
            task_type: TaskType::new(task_type),
            model_name: ModelName::new(model_name),
            unit_price,
            billing_model,
            active: true,
            description: description.to_string(),
        }
    }
}

/// Catalog seeded when the pricing table is empty. Prices mirror the
/// upstream provider's published rates; operators adjust rows afterwards
/// through the store, not through code.
pub fn default_rules() -> Vec<PricingRule> {
    use BillingModel::{PerMillionTokens, PerResource, PerTenKChars, PerVideo};

    let mut rules = Vec::new();

    // Synchronous and asynchronous TTS, priced per 10k weighted characters.
    for task in ["sync_tts", "async_tts"] {
        for model in ["speech-2.5-hd-preview", "speech-02-hd", "speech-01-hd"] {
            rules.push(PricingRule::new(
                task,
                model,
                dec!(3.5),
                PerTenKChars,
                "speech synthesis, hd model",
            ));
        }
        for model in [
            "speech-2.5-turbo-preview",
            "speech-02-turbo",
            "speech-01-turbo",
        ] {
            rules.push(PricingRule::new(
                task,
                model,
                dec!(2.0),
                PerTenKChars,
                "speech synthesis, turbo model",
            ));
        }
    }

    // Generated voices carry a one-time fee charged on first use.
    rules.push(PricingRule::new(
        "voice_design",
        "all_models",
        dec!(9.9),
        PerResource,
        "voice design",
    ));
    rules.push(PricingRule::new(
        "voice_clone",
        "all_models",
        dec!(9.9),
        PerResource,
        "voice clone",
    ));
    rules.push(PricingRule::new(
        "voice_design_preview",
        "all_models",
        dec!(2.0),
        PerTenKChars,
        "voice design preview synthesis",
    ));

    // Video generation, priced by tier (see VideoTierTable for selection).
    let video = [
        ("video_generation_512p_6s", "MiniMax-Hailuo-02", dec!(0.6)),
        ("video_generation_512p_10s", "MiniMax-Hailuo-02", dec!(1.0)),
        ("video_generation_768p_6s", "MiniMax-Hailuo-02", dec!(2.0)),
        ("video_generation_768p_10s", "MiniMax-Hailuo-02", dec!(4.0)),
        ("video_generation_1080p_6s", "MiniMax-Hailuo-02", dec!(3.5)),
        ("video_generation_director", "T2V-01-Director", dec!(3.0)),
        ("video_generation_director", "I2V-01-Director", dec!(3.0)),
        ("video_generation_live", "I2V-01-live", dec!(3.0)),
        ("video_generation_standard", "T2V-01", dec!(3.0)),
        ("video_generation_standard", "I2V-01", dec!(3.0)),
        ("video_generation_subject", "S2V-01", dec!(4.5)),
    ];
    for (task, model, price) in video {
        rules.push(PricingRule::new(
            task,
            model,
            price,
            PerVideo,
            "video generation",
        ));
    }

    // Text chat, priced per million tokens with context-size tiers on the
    // input count (see TokenTierTable for selection).
    let chat = [
        ("text_chat_input_0_32k", "MiniMax-M1", dec!(0.8)),
        ("text_chat_output_0_32k", "MiniMax-M1", dec!(8.0)),
        ("text_chat_input_32_128k", "MiniMax-M1", dec!(1.2)),
        ("text_chat_output_32_128k", "MiniMax-M1", dec!(16.0)),
        ("text_chat_input_128k_plus", "MiniMax-M1", dec!(2.4)),
        ("text_chat_output_128k_plus", "MiniMax-M1", dec!(24.0)),
        ("text_chat_input", "MiniMax-Text-01", dec!(1.0)),
        ("text_chat_output", "MiniMax-Text-01", dec!(8.0)),
    ];
    for (task, model, price) in chat {
        rules.push(PricingRule::new(
            task,
            model,
            price,
            PerMillionTokens,
            "text chat tokens",
        ));
    }

    // File operations are recorded for audit but free.
    for task in [
        "file_upload",
        "file_download",
        "file_list",
        "file_delete",
        "file_retrieve",
    ] {
        rules.push(PricingRule::new(
            task,
            "all_models",
            dec!(0.0),
            PerTenKChars,
            "file operation, free",
        ));
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_keys_are_unique() {
        let rules = default_rules();
        let mut keys: Vec<_> = rules
            .iter()
            .map(|r| (r.task_type.as_str(), r.model_name.as_str()))
            .collect();
        keys.sort();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());
    }

    #[test]
    fn test_default_rules_cover_expected_tasks() {
        let rules = default_rules();
        let find = |task: &str, model: &str| {
            rules
                .iter()
                .find(|r| r.task_type.as_str() == task && r.model_name.as_str() == model)
        };

        let tts = find("sync_tts", "speech-02-turbo").unwrap();
        assert_eq!(tts.unit_price, dec!(2.0));
        assert_eq!(tts.billing_model, BillingModel::PerTenKChars);

        let voice = find("voice_design", "all_models").unwrap();
        assert_eq!(voice.unit_price, dec!(9.9));
        assert_eq!(voice.billing_model, BillingModel::PerResource);

        let video = find("video_generation_768p_10s", "MiniMax-Hailuo-02").unwrap();
        assert_eq!(video.unit_price, dec!(4.0));

        let chat = find("text_chat_input_32_128k", "MiniMax-M1").unwrap();
        assert_eq!(chat.unit_price, dec!(1.2));
        assert_eq!(chat.billing_model, BillingModel::PerMillionTokens);

        assert!(find("file_upload", "all_models").unwrap().unit_price.is_zero());
    }
}
