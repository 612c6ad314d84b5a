//! Video generation tiering: a data-driven decision table keyed by
//! (model, resolution class, duration class), plus the attribute probing
//! that builds a tagged descriptor from raw request JSON.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::types::ModelName;

/// Tagged video request descriptor. Replaces loose branching over nested
/// JSON fields: probing happens once, tier selection is a pure lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAttributes {
    pub resolution: Option<String>,
    pub duration: Option<String>,
}

/// Field-probing precedence for extracting resolution/duration from a raw
/// request body. Container objects are searched first, then the top level,
/// each in declared field order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProbeConfig {
    pub containers: Vec<String>,
    pub resolution_fields: Vec<String>,
    pub duration_fields: Vec<String>,
}

impl Default for VideoProbeConfig {
    fn default() -> Self {
        Self {
            containers: vec!["video_setting".to_string()],
            resolution_fields: vec!["resolution".to_string(), "video_resolution".to_string()],
            duration_fields: vec!["duration".to_string(), "video_duration".to_string()],
        }
    }
}

fn value_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn probe_field(
    params: &serde_json::Value,
    containers: &[String],
    fields: &[String],
) -> Option<String> {
    for container in containers {
        if let Some(nested) = params.get(container) {
            for field in fields {
                if let Some(found) = nested.get(field).and_then(value_as_string) {
                    return Some(found);
                }
            }
        }
    }
    for field in fields {
        if let Some(found) = params.get(field).and_then(value_as_string) {
            return Some(found);
        }
    }
    None
}

impl VideoAttributes {
    pub fn new(resolution: Option<String>, duration: Option<String>) -> Self {
        Self {
            resolution,
            duration,
        }
    }

    /// Extract attributes from a raw request body using the configured
    /// fallback chain.
    pub fn probe(params: &serde_json::Value, config: &VideoProbeConfig) -> Self {
        Self {
            resolution: probe_field(params, &config.containers, &config.resolution_fields),
            duration: probe_field(params, &config.containers, &config.duration_fields),
        }
    }
}

/// Resolution bucket. Absent resolution defaults to the lowest tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionClass {
    P512,
    P768,
    P1080,
}

impl ResolutionClass {
    pub fn classify(resolution: Option<&str>) -> Self {
        match resolution {
            Some(r) if r.contains("1080") => ResolutionClass::P1080,
            Some(r) if r.contains("768") => ResolutionClass::P768,
            _ => ResolutionClass::P512,
        }
    }
}

/// Duration bucket. Absent duration defaults to the shorter tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationClass {
    Short,
    Long,
}

impl DurationClass {
    pub fn classify(duration: Option<&str>) -> Self {
        match duration {
            Some(d) => {
                let d = d.to_lowercase();
                if d.contains("10") || d.contains("long") {
                    DurationClass::Long
                } else {
                    DurationClass::Short
                }
            }
            None => DurationClass::Short,
        }
    }
}

/// One row of the tier table. `None` on a class axis matches any value;
/// model `*` matches any model. First matching row wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTierRow {
    pub model: String,
    pub resolution: Option<ResolutionClass>,
    pub duration: Option<DurationClass>,
    /// Tier key appended to the base task type, e.g. `768p_10s`.
    pub tier: String,
    pub price: Decimal,
}

impl VideoTierRow {
    fn new(
        model: &str,
        resolution: Option<ResolutionClass>,
        duration: Option<DurationClass>,
        tier: &str,
        price: Decimal,
    ) -> Self {
        Self {
            model: model.to_string(),
            resolution,
            duration,
            tier: tier.to_string(),
            price,
        }
    }

    fn matches(&self, model: &ModelName, res: ResolutionClass, dur: DurationClass) -> bool {
        (self.model == "*" || self.model == model.as_str())
            && self.resolution.map_or(true, |r| r == res)
            && self.duration.map_or(true, |d| d == dur)
    }
}

/// Ordered decision table. Kept as data so operators can reprice tiers
/// through configuration without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTierTable {
    pub rows: Vec<VideoTierRow>,
}

impl VideoTierTable {
    /// Total lookup: unknown models fall through to the wildcard row.
    pub fn resolve(&self, model: &ModelName, attrs: &VideoAttributes) -> VideoTierRow {
        let res = ResolutionClass::classify(attrs.resolution.as_deref());
        let dur = DurationClass::classify(attrs.duration.as_deref());

        self.rows
            .iter()
            .find(|row| row.matches(model, res, dur))
            .cloned()
            .unwrap_or_else(|| {
                VideoTierRow::new("*", None, None, "standard", dec!(3.0))
            })
    }
}

impl Default for VideoTierTable {
    fn default() -> Self {
        use DurationClass::Long;
        use ResolutionClass::{P1080, P512, P768};

        Self {
            rows: vec![
                // Hailuo-02 is priced by resolution and duration; 1080p is
                // only offered at the short duration.
                VideoTierRow::new("MiniMax-Hailuo-02", Some(P1080), None, "1080p_6s", dec!(3.5)),
                VideoTierRow::new("MiniMax-Hailuo-02", Some(P768), Some(Long), "768p_10s", dec!(4.0)),
                VideoTierRow::new("MiniMax-Hailuo-02", Some(P768), None, "768p_6s", dec!(2.0)),
                VideoTierRow::new("MiniMax-Hailuo-02", Some(P512), Some(Long), "512p_10s", dec!(1.0)),
                VideoTierRow::new("MiniMax-Hailuo-02", Some(P512), None, "512p_6s", dec!(0.6)),
                // Remaining models are flat-priced per video.
                VideoTierRow::new("T2V-01-Director", None, None, "director", dec!(3.0)),
                VideoTierRow::new("I2V-01-Director", None, None, "director", dec!(3.0)),
                VideoTierRow::new("I2V-01-live", None, None, "live", dec!(3.0)),
                VideoTierRow::new("T2V-01", None, None, "standard", dec!(3.0)),
                VideoTierRow::new("I2V-01", None, None, "standard", dec!(3.0)),
                VideoTierRow::new("S2V-01", None, None, "subject", dec!(4.5)),
                VideoTierRow::new("*", None, None, "standard", dec!(3.0)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hailuo() -> ModelName {
        ModelName::new("MiniMax-Hailuo-02")
    }

    #[test]
    fn test_768p_10s_tier() {
        let table = VideoTierTable::default();
        let attrs = VideoAttributes::new(Some("768P".to_string()), Some("10".to_string()));
        let row = table.resolve(&hailuo(), &attrs);
        assert_eq!(row.tier, "768p_10s");
        assert_eq!(row.price, dec!(4.0));
    }

    #[test]
    fn test_absent_attributes_default_to_lowest_short_tier() {
        let table = VideoTierTable::default();
        let row = table.resolve(&hailuo(), &VideoAttributes::default());
        assert_eq!(row.tier, "512p_6s");
        assert_eq!(row.price, dec!(0.6));
    }

    #[test]
    fn test_1080p_ignores_duration() {
        let table = VideoTierTable::default();
        let attrs = VideoAttributes::new(Some("1080p".to_string()), Some("10s".to_string()));
        let row = table.resolve(&hailuo(), &attrs);
        assert_eq!(row.tier, "1080p_6s");
        assert_eq!(row.price, dec!(3.5));
    }

    #[test]
    fn test_long_duration_spelled_out() {
        let table = VideoTierTable::default();
        let attrs = VideoAttributes::new(Some("512".to_string()), Some("Long".to_string()));
        let row = table.resolve(&hailuo(), &attrs);
        assert_eq!(row.tier, "512p_10s");
    }

    #[test]
    fn test_flat_priced_models() {
        let table = VideoTierTable::default();
        let attrs = VideoAttributes::default();

        let row = table.resolve(&ModelName::new("S2V-01"), &attrs);
        assert_eq!(row.tier, "subject");
        assert_eq!(row.price, dec!(4.5));

        let row = table.resolve(&ModelName::new("I2V-01-Director"), &attrs);
        assert_eq!(row.tier, "director");
        assert_eq!(row.price, dec!(3.0));
    }

    #[test]
    fn test_unknown_model_resolves_to_standard() {
        let table = VideoTierTable::default();
        let row = table.resolve(&ModelName::new("brand-new-model"), &VideoAttributes::default());
        assert_eq!(row.tier, "standard");
        assert_eq!(row.price, dec!(3.0));
    }

    #[test]
    fn test_probe_prefers_container_fields() {
        let config = VideoProbeConfig::default();
        let params = json!({
            "resolution": "512P",
            "video_setting": { "resolution": "768P", "duration": 10 }
        });
        let attrs = VideoAttributes::probe(&params, &config);
        assert_eq!(attrs.resolution.as_deref(), Some("768P"));
        // numeric duration is stringified
        assert_eq!(attrs.duration.as_deref(), Some("10"));
    }

    #[test]
    fn test_probe_falls_back_to_top_level() {
        let config = VideoProbeConfig::default();
        let params = json!({ "video_resolution": "1080P" });
        let attrs = VideoAttributes::probe(&params, &config);
        assert_eq!(attrs.resolution.as_deref(), Some("1080P"));
        assert_eq!(attrs.duration, None);
    }
}
