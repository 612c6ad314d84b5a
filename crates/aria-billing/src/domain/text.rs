//! Length metrics shared by request limits and character-based billing.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Weighted character count: CJK unified ideographs (U+4E00..=U+9FFF) count
/// 2 units per character, everything else (ASCII, CJK punctuation, ...)
/// counts 1. The same metric backs request length limits.
pub fn weighted_len(text: &str) -> u64 {
    text.chars()
        .map(|c| if ('\u{4e00}'..='\u{9fff}').contains(&c) { 2 } else { 1 })
        .sum()
}

/// Approximate token count from a raw (unweighted) character count.
///
/// Derived via a fixed, configurable chars-per-token ratio (upstream quotes
/// roughly 1000 tokens per 1600 characters, i.e. 1.6). This is not an exact
/// tokenizer result; treat it as an estimate.
pub fn estimate_tokens(char_count: u64, chars_per_token: Decimal) -> u64 {
    if char_count == 0 || chars_per_token <= Decimal::ZERO {
        return 0;
    }
    (Decimal::from(char_count) / chars_per_token)
        .floor()
        .to_u64()
        .unwrap_or(0)
}

/// Estimate tokens directly from text, using its raw character count.
pub fn estimate_tokens_for_text(text: &str, chars_per_token: Decimal) -> u64 {
    estimate_tokens(text.chars().count() as u64, chars_per_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_weighted_len_counts_cjk_double() {
        // 3 CJK ideographs + 2 ASCII = 3*2 + 2*1 = 8
        assert_eq!(weighted_len("你好吗ab"), 8);
    }

    #[test]
    fn test_weighted_len_cjk_punctuation_counts_single() {
        // Ideographic comma and full stop are outside U+4E00..U+9FFF
        assert_eq!(weighted_len("、。"), 2);
    }

    #[test]
    fn test_weighted_len_empty() {
        assert_eq!(weighted_len(""), 0);
    }

    #[test]
    fn test_estimate_tokens_ratio() {
        // 1600 chars at 1.6 chars/token ~= 1000 tokens
        assert_eq!(estimate_tokens(1600, dec!(1.6)), 1000);
        assert_eq!(estimate_tokens(0, dec!(1.6)), 0);
        // truncates, never rounds up
        assert_eq!(estimate_tokens(3, dec!(1.6)), 1);
    }

    #[test]
    fn test_estimate_tokens_for_text_uses_raw_chars() {
        // 8 raw characters regardless of script weighting
        assert_eq!(estimate_tokens_for_text("你好吗abcde", dec!(1.6)), 5);
    }
}
