//! Stateless per-billing-model cost functions.

use rust_decimal::Decimal;

use crate::domain::types::{Amount, BillingModel};

const TEN_THOUSAND: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
const ONE_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Cost of `quantity` units under a billing model, given the rule's unit
/// price. Quantity is interpreted per model: weighted characters, resource
/// count, videos, or tokens.
pub fn compute(billing_model: BillingModel, unit_price: Decimal, quantity: u64) -> Amount {
    let quantity = Decimal::from(quantity);
    let cost = match billing_model {
        BillingModel::PerTenKChars => unit_price * quantity / TEN_THOUSAND,
        BillingModel::PerResource | BillingModel::PerVideo => unit_price * quantity,
        BillingModel::PerMillionTokens => unit_price * quantity / ONE_MILLION,
    };
    Amount::from_decimal(cost)
}

/// Token cost for one direction (input or output) at a tier price quoted
/// per million tokens.
pub fn token_cost(tokens: u64, price_per_million: Decimal) -> Amount {
    compute(BillingModel::PerMillionTokens, price_per_million, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_per_10k_chars() {
        // 2.0 per 10k weighted chars, 5000 chars -> 1.0000
        let cost = compute(BillingModel::PerTenKChars, dec!(2.0), 5000);
        assert_eq!(cost.as_decimal(), dec!(1.0000));
    }

    #[test]
    fn test_per_10k_chars_rounds_to_four_places() {
        let cost = compute(BillingModel::PerTenKChars, dec!(3.5), 3);
        assert_eq!(cost.as_decimal(), dec!(0.0011));
    }

    #[test]
    fn test_per_resource() {
        let cost = compute(BillingModel::PerResource, dec!(9.9), 2);
        assert_eq!(cost.as_decimal(), dec!(19.8));
    }

    #[test]
    fn test_per_video_is_fixed_price() {
        let cost = compute(BillingModel::PerVideo, dec!(4.0), 1);
        assert_eq!(cost.as_decimal(), dec!(4.0));
    }

    #[test]
    fn test_per_million_tokens() {
        let cost = token_cost(32_000, dec!(0.8));
        assert_eq!(cost.as_decimal(), dec!(0.0256));

        let cost = token_cost(1_000_000, dec!(8.0));
        assert_eq!(cost.as_decimal(), dec!(8.0));
    }

    #[test]
    fn test_zero_quantity_is_free() {
        let cost = compute(BillingModel::PerTenKChars, dec!(3.5), 0);
        assert!(cost.is_zero());
    }
}
