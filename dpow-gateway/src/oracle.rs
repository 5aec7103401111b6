//! Price lookups for direct deposits.

use std::collections::HashMap;

use dpow_types::primitives::{Amount, Height, COIN};

/// Expected base-chain value for a fiat amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub expected: Amount,
    /// Zero when the quote came without a price seed, which allows a 1%
    /// tolerance on the settled value.
    pub seed: u64,
}

/// Converts fiat amounts into base-chain value at a given height.
pub trait PriceOracle: Send + Sync {
    /// `None` when no price is known for `symbol` at `height`.
    fn quote(&self, symbol: &str, fiat_amount: Amount, height: Height) -> Option<Quote>;
}

/// Oracle with one constant rate per symbol.
///
/// A rate is the base-chain value of one whole fiat unit (`COIN` pegged
/// units).
#[derive(Debug, Clone, Default)]
pub struct FixedRateOracle {
    rates: HashMap<String, Amount>,
}

impl FixedRateOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, symbol: &str, rate: Amount) -> Self {
        self.rates.insert(symbol.to_string(), rate);
        self
    }
}

impl PriceOracle for FixedRateOracle {
    fn quote(&self, symbol: &str, fiat_amount: Amount, _height: Height) -> Option<Quote> {
        let rate = *self.rates.get(symbol)?;
        let expected = (fiat_amount as u128 * rate as u128 / COIN as u128).min(Amount::MAX as u128);
        Some(Quote {
            expected: expected as Amount,
            seed: 0,
        })
    }
}

/// Whether `value` settles a deposit quoted at `quote`.
///
/// Over-payment always settles; without a seed, under-payment within 1% of
/// the quote is tolerated.
pub fn settles(value: Amount, quote: &Quote) -> bool {
    if value >= quote.expected {
        return true;
    }
    quote.seed == 0 && (quote.expected - value) as u128 * 100 < quote.expected as u128
}
