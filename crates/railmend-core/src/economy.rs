//! Economy globals and the inflation model.
//!
//! Inflation factors are 16.16 fixed point: `1 << 16` is "no inflation".
//! The legacy format stored an unrounded loan ceiling instead, so old
//! snapshots have their factors recomputed from it.

use fixed::types::U48F16;
use serde::{Deserialize, Serialize};

/// Largest inflation factor, as raw 16.16 bits.
pub const MAX_INFLATION_BITS: u64 = (1 << 31) - 1;

pub fn max_inflation() -> U48F16 {
    U48F16::from_bits(MAX_INFLATION_BITS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Economy {
    pub inflation_prices: U48F16,
    pub inflation_payment: U48F16,
    /// Yearly price inflation in percent.
    pub infl_amount: u8,
    /// Yearly payment inflation in percent.
    pub infl_amount_pr: u8,
    pub max_loan: i64,
    /// Loan ceiling before rounding; only meaningful in old snapshots.
    pub old_max_loan_unround: i64,
    pub old_max_loan_unround_fract: u16,
}

impl Default for Economy {
    fn default() -> Self {
        Self {
            inflation_prices: U48F16::ONE,
            inflation_payment: U48F16::ONE,
            infl_amount: 2,
            infl_amount_pr: 2,
            max_loan: 300_000,
            old_max_loan_unround: 0,
            old_max_loan_unround_fract: 0,
        }
    }
}

impl Economy {
    /// Apply one month of inflation. Returns `true` once a factor has
    /// saturated and further calls would change nothing.
    pub fn add_inflation(&mut self) -> bool {
        let max = max_inflation();
        if self.inflation_prices == max || self.inflation_payment == max {
            return true;
        }
        self.inflation_prices = grow(self.inflation_prices, self.infl_amount);
        self.inflation_payment = grow(self.inflation_payment, self.infl_amount_pr);
        false
    }

    /// Clamp both factors to [`MAX_INFLATION_BITS`].
    pub fn clamp_inflation(&mut self) {
        let max = max_inflation();
        self.inflation_prices = self.inflation_prices.min(max);
        self.inflation_payment = self.inflation_payment.min(max);
    }

    /// Scale a base price by the current price inflation.
    pub fn inflated(&self, base: i64) -> i64 {
        let bits = self.inflation_prices.to_bits().min(MAX_INFLATION_BITS) as i128;
        ((base as i128 * bits) >> 16) as i64
    }
}

fn grow(factor: U48F16, percent: u8) -> U48F16 {
    let bits = factor.to_bits();
    let step = bits.saturating_mul(percent as u64 * 54) >> 16;
    U48F16::from_bits(bits.saturating_add(step).min(MAX_INFLATION_BITS))
}

/// Base prices of the original game, before inflation.
pub const BASE_PRICES: [(&str, i64); 8] = [
    ("station value", 100),
    ("build rail", 100),
    ("build road", 61),
    ("build signals", 48),
    ("build bridge", 1500),
    ("clear grass", 20),
    ("terraform", 250),
    ("build industry", 5000),
];
