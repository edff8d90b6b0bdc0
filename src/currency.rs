//! # Currency Conversion Module
//!
//! ## Purpose
//! Applies a point-in-time FX rate to convert base-currency (USD) averages into
//! the requested display currency. Raw per-region prices are always cached in
//! base currency, so the raw-price cache stays currency-independent; the rate is
//! resolved at aggregation time only.

use crate::errors::{PricingError, Result};
use crate::models::Currency;

/// Provider of point-in-time FX rates from the base currency (USD)
pub trait FxRateProvider: Send + Sync {
    /// Multiplier converting a USD amount into `currency`
    fn rate(&self, currency: Currency) -> Result<f64>;
}

/// Fixed FX table captured at build time. Good enough for display purposes;
/// swap in a live provider behind the same trait for anything billing-adjacent.
#[derive(Debug, Default)]
pub struct StaticFxProvider;

impl StaticFxProvider {
    pub fn new() -> Self {
        Self
    }
}

impl FxRateProvider for StaticFxProvider {
    fn rate(&self, currency: Currency) -> Result<f64> {
        let rate = match currency {
            Currency::Usd => 1.0,
            Currency::Eur => 0.92,
            Currency::Gbp => 0.79,
            Currency::Jpy => 147.5,
            Currency::Aud => 1.53,
            Currency::Cad => 1.37,
            Currency::Chf => 0.86,
            Currency::Inr => 83.2,
            Currency::Brl => 5.45,
        };
        if rate <= 0.0 {
            return Err(PricingError::Internal {
                message: format!("non-positive FX rate for {}", currency),
            });
        }
        Ok(rate)
    }
}

/// Round a price to 6 decimal places for output
pub fn round_price(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Round a percentage to 2 decimal places for output
pub fn round_pct(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_is_identity() {
        let fx = StaticFxProvider::new();
        assert_eq!(fx.rate(Currency::Usd).unwrap(), 1.0);
    }

    #[test]
    fn all_supported_currencies_have_rates() {
        let fx = StaticFxProvider::new();
        for currency in [
            Currency::Usd,
            Currency::Eur,
            Currency::Gbp,
            Currency::Jpy,
            Currency::Aud,
            Currency::Cad,
            Currency::Chf,
            Currency::Inr,
            Currency::Brl,
        ] {
            assert!(fx.rate(currency).unwrap() > 0.0);
        }
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round_price(0.123456789), 0.123457);
        assert_eq!(round_pct(66.666_666), 66.67);
    }
}
