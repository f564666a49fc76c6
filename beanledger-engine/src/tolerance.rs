//! Tolerances for "balances to zero" checks.
//!
//! A currency's effective tolerance within a transaction is the larger of
//! the configured default (per-currency, else wildcard, else 0.005) and the
//! largest tolerance inferred from the precision of the amounts actually
//! written: an amount with `n` fractional digits contributes
//! `10^-n x multiplier`, integers contribute nothing.

use std::collections::HashMap;

use rust_decimal::Decimal;

/// Settings from `inferred_tolerance_default`, `inferred_tolerance_multiplier`
/// and `infer_tolerance_from_cost`.
#[derive(Clone, Debug, PartialEq)]
pub struct ToleranceConfig {
    pub defaults: HashMap<String, Decimal>,
    pub wildcard: Option<Decimal>,
    pub multiplier: Decimal,
    pub infer_from_cost: bool,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        ToleranceConfig {
            defaults: HashMap::new(),
            wildcard: None,
            multiplier: Decimal::new(5, 1),
            infer_from_cost: false,
        }
    }
}

/// Fallback when neither a per-currency nor a wildcard default is set.
fn fallback_default() -> Decimal {
    Decimal::new(5, 3)
}

impl ToleranceConfig {
    /// The configured floor for a currency, before precision inference.
    pub fn default_for(&self, currency: &str) -> Decimal {
        self.defaults
            .get(currency)
            .copied()
            .or(self.wildcard)
            .unwrap_or_else(fallback_default)
    }

    /// Tolerance inferred from one written amount: `10^-scale x multiplier`,
    /// zero for integer-like amounts.
    pub fn inferred_from(&self, num: &Decimal) -> Decimal {
        let scale = num.scale();
        if scale == 0 {
            Decimal::ZERO
        } else {
            Decimal::new(1, scale) * self.multiplier
        }
    }

    /// Tolerance contributed to a cost currency by a cost amount applied to
    /// `quantity` units (only consulted when `infer_from_cost` is on).
    pub fn inferred_from_cost(&self, cost: &Decimal, quantity: &Decimal) -> Decimal {
        self.inferred_from(cost) * quantity.abs()
    }

    /// The effective tolerance: the configured floor raised by the largest
    /// inferred candidate.
    pub fn effective(&self, currency: &str, inferred: impl IntoIterator<Item = Decimal>) -> Decimal {
        let mut tolerance = self.default_for(currency);
        for candidate in inferred {
            if candidate > tolerance {
                tolerance = candidate;
            }
        }
        tolerance
    }
}

/// Accumulates per-currency inferred-tolerance candidates for one
/// transaction and resolves them against the configuration.
#[derive(Debug, Default)]
pub struct ToleranceSet {
    inferred: HashMap<String, Decimal>,
}

impl ToleranceSet {
    pub fn new() -> Self {
        ToleranceSet::default()
    }

    pub fn observe(&mut self, currency: &str, candidate: Decimal) {
        let entry = self.inferred.entry(currency.to_string()).or_insert(Decimal::ZERO);
        if candidate > *entry {
            *entry = candidate;
        }
    }

    pub fn resolve(&self, config: &ToleranceConfig, currency: &str) -> Decimal {
        config.effective(currency, self.inferred.get(currency).copied())
    }
}
