//! Temporal price table: date -> base -> quote -> rate, with forward-fill
//! lookup. Multi-hop conversion lives on the graph (see [`crate::graph`]);
//! this table answers direct pair queries.

use std::collections::HashMap;

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;

use beanledger_core::Date;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PriceError {
    #[error("price rate must be nonzero for {from}->{to}")]
    ZeroRate { from: String, to: String },
}

/// Exchange-rate observations keyed by date. The BTreeMap keeps the dates
/// sorted so forward-fill lookup is a reverse scan.
#[derive(Clone, Debug, Default)]
pub struct PriceGraph {
    by_date: BTreeMap<Date, HashMap<String, HashMap<String, Decimal>>>,
}

impl PriceGraph {
    pub fn new() -> Self {
        PriceGraph::default()
    }

    /// Records a rate and its inverse on a date. Zero rates are rejected;
    /// an existing observation for the same pair and date is replaced.
    pub fn add_price(&mut self, date: Date, from: &str, to: &str, rate: Decimal) -> Result<(), PriceError> {
        if rate.is_zero() {
            return Err(PriceError::ZeroRate {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let day = self.by_date.entry(date).or_default();
        day.entry(from.to_string())
            .or_default()
            .insert(to.to_string(), rate);
        day.entry(to.to_string())
            .or_default()
            .insert(from.to_string(), Decimal::ONE / rate);
        Ok(())
    }

    /// The most recent rate for the pair on or before `as_of`
    /// (forward-fill). Identical commodities convert at 1.
    pub fn lookup_price(&self, as_of: Date, from: &str, to: &str) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        self.by_date
            .range(..=as_of)
            .rev()
            .find_map(|(_, day)| day.get(from).and_then(|quotes| quotes.get(to)))
            .copied()
    }

    pub fn has_price(&self, as_of: Date, from: &str, to: &str) -> bool {
        self.lookup_price(as_of, from, to).is_some()
    }

    /// All dates carrying at least one observation, ascending.
    pub fn dates(&self) -> impl Iterator<Item = Date> + '_ {
        self.by_date.keys().copied()
    }
}
