//! Per-account inventory: commodity buckets of lots, augmentation and
//! reduction under the configured booking method.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use beanledger_core::{Booking, Date};

/// The identity of a lot inside a commodity bucket: per-unit cost, cost
/// currency, acquisition date and label. Equality is componentwise, and two
/// lots with equal specs are merged on augmentation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LotSpec {
    pub cost: Option<Decimal>,
    pub cost_currency: Option<String>,
    pub date: Option<Date>,
    pub label: Option<String>,
}

impl LotSpec {
    pub fn empty() -> Self {
        LotSpec::default()
    }

    /// True for the `{}` form that matches nothing specific and defers to
    /// the booking method.
    pub fn is_empty(&self) -> bool {
        self.cost.is_none() && self.cost_currency.is_none() && self.date.is_none() && self.label.is_none()
    }
}

impl fmt::Display for LotSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let (Some(cost), Some(currency)) = (&self.cost, &self.cost_currency) {
            parts.push(format!("{} {}", cost, currency));
        }
        if let Some(date) = &self.date {
            parts.push(date.to_string());
        }
        if let Some(label) = &self.label {
            parts.push(format!("\"{}\"", label));
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A quantity of one commodity held at one lot identity. The units may be
/// negative; zero-unit lots are removed as soon as they appear.
#[derive(Clone, Debug, PartialEq)]
pub struct Lot {
    pub units: Decimal,
    pub spec: Option<LotSpec>,
}

impl fmt::Display for Lot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.spec {
            Some(spec) => write!(f, "{} {}", self.units, spec),
            None => write!(f, "{}", self.units),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum InventoryError {
    #[error("reduce amount must be negative")]
    ReduceNotNegative,

    #[error("lot not found: {commodity} {spec}")]
    LotNotFound { commodity: String, spec: LotSpec },

    #[error("insufficient amount in lot: {commodity} has {available}, need {requested}")]
    InsufficientLot {
        commodity: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("insufficient inventory: {commodity} has {available}, need {requested}")]
    Insufficient {
        commodity: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("STRICT booking requires a non-empty lot specification for {commodity}")]
    StrictRequiresSpec { commodity: String },

    #[error("cannot average lots of {commodity} held in different cost currencies")]
    MixedCostCurrencies { commodity: String },
}

/// Holdings of one account: commodity name to an insertion-ordered list of
/// lots. Buckets and lots vanish as soon as they reach zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    lots: BTreeMap<String, Vec<Lot>>,
}

impl Inventory {
    pub fn new() -> Self {
        Inventory::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Total units of a commodity across all of its lots.
    pub fn get(&self, commodity: &str) -> Decimal {
        self.lots
            .get(commodity)
            .map(|lots| lots.iter().map(|l| l.units).sum())
            .unwrap_or(Decimal::ZERO)
    }

    /// Commodities with at least one lot, in name order.
    pub fn currencies(&self) -> Vec<&str> {
        self.lots.keys().map(String::as_str).collect()
    }

    /// The lots of one commodity, in insertion order.
    pub fn lots(&self, commodity: &str) -> &[Lot] {
        self.lots.get(commodity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Adds units at the given lot identity, merging into an existing lot
    /// with an equal spec.
    pub fn add(&mut self, commodity: &str, units: Decimal, spec: Option<LotSpec>) {
        if units.is_zero() {
            return;
        }
        let bucket = self.lots.entry(commodity.to_string()).or_default();
        if let Some(lot) = bucket.iter_mut().find(|l| l.spec == spec) {
            lot.units += units;
        } else {
            bucket.push(Lot { units, spec });
        }
        Self::prune(&mut self.lots, commodity);
    }

    /// Removes units. `units` must be negative.
    ///
    /// Dispatch: a spec with components matches exactly that lot; the empty
    /// spec `{}` books through `method`; no spec at all bypasses matching
    /// and accumulates into the unconstrained bucket.
    pub fn reduce_lot(
        &mut self,
        commodity: &str,
        units: Decimal,
        spec: Option<&LotSpec>,
        method: Booking,
    ) -> InventoryResult<()> {
        if units >= Decimal::ZERO {
            return Err(InventoryError::ReduceNotNegative);
        }
        match spec {
            None => {
                self.add(commodity, units, None);
                Ok(())
            }
            Some(spec) if !spec.is_empty() => self.reduce_exact(commodity, units, spec),
            Some(_) => match method {
                Booking::None | Booking::Simple => {
                    self.lots
                        .entry(commodity.to_string())
                        .or_default()
                        .push(Lot { units, spec: None });
                    Self::prune(&mut self.lots, commodity);
                    Ok(())
                }
                Booking::Average => self.reduce_average(commodity, units),
                Booking::Fifo | Booking::Full => self.reduce_ordered(commodity, units, false),
                Booking::Lifo => self.reduce_ordered(commodity, units, true),
                Booking::Strict => Err(InventoryError::StrictRequiresSpec {
                    commodity: commodity.to_string(),
                }),
            },
        }
    }

    /// Read-only precheck: the errors `reduce_lot` would produce, without
    /// mutating.
    pub fn can_reduce_lot(
        &self,
        commodity: &str,
        units: Decimal,
        spec: Option<&LotSpec>,
        method: Booking,
    ) -> InventoryResult<()> {
        let mut scratch = self.clone();
        scratch.reduce_lot(commodity, units, spec, method)
    }

    fn reduce_exact(&mut self, commodity: &str, units: Decimal, spec: &LotSpec) -> InventoryResult<()> {
        let bucket = match self.lots.get_mut(commodity) {
            Some(bucket) => bucket,
            None => {
                return Err(InventoryError::LotNotFound {
                    commodity: commodity.to_string(),
                    spec: spec.clone(),
                })
            }
        };
        let lot = match bucket.iter_mut().find(|l| l.spec.as_ref() == Some(spec)) {
            Some(lot) => lot,
            None => {
                return Err(InventoryError::LotNotFound {
                    commodity: commodity.to_string(),
                    spec: spec.clone(),
                })
            }
        };
        if lot.units + units < Decimal::ZERO {
            return Err(InventoryError::InsufficientLot {
                commodity: commodity.to_string(),
                requested: -units,
                available: lot.units,
            });
        }
        lot.units += units;
        Self::prune(&mut self.lots, commodity);
        Ok(())
    }

    /// FIFO/LIFO drain. FIFO orders date-ascending with undated lots first;
    /// LIFO date-descending with dated lots first. Both sorts are stable so
    /// same-date lots drain in insertion order.
    fn reduce_ordered(&mut self, commodity: &str, units: Decimal, newest_first: bool) -> InventoryResult<()> {
        let requested = -units;
        let bucket = match self.lots.get_mut(commodity) {
            Some(bucket) => bucket,
            None => {
                return Err(InventoryError::Insufficient {
                    commodity: commodity.to_string(),
                    requested,
                    available: Decimal::ZERO,
                })
            }
        };

        let mut order: Vec<usize> = (0..bucket.len()).collect();
        if newest_first {
            order.sort_by(|&a, &b| {
                let ka = bucket[a].spec.as_ref().and_then(|s| s.date);
                let kb = bucket[b].spec.as_ref().and_then(|s| s.date);
                kb.cmp(&ka)
            });
        } else {
            order.sort_by_key(|&i| bucket[i].spec.as_ref().and_then(|s| s.date));
        }

        let available: Decimal = bucket
            .iter()
            .map(|l| l.units.max(Decimal::ZERO))
            .sum();
        if requested > available {
            return Err(InventoryError::Insufficient {
                commodity: commodity.to_string(),
                requested,
                available,
            });
        }

        let mut remaining = requested;
        for idx in order {
            if remaining.is_zero() {
                break;
            }
            let lot = &mut bucket[idx];
            if lot.units <= Decimal::ZERO {
                continue;
            }
            let take = remaining.min(lot.units);
            lot.units -= take;
            remaining -= take;
        }
        Self::prune(&mut self.lots, commodity);
        Ok(())
    }

    /// AVERAGE booking: collapse the whole bucket into one lot at the
    /// quantity-weighted average cost, then reduce that single lot.
    fn reduce_average(&mut self, commodity: &str, units: Decimal) -> InventoryResult<()> {
        let requested = -units;
        let bucket = match self.lots.get(commodity) {
            Some(bucket) => bucket,
            None => {
                return Err(InventoryError::Insufficient {
                    commodity: commodity.to_string(),
                    requested,
                    available: Decimal::ZERO,
                })
            }
        };

        let total_units: Decimal = bucket.iter().map(|l| l.units).sum();
        if total_units <= Decimal::ZERO || requested > total_units {
            return Err(InventoryError::Insufficient {
                commodity: commodity.to_string(),
                requested,
                available: total_units.max(Decimal::ZERO),
            });
        }

        let mut cost_currency: Option<String> = None;
        let mut total_cost = Decimal::ZERO;
        for lot in bucket {
            let spec = match &lot.spec {
                Some(spec) => spec,
                None => continue,
            };
            if let (Some(cost), Some(currency)) = (&spec.cost, &spec.cost_currency) {
                match &cost_currency {
                    Some(existing) if existing != currency => {
                        return Err(InventoryError::MixedCostCurrencies {
                            commodity: commodity.to_string(),
                        })
                    }
                    Some(_) => {}
                    None => cost_currency = Some(currency.clone()),
                }
                total_cost += lot.units * *cost;
            }
        }

        let remaining_units = total_units + units;
        let merged_spec = cost_currency.map(|currency| LotSpec {
            cost: Some(total_cost / total_units),
            cost_currency: Some(currency),
            date: None,
            label: None,
        });

        if remaining_units.is_zero() {
            self.lots.remove(commodity);
        } else {
            self.lots.insert(
                commodity.to_string(),
                vec![Lot {
                    units: remaining_units,
                    spec: merged_spec,
                }],
            );
        }
        Ok(())
    }

    fn prune(lots: &mut BTreeMap<String, Vec<Lot>>, commodity: &str) {
        if let Some(bucket) = lots.get_mut(commodity) {
            bucket.retain(|l| !l.units.is_zero());
            if bucket.is_empty() {
                lots.remove(commodity);
            }
        }
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lots.is_empty() {
            return write!(f, "(empty)");
        }
        let mut first = true;
        for (commodity, bucket) in &self.lots {
            for lot in bucket {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{} {}", lot, commodity)?;
                first = false;
            }
        }
        Ok(())
    }
}
