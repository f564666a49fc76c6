//! Posting weights: each posting's contribution to its transaction's
//! balance, in the currency that dominates it (cost first, then price, then
//! the amount itself).

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use beanledger_core::CostSpec;

#[derive(Clone, Debug, PartialEq)]
pub struct Weight {
    pub number: Decimal,
    pub currency: String,
}

/// A price annotation with its amount already evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPrice {
    pub num: Decimal,
    pub currency: String,
    pub total: bool,
}

/// The weight of a posting with resolved units, or `None` when the weight
/// must wait for cost inference (`{}`, `{*}`, or a cost spec that matches
/// lots without stating a cost amount).
pub fn posting_weight(
    units: Decimal,
    units_currency: &str,
    cost: Option<&CostSpec<'_>>,
    price: Option<&ResolvedPrice>,
) -> Option<Weight> {
    if let Some(cost) = cost {
        if cost.merge {
            return None;
        }
        if let (Some(total), Some(currency)) = (&cost.number_total, &cost.currency) {
            let signed = if units.is_sign_negative() { -total.abs() } else { total.abs() };
            return Some(Weight {
                number: signed,
                currency: currency.to_string(),
            });
        }
        if let (Some(per), Some(currency)) = (&cost.number_per, &cost.currency) {
            return Some(Weight {
                number: units * *per,
                currency: currency.to_string(),
            });
        }
        // A cost without a stated amount ({} or {2020-01-02}) defers to
        // inference.
        return None;
    }
    if let Some(price) = price {
        let number = if price.total {
            if units.is_sign_negative() {
                -price.num.abs()
            } else {
                price.num.abs()
            }
        } else {
            units * price.num
        };
        return Some(Weight {
            number,
            currency: price.currency.clone(),
        });
    }
    Some(Weight {
        number: units,
        currency: units_currency.to_string(),
    })
}

/// Sums weights per currency and keeps the nonzero sums, in currency order.
pub fn residuals<'w>(weights: impl IntoIterator<Item = &'w Weight>) -> Vec<(String, Decimal)> {
    let mut sums: BTreeMap<&str, Decimal> = BTreeMap::new();
    for weight in weights {
        *sums.entry(weight.currency.as_str()).or_insert(Decimal::ZERO) += weight.number;
    }
    sums.into_iter()
        .filter(|(_, sum)| !sum.is_zero())
        .map(|(currency, sum)| (currency.to_string(), sum))
        .collect()
}

/// The per-unit cost a lot is booked at: the stated per-unit number, or a
/// total cost spread over the quantity. The caller must have rejected
/// zero quantities for total costs already.
pub fn per_unit_cost(cost: &CostSpec<'_>, quantity: Decimal) -> Option<Decimal> {
    if let Some(per) = cost.number_per {
        return Some(per);
    }
    if let Some(total) = cost.number_total {
        if quantity.is_zero() {
            return None;
        }
        return Some(total.abs() / quantity.abs());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cost(per: Option<Decimal>, total: Option<Decimal>, currency: &str) -> CostSpec<'static> {
        CostSpec {
            number_per: per,
            number_total: total,
            currency: Some(currency.to_string().into()),
            date: None,
            label: None,
            merge: false,
        }
    }

    fn price_per(num: Decimal, currency: &str) -> ResolvedPrice {
        ResolvedPrice {
            num,
            currency: currency.to_string(),
            total: false,
        }
    }

    #[test]
    fn bare_amount_weighs_itself() {
        let w = posting_weight(dec!(100), "USD", None, None).unwrap();
        assert_eq!(w.number, dec!(100));
        assert_eq!(w.currency, "USD");
    }

    #[test]
    fn per_unit_cost_dominates() {
        let c = cost(Some(dec!(2.5)), None, "USD");
        let w = posting_weight(dec!(10), "STOCK", Some(&c), None).unwrap();
        assert_eq!(w.number, dec!(25.0));
        assert_eq!(w.currency, "USD");
    }

    #[test]
    fn total_cost_takes_the_units_sign() {
        let c = cost(None, Some(dec!(1000)), "USD");
        let buy = posting_weight(dec!(10), "STOCK", Some(&c), None).unwrap();
        assert_eq!(buy.number, dec!(1000));
        let sell = posting_weight(dec!(-10), "STOCK", Some(&c), None).unwrap();
        assert_eq!(sell.number, dec!(-1000));
    }

    #[test]
    fn cost_beats_price() {
        let c = cost(Some(dec!(2)), None, "USD");
        let p = price_per(dec!(99), "EUR");
        let w = posting_weight(dec!(10), "STOCK", Some(&c), Some(&p)).unwrap();
        assert_eq!(w.currency, "USD");
        assert_eq!(w.number, dec!(20));
    }

    #[test]
    fn price_weighs_when_no_cost() {
        let p = price_per(dec!(1.09), "CAD");
        let w = posting_weight(dec!(-400.00), "USD", None, Some(&p)).unwrap();
        assert_eq!(w.currency, "CAD");
        assert_eq!(w.number, dec!(-400.00) * dec!(1.09));
    }

    #[test]
    fn total_price_takes_the_units_sign() {
        let p = ResolvedPrice {
            num: dec!(436.01),
            currency: "CAD".to_string(),
            total: true,
        };
        let w = posting_weight(dec!(-400.00), "USD", None, Some(&p)).unwrap();
        assert_eq!(w.number, dec!(-436.01));
    }

    #[test]
    fn empty_and_merge_costs_defer() {
        let empty = CostSpec::default();
        assert!(posting_weight(dec!(-10), "STOCK", Some(&empty), None).is_none());
        let merge = CostSpec {
            merge: true,
            ..CostSpec::default()
        };
        assert!(posting_weight(dec!(-10), "STOCK", Some(&merge), None).is_none());
    }

    #[test]
    fn residuals_sum_and_drop_zeroes() {
        let weights = vec![
            Weight { number: dec!(100), currency: "USD".to_string() },
            Weight { number: dec!(-100), currency: "USD".to_string() },
            Weight { number: dec!(3), currency: "EUR".to_string() },
        ];
        assert_eq!(residuals(&weights), vec![("EUR".to_string(), dec!(3))]);
    }

    #[test]
    fn total_cost_normalizes_per_unit() {
        let c = cost(None, Some(dec!(1000)), "USD");
        assert_eq!(per_unit_cost(&c, dec!(-10)), Some(dec!(100)));
        assert_eq!(per_unit_cost(&c, Decimal::ZERO), None);
    }
}
