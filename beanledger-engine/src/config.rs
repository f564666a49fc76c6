//! Process-wide configuration assembled from `option` directives.

use std::str::FromStr;

use log::warn;
use rust_decimal::Decimal;

use beanledger_core::{AccountType, Booking};

use crate::tolerance::ToleranceConfig;

/// The configurable root segment of each account type.
#[derive(Clone, Debug, PartialEq)]
pub struct AccountTypeNames {
    pub assets: String,
    pub liabilities: String,
    pub equity: String,
    pub income: String,
    pub expenses: String,
}

impl Default for AccountTypeNames {
    fn default() -> Self {
        AccountTypeNames {
            assets: AccountType::Assets.default_name().to_string(),
            liabilities: AccountType::Liabilities.default_name().to_string(),
            equity: AccountType::Equity.default_name().to_string(),
            income: AccountType::Income.default_name().to_string(),
            expenses: AccountType::Expenses.default_name().to_string(),
        }
    }
}

impl AccountTypeNames {
    /// Resolves a root segment against the configured names.
    pub fn type_of(&self, root: &str) -> Option<AccountType> {
        if root == self.assets {
            Some(AccountType::Assets)
        } else if root == self.liabilities {
            Some(AccountType::Liabilities)
        } else if root == self.equity {
            Some(AccountType::Equity)
        } else if root == self.income {
            Some(AccountType::Income)
        } else if root == self.expenses {
            Some(AccountType::Expenses)
        } else {
            None
        }
    }

    pub fn name_of(&self, ty: AccountType) -> &str {
        match ty {
            AccountType::Assets => &self.assets,
            AccountType::Liabilities => &self.liabilities,
            AccountType::Equity => &self.equity,
            AccountType::Income => &self.income,
            AccountType::Expenses => &self.expenses,
        }
    }
}

/// Everything the processing loop needs to know up front, with the
/// `option` keys of the input applied on top of the defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub tolerance: ToleranceConfig,
    /// Default booking method for accounts that do not name their own;
    /// only `SIMPLE` or `FULL` may be set process-wide.
    pub booking: Booking,
    pub account_types: AccountTypeNames,
    /// Advisory list used by reports.
    pub operating_currencies: Vec<String>,
    /// Leaf under the equity root receiving closing-entry offsets.
    pub earnings_leaf: String,
    pub title: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tolerance: ToleranceConfig::default(),
            booking: Booking::Simple,
            account_types: AccountTypeNames::default(),
            operating_currencies: Vec::new(),
            earnings_leaf: "Earnings".to_string(),
            title: None,
        }
    }
}

impl Config {
    /// The full name of the earnings account closing entries post to.
    pub fn earnings_account(&self) -> String {
        format!("{}:{}", self.account_types.equity, self.earnings_leaf)
    }

    /// Applies one recognized `option` key. Unknown keys are left to the
    /// caller's options bag; malformed values for known keys are logged and
    /// skipped so one bad option cannot poison the run.
    pub fn apply_option(&mut self, key: &str, value: &str) {
        match key {
            "inferred_tolerance_default" => match parse_tolerance_default(value) {
                Some((currency, tolerance)) => {
                    if currency == "*" {
                        self.tolerance.wildcard = Some(tolerance);
                    } else {
                        self.tolerance.defaults.insert(currency, tolerance);
                    }
                }
                None => warn!("ignoring malformed inferred_tolerance_default: {:?}", value),
            },
            "inferred_tolerance_multiplier" => match Decimal::from_str(value) {
                Ok(m) if m > Decimal::ZERO && m <= Decimal::ONE => self.tolerance.multiplier = m,
                _ => warn!("ignoring inferred_tolerance_multiplier outside (0, 1]: {:?}", value),
            },
            "infer_tolerance_from_cost" => match value {
                "TRUE" => self.tolerance.infer_from_cost = true,
                "FALSE" => self.tolerance.infer_from_cost = false,
                _ => warn!("ignoring non-boolean infer_tolerance_from_cost: {:?}", value),
            },
            "booking_method" => match value.parse::<Booking>() {
                Ok(method @ Booking::Simple) | Ok(method @ Booking::Full) => self.booking = method,
                _ => warn!("ignoring booking_method other than SIMPLE/FULL: {:?}", value),
            },
            "name_assets" => self.account_types.assets = value.to_string(),
            "name_liabilities" => self.account_types.liabilities = value.to_string(),
            "name_equity" => self.account_types.equity = value.to_string(),
            "name_income" => self.account_types.income = value.to_string(),
            "name_expenses" => self.account_types.expenses = value.to_string(),
            "operating_currency" => self.operating_currencies.push(value.to_string()),
            "title" => self.title = Some(value.to_string()),
            _ => {}
        }
    }
}

fn parse_tolerance_default(value: &str) -> Option<(String, Decimal)> {
    let (currency, tolerance) = value.split_once(':')?;
    let tolerance = Decimal::from_str(tolerance.trim()).ok()?;
    Some((currency.trim().to_string(), tolerance))
}
