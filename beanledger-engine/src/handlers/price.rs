use rust_decimal::Decimal;

use beanledger_core::Price;

use crate::error::{ErrorKind, LedgerError};
use crate::expr;
use crate::handlers::DirectiveProcess;
use crate::ledger::Ledger;

impl<'a> DirectiveProcess<'a> for Price<'a> {
    type Delta = Decimal;

    fn validate(&self, _ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<Decimal>) {
        let rate = match expr::eval_amount(&self.amount.expr) {
            Ok(rate) => rate,
            Err(err) => {
                let kind = ErrorKind::InvalidDirectivePrice {
                    currency: self.currency.to_string(),
                    reason: err.to_string(),
                };
                return (super::locate(vec![kind], &self.pos, Some(self.date)), None);
            }
        };
        if rate <= Decimal::ZERO {
            let kind = ErrorKind::InvalidDirectivePrice {
                currency: self.currency.to_string(),
                reason: format!("rate must be positive, got {}", rate),
            };
            return (super::locate(vec![kind], &self.pos, Some(self.date)), None);
        }
        (Vec::new(), Some(rate))
    }

    fn apply(&mut self, ledger: &mut Ledger<'a>, rate: Decimal, _index: usize) {
        ledger.record_price(self.date, &self.currency, &self.amount.currency, rate, false);
    }
}
