use std::str::FromStr;

use beanledger_core::{metadata, AccountType, Booking, Open, OwnedMeta};

use crate::account::Account;
use crate::error::{ErrorKind, LedgerError};
use crate::handlers::DirectiveProcess;
use crate::ledger::Ledger;

pub(crate) struct OpenDelta {
    name: String,
    ty: AccountType,
    currencies: Vec<String>,
    booking: Booking,
    meta: OwnedMeta,
}

impl<'a> DirectiveProcess<'a> for Open<'a> {
    type Delta = OpenDelta;

    fn validate(&self, ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<OpenDelta>) {
        let mut errors = Vec::new();
        let name = self.account.name();

        let ty = match ledger.config.account_types.type_of(self.account.root()) {
            Some(ty) => Some(ty),
            None => {
                errors.push(ErrorKind::InvalidAccountName {
                    account: name.clone(),
                    root: self.account.root().to_string(),
                });
                None
            }
        };

        if ledger.accounts.contains_key(&name) {
            errors.push(ErrorKind::AccountAlreadyOpen {
                account: name.clone(),
            });
        }

        let booking = match &self.booking {
            Some(raw) => match Booking::from_str(raw) {
                Ok(method) => Some(method),
                Err(_) => {
                    errors.push(ErrorKind::InvalidBooking {
                        account: name.clone(),
                        value: raw.to_string(),
                    });
                    None
                }
            },
            None => Some(ledger.config.booking),
        };

        if !errors.is_empty() {
            return (super::locate(errors, &self.pos, Some(self.date)), None);
        }
        let delta = OpenDelta {
            name,
            ty: ty.expect("validated account type"),
            currencies: self.currencies.iter().map(|c| c.to_string()).collect(),
            booking: booking.expect("validated booking method"),
            meta: metadata::meta_to_owned(&self.meta),
        };
        (Vec::new(), Some(delta))
    }

    fn apply(&mut self, ledger: &mut Ledger<'a>, delta: OpenDelta, _index: usize) {
        let account = Account::new(
            delta.name.clone(),
            delta.ty,
            self.date,
            delta.currencies.clone(),
            delta.booking,
            delta.meta.clone(),
        );
        ledger.register_account_nodes(&delta.name, self.date, delta.meta, &delta.currencies);
        ledger.accounts.insert(delta.name, account);
    }
}
