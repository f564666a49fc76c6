//! Processing engine for beanledger: takes the parsed directive stream from
//! `beanledger-core` and turns it into validated world state: accounts with
//! lot-tracked inventories, an account/currency graph, a temporal price
//! graph, synthesized padding transactions and a structured error list.

pub use account::{Account, AppliedPosting};
pub use config::{AccountTypeNames, Config};
pub use error::{ErrorKind, LedgerError, ProcessError};
pub use expr::{eval_amount, ExprError};
pub use graph::{Edge, EdgeKind, Graph, GraphError, Node, NodeKind};
pub use inventory::{Inventory, InventoryError, Lot, LotSpec};
pub use ledger::{CancelSignal, Ledger, PadEntry, PadState};
pub use prices::{PriceError, PriceGraph};
pub use tolerance::ToleranceConfig;
pub use views::{BalanceTreeNode, ViewError};
pub use weight::{posting_weight, residuals, ResolvedPrice, Weight};

pub mod account;
pub mod config;
pub mod error;
pub mod expr;
pub mod graph;
mod handlers;
pub mod inventory;
pub mod ledger;
pub mod prices;
pub mod tolerance;
pub mod views;
pub mod weight;
