//! `crebit-ledger` — account ledger domain.
//!
//! Pure decision logic for the ledger: account balance arithmetic with the
//! overdraft invariant, transaction commands and their validation, and the
//! statement read model. No IO; persistence and serialization of calls live
//! in `crebit-infra`.

pub mod account;
pub mod statement;
pub mod transaction;

pub use account::Account;
pub use statement::Statement;
pub use transaction::{
    DESCRIPTION_MAX_CHARS, LedgerEntry, TransactionCommand, TransactionKind,
};
