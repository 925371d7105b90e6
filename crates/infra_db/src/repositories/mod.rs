//! Repository implementations over the connection pool

pub mod ledger;

pub use ledger::PgLedgerStore;
