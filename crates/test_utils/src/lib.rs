//! Test Utilities Crate
//!
//! Shared test infrastructure for the loanbook workspace.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built amounts, dates, and identifiers
//! - `builders`: Builder for test loans with sensible defaults
//! - `stores`: Seeded in-memory ledger stores

pub mod builders;
pub mod fixtures;
pub mod stores;

pub use builders::*;
pub use fixtures::*;
pub use stores::*;
