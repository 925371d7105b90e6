//! Infrastructure Database Layer
//!
//! PostgreSQL adapter for the loan ledger. [`PgLedgerStore`] implements the
//! `LedgerStore` port from `domain_ledger` over a SQLx connection pool, and
//! [`schema::apply_schema`] bootstraps the tables on first run.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{apply_schema, create_pool, DatabaseConfig, PgLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::from_env()?).await?;
//! apply_schema(&pool).await?;
//! let store = PgLedgerStore::new(pool);
//! ```

pub mod error;
pub mod pool;
pub mod repositories;
pub mod schema;

pub use error::DatabaseError;
pub use pool::{create_pool, DatabaseConfig, DatabasePool};
pub use repositories::PgLedgerStore;
pub use schema::apply_schema;
