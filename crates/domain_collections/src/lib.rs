//! Collection analytics over the loan ledger
//!
//! Rollups are split in two layers: [`summary`] holds pure functions over
//! the joined snapshot rows, and [`service::CollectionAggregator`] fetches
//! the snapshot through the ledger store port. Every report takes an
//! explicit anchor date so results are reproducible.

pub mod buckets;
pub mod error;
pub mod service;
pub mod summary;

pub use buckets::AgeingBucket;
pub use error::CollectionsError;
pub use service::{
    CollectionAggregator, DEFAULT_DAILY_WINDOW_DAYS, DEFAULT_TREND_WINDOW_MONTHS,
};
pub use summary::{
    collection_percentage, BranchSummary, DailySummary, MonthlySummary, OverdueBucketSummary,
    TodaySummary, TrendPoint,
};
