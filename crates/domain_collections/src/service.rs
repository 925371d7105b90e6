//! Store-backed collection reporting service

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::debug;

use domain_ledger::LedgerStore;

use crate::error::CollectionsError;
use crate::summary::{
    self, BranchSummary, DailySummary, MonthlySummary, OverdueBucketSummary, TodaySummary,
    TrendPoint,
};

/// Default trailing window for the daily rollup
pub const DEFAULT_DAILY_WINDOW_DAYS: u64 = 30;

/// Default window for the monthly trend line
pub const DEFAULT_TREND_WINDOW_MONTHS: u32 = 12;

/// Read-only reporting facade over the ledger store. Fetches one snapshot
/// per call and aggregates in process; never mutates state.
pub struct CollectionAggregator {
    store: Arc<dyn LedgerStore>,
}

impl CollectionAggregator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn monthly_summary(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<MonthlySummary>, CollectionsError> {
        let rows = self.store.collection_rows().await?;
        debug!(rows = rows.len(), %as_of, "computing monthly summary");
        Ok(summary::monthly_summary(&rows, as_of))
    }

    /// Daily rollup; without an explicit range, covers the thirty days
    /// ending at `as_of`.
    pub async fn daily_summary(
        &self,
        as_of: NaiveDate,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<DailySummary>, CollectionsError> {
        let end = end.unwrap_or(as_of);
        let start = start.unwrap_or_else(|| {
            end.checked_sub_days(Days::new(DEFAULT_DAILY_WINDOW_DAYS - 1))
                .unwrap_or(NaiveDate::MIN)
        });
        if start > end {
            return Err(CollectionsError::invalid_input(format!(
                "range start {start} is after end {end}"
            )));
        }
        let rows = self.store.collection_rows().await?;
        Ok(summary::daily_summary(&rows, start, end))
    }

    pub async fn branch_summary(&self) -> Result<Vec<BranchSummary>, CollectionsError> {
        let rows = self.store.collection_rows().await?;
        Ok(summary::branch_summary(&rows))
    }

    pub async fn overdue_buckets(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<OverdueBucketSummary>, CollectionsError> {
        let rows = self.store.collection_rows().await?;
        debug!(rows = rows.len(), %as_of, "computing overdue ageing");
        Ok(summary::overdue_buckets(&rows, as_of))
    }

    pub async fn trends(
        &self,
        as_of: NaiveDate,
        window_months: Option<u32>,
    ) -> Result<Vec<TrendPoint>, CollectionsError> {
        let window = window_months.unwrap_or(DEFAULT_TREND_WINDOW_MONTHS);
        if window == 0 {
            return Err(CollectionsError::invalid_input(
                "trend window must cover at least one month",
            ));
        }
        let rows = self.store.collection_rows().await?;
        Ok(summary::trends(&rows, as_of, window))
    }

    pub async fn today_summary(&self, as_of: NaiveDate) -> Result<TodaySummary, CollectionsError> {
        let rows = self.store.collection_rows().await?;
        Ok(summary::today_summary(&rows, as_of))
    }
}
