//! Pure aggregation over ledger snapshot rows
//!
//! Every function here takes the joined loan/installment/payment snapshot and
//! an explicit anchor date. Nothing reads the wall clock or touches the
//! store, so each rollup is testable row-by-row. All rollups consider only
//! installments on Active loans; Closed, Foreclosed, and Default loans are
//! out of the collection book.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use core_kernel::{LoanId, Money};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use domain_ledger::{CollectionRow, InstallmentStatus, LoanStatus};

use crate::buckets::AgeingBucket;

/// `100 * collected / demand` rounded to 2 dp; zero demand yields 0
pub fn collection_percentage(collected: Money, demand: Money) -> Decimal {
    if demand.is_zero() {
        return Decimal::ZERO;
    }
    (collected.amount() * dec!(100) / demand.amount()).round_dp(2)
}

fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

fn month_label(key: (i32, u32)) -> String {
    format!("{:04}-{:02}", key.0, key.1)
}

/// Whole months between two (year, month) keys, positive when `later` is later
fn months_between(later: (i32, u32), earlier: (i32, u32)) -> i64 {
    (i64::from(later.0) * 12 + i64::from(later.1))
        - (i64::from(earlier.0) * 12 + i64::from(earlier.1))
}

fn active_rows(rows: &[CollectionRow]) -> impl Iterator<Item = &CollectionRow> + '_ {
    rows.iter().filter(|r| r.loan_status == LoanStatus::Active)
}

/// Demand and collection for one due-month
#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    /// Due month as `YYYY-MM`
    pub month: String,
    pub total_emis: u64,
    pub unique_loans: u64,
    pub demand: Money,
    pub collected: Money,
    pub pending: Money,
    pub collection_percentage: Decimal,
    pub paid_count: u64,
    pub pending_count: u64,
    pub overdue_count: u64,
}

#[derive(Default)]
struct MonthAcc {
    total_emis: u64,
    loans: BTreeSet<LoanId>,
    demand: Money,
    collected: Money,
    paid_count: u64,
    pending_count: u64,
    overdue_count: u64,
}

/// Per-due-month rollup for the 12 months ending at `as_of`'s month,
/// most recent month first. Months with no installments are omitted.
pub fn monthly_summary(rows: &[CollectionRow], as_of: NaiveDate) -> Vec<MonthlySummary> {
    let anchor = month_key(as_of);
    let mut months: BTreeMap<(i32, u32), MonthAcc> = BTreeMap::new();

    for row in active_rows(rows) {
        let key = month_key(row.due_date);
        if !(0..12).contains(&months_between(anchor, key)) {
            continue;
        }
        let acc = months.entry(key).or_default();
        acc.total_emis += 1;
        acc.loans.insert(row.loan_id.clone());
        acc.demand = acc.demand + row.amount;
        acc.collected = acc.collected + row.collected;
        match row.status {
            InstallmentStatus::Paid => acc.paid_count += 1,
            InstallmentStatus::Pending => acc.pending_count += 1,
            InstallmentStatus::Overdue => acc.overdue_count += 1,
            _ => {}
        }
    }

    months
        .into_iter()
        .rev()
        .map(|(key, acc)| MonthlySummary {
            month: month_label(key),
            total_emis: acc.total_emis,
            unique_loans: acc.loans.len() as u64,
            demand: acc.demand,
            collected: acc.collected,
            pending: acc.demand.saturating_sub(acc.collected),
            collection_percentage: collection_percentage(acc.collected, acc.demand),
            paid_count: acc.paid_count,
            pending_count: acc.pending_count,
            overdue_count: acc.overdue_count,
        })
        .collect()
}

/// Demand and collection for one due-date
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Full weekday name, e.g. `Monday`
    pub weekday: String,
    pub total_emis: u64,
    pub demand: Money,
    pub collected: Money,
    pub pending: Money,
    pub collection_percentage: Decimal,
}

#[derive(Default)]
struct DayAcc {
    total_emis: u64,
    demand: Money,
    collected: Money,
}

/// Per-due-date rollup for `start..=end`, chronological. Dates with no
/// installments are omitted.
pub fn daily_summary(rows: &[CollectionRow], start: NaiveDate, end: NaiveDate) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, DayAcc> = BTreeMap::new();

    for row in active_rows(rows) {
        if row.due_date < start || row.due_date > end {
            continue;
        }
        let acc = days.entry(row.due_date).or_default();
        acc.total_emis += 1;
        acc.demand = acc.demand + row.amount;
        acc.collected = acc.collected + row.collected;
    }

    days.into_iter()
        .map(|(date, acc)| DailySummary {
            date,
            weekday: date.format("%A").to_string(),
            total_emis: acc.total_emis,
            demand: acc.demand,
            collected: acc.collected,
            pending: acc.demand.saturating_sub(acc.collected),
            collection_percentage: collection_percentage(acc.collected, acc.demand),
        })
        .collect()
}

/// Demand and collection for one branch across the whole book
#[derive(Debug, Clone, Serialize)]
pub struct BranchSummary {
    pub branch: String,
    pub total_emis: u64,
    pub unique_loans: u64,
    pub demand: Money,
    pub collected: Money,
    pub pending: Money,
    pub collection_percentage: Decimal,
}

/// Per-branch rollup, best collection percentage first; ties broken by
/// demand descending so the highest-value branch ranks first.
pub fn branch_summary(rows: &[CollectionRow]) -> Vec<BranchSummary> {
    let mut branches: BTreeMap<String, MonthAcc> = BTreeMap::new();

    for row in active_rows(rows) {
        let acc = branches.entry(row.branch.clone()).or_default();
        acc.total_emis += 1;
        acc.loans.insert(row.loan_id.clone());
        acc.demand = acc.demand + row.amount;
        acc.collected = acc.collected + row.collected;
    }

    let mut out: Vec<BranchSummary> = branches
        .into_iter()
        .map(|(branch, acc)| BranchSummary {
            branch,
            total_emis: acc.total_emis,
            unique_loans: acc.loans.len() as u64,
            demand: acc.demand,
            collected: acc.collected,
            pending: acc.demand.saturating_sub(acc.collected),
            collection_percentage: collection_percentage(acc.collected, acc.demand),
        })
        .collect();
    out.sort_by(|a, b| {
        b.collection_percentage
            .cmp(&a.collection_percentage)
            .then(b.demand.cmp(&a.demand))
    });
    out
}

/// Ageing band rollup for past-due installments
#[derive(Debug, Clone, Serialize)]
pub struct OverdueBucketSummary {
    pub bucket: AgeingBucket,
    pub count: u64,
    pub unique_loans: u64,
    pub overdue_amount: Money,
    pub avg_days_overdue: Decimal,
}

#[derive(Default)]
struct BucketAcc {
    count: u64,
    loans: BTreeSet<LoanId>,
    amount: Money,
    total_days: i64,
}

/// Ageing of Pending/Overdue installments due strictly before `as_of`,
/// ascending by band lower bound. Empty bands are omitted.
pub fn overdue_buckets(rows: &[CollectionRow], as_of: NaiveDate) -> Vec<OverdueBucketSummary> {
    let mut buckets: BTreeMap<AgeingBucket, BucketAcc> = BTreeMap::new();

    for row in active_rows(rows) {
        if !row.status.is_collectible() || row.due_date >= as_of {
            continue;
        }
        let days = (as_of - row.due_date).num_days();
        let Some(bucket) = AgeingBucket::for_days(days) else {
            continue;
        };
        let acc = buckets.entry(bucket).or_default();
        acc.count += 1;
        acc.loans.insert(row.loan_id.clone());
        acc.amount = acc.amount + row.amount;
        acc.total_days += days;
    }

    buckets
        .into_iter()
        .map(|(bucket, acc)| OverdueBucketSummary {
            bucket,
            count: acc.count,
            unique_loans: acc.loans.len() as u64,
            overdue_amount: acc.amount,
            avg_days_overdue: (Decimal::from(acc.total_days) / Decimal::from(acc.count))
                .round_dp(2),
        })
        .collect()
}

/// One month of the collection trend line
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub month: String,
    pub demand: Money,
    pub collected: Money,
    pub collection_rate: Decimal,
    pub active_loan_count: u64,
}

/// Monthly demand/collection trend for the `window_months` ending at
/// `as_of`'s month, chronological for charting.
pub fn trends(rows: &[CollectionRow], as_of: NaiveDate, window_months: u32) -> Vec<TrendPoint> {
    let anchor = month_key(as_of);
    let mut months: BTreeMap<(i32, u32), MonthAcc> = BTreeMap::new();

    for row in active_rows(rows) {
        let key = month_key(row.due_date);
        if !(0..i64::from(window_months)).contains(&months_between(anchor, key)) {
            continue;
        }
        let acc = months.entry(key).or_default();
        acc.loans.insert(row.loan_id.clone());
        acc.demand = acc.demand + row.amount;
        acc.collected = acc.collected + row.collected;
    }

    months
        .into_iter()
        .map(|(key, acc)| TrendPoint {
            month: month_label(key),
            demand: acc.demand,
            collected: acc.collected,
            collection_rate: collection_percentage(acc.collected, acc.demand),
            active_loan_count: acc.loans.len() as u64,
        })
        .collect()
}

/// Collection position for installments due exactly on one date
#[derive(Debug, Clone, Serialize)]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub demand: Money,
    pub collected: Money,
    pub pending: Money,
    pub collection_percentage: Decimal,
    pub emi_count: u64,
    pub unique_loan_count: u64,
}

/// Position for installments due exactly on `as_of`
pub fn today_summary(rows: &[CollectionRow], as_of: NaiveDate) -> TodaySummary {
    let mut acc = MonthAcc::default();
    for row in active_rows(rows) {
        if row.due_date != as_of {
            continue;
        }
        acc.total_emis += 1;
        acc.loans.insert(row.loan_id.clone());
        acc.demand = acc.demand + row.amount;
        acc.collected = acc.collected + row.collected;
    }
    TodaySummary {
        date: as_of,
        demand: acc.demand,
        collected: acc.collected,
        pending: acc.demand.saturating_sub(acc.collected),
        collection_percentage: collection_percentage(acc.collected, acc.demand),
        emi_count: acc.total_emis,
        unique_loan_count: acc.loans.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(
        loan: &str,
        branch: &str,
        loan_status: LoanStatus,
        due: NaiveDate,
        amount: i64,
        status: InstallmentStatus,
        collected: i64,
    ) -> CollectionRow {
        CollectionRow {
            loan_id: LoanId::new(loan).unwrap(),
            branch: branch.to_string(),
            loan_status,
            due_date: due,
            amount: Money::from_rupees(amount),
            status,
            collected: Money::from_rupees(collected),
        }
    }

    #[test]
    fn test_percentage_rounds_to_two_places() {
        let pct = collection_percentage(Money::from_rupees(1), Money::from_rupees(3));
        assert_eq!(pct, dec!(33.33));
    }

    #[test]
    fn test_percentage_zero_demand_is_zero() {
        assert_eq!(
            collection_percentage(Money::from_rupees(500), Money::ZERO),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_monthly_excludes_non_active_loans_and_old_months() {
        let as_of = date(2024, 6, 15);
        let rows = vec![
            row("L-1", "Pune", LoanStatus::Active, date(2024, 6, 3), 1000, InstallmentStatus::Paid, 1000),
            row("L-1", "Pune", LoanStatus::Active, date(2024, 5, 27), 1000, InstallmentStatus::Pending, 0),
            // defaulted loan must not appear
            row("L-2", "Pune", LoanStatus::Default, date(2024, 6, 3), 9000, InstallmentStatus::Pending, 0),
            // older than 12 months
            row("L-1", "Pune", LoanStatus::Active, date(2023, 6, 3), 1000, InstallmentStatus::Paid, 1000),
        ];

        let summary = monthly_summary(&rows, as_of);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].month, "2024-06");
        assert_eq!(summary[1].month, "2024-05");
        assert_eq!(summary[0].demand, Money::from_rupees(1000));
        assert_eq!(summary[0].collection_percentage, dec!(100.00));
        assert_eq!(summary[1].collection_percentage, dec!(0.00));
        assert_eq!(summary[0].paid_count, 1);
        assert_eq!(summary[1].pending_count, 1);
    }

    #[test]
    fn test_monthly_window_includes_anchor_month_boundary() {
        let as_of = date(2024, 6, 15);
        let rows = vec![
            row("L-1", "Pune", LoanStatus::Active, date(2023, 7, 1), 500, InstallmentStatus::Paid, 500),
            row("L-1", "Pune", LoanStatus::Active, date(2023, 6, 30), 500, InstallmentStatus::Paid, 500),
        ];
        let summary = monthly_summary(&rows, as_of);
        // July 2023 is eleven months back and stays; June 2023 falls out
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].month, "2023-07");
    }

    #[test]
    fn test_daily_range_and_weekday() {
        let rows = vec![
            row("L-1", "Pune", LoanStatus::Active, date(2024, 3, 4), 700, InstallmentStatus::Paid, 700),
            row("L-2", "Pune", LoanStatus::Active, date(2024, 3, 4), 300, InstallmentStatus::Pending, 0),
            row("L-1", "Pune", LoanStatus::Active, date(2024, 3, 11), 700, InstallmentStatus::Pending, 0),
            row("L-1", "Pune", LoanStatus::Active, date(2024, 2, 1), 700, InstallmentStatus::Paid, 700),
        ];
        let days = daily_summary(&rows, date(2024, 3, 1), date(2024, 3, 31));
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(2024, 3, 4));
        assert_eq!(days[0].weekday, "Monday");
        assert_eq!(days[0].total_emis, 2);
        assert_eq!(days[0].demand, Money::from_rupees(1000));
        assert_eq!(days[0].collection_percentage, dec!(70.00));
        assert_eq!(days[1].date, date(2024, 3, 11));
    }

    #[test]
    fn test_branch_ranking_percentage_then_demand() {
        let due = date(2024, 4, 1);
        let rows = vec![
            // Nashik: 60% of 10000
            row("L-1", "Nashik", LoanStatus::Active, due, 10_000, InstallmentStatus::Partial, 6_000),
            // Pune: 95% of 20000
            row("L-2", "Pune", LoanStatus::Active, due, 20_000, InstallmentStatus::Partial, 19_000),
            // Satara: 95% of 40000, outranks Pune on demand
            row("L-3", "Satara", LoanStatus::Active, due, 40_000, InstallmentStatus::Partial, 38_000),
            // Akola: 80% of 5000
            row("L-4", "Akola", LoanStatus::Active, due, 5_000, InstallmentStatus::Partial, 4_000),
        ];
        let branches = branch_summary(&rows);
        let order: Vec<&str> = branches.iter().map(|b| b.branch.as_str()).collect();
        assert_eq!(order, ["Satara", "Pune", "Akola", "Nashik"]);
    }

    #[test]
    fn test_overdue_buckets_edges_and_omission() {
        let as_of = date(2024, 5, 1);
        let rows = vec![
            // 7 days overdue, first band upper edge
            row("L-1", "Pune", LoanStatus::Active, date(2024, 4, 24), 1000, InstallmentStatus::Overdue, 0),
            // 8 days overdue, second band lower edge
            row("L-2", "Pune", LoanStatus::Active, date(2024, 4, 23), 2000, InstallmentStatus::Pending, 0),
            // due exactly on as_of is not overdue
            row("L-3", "Pune", LoanStatus::Active, date(2024, 5, 1), 5000, InstallmentStatus::Pending, 0),
            // 120 days overdue
            row("L-4", "Pune", LoanStatus::Active, date(2024, 1, 2), 3000, InstallmentStatus::Overdue, 0),
            // paid rows never age
            row("L-5", "Pune", LoanStatus::Active, date(2024, 1, 2), 3000, InstallmentStatus::Paid, 3000),
        ];
        let buckets = overdue_buckets(&rows, as_of);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].bucket, AgeingBucket::Days1To7);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[0].avg_days_overdue, dec!(7.00));
        assert_eq!(buckets[1].bucket, AgeingBucket::Days8To15);
        assert_eq!(buckets[1].overdue_amount, Money::from_rupees(2000));
        assert_eq!(buckets[2].bucket, AgeingBucket::Over90);
        assert_eq!(buckets[2].avg_days_overdue, dec!(120.00));
    }

    #[test]
    fn test_overdue_buckets_average_days() {
        let as_of = date(2024, 5, 1);
        let rows = vec![
            row("L-1", "Pune", LoanStatus::Active, date(2024, 4, 29), 100, InstallmentStatus::Overdue, 0),
            row("L-1", "Pune", LoanStatus::Active, date(2024, 4, 26), 100, InstallmentStatus::Overdue, 0),
        ];
        let buckets = overdue_buckets(&rows, as_of);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].unique_loans, 1);
        // (2 + 5) / 2
        assert_eq!(buckets[0].avg_days_overdue, dec!(3.50));
    }

    #[test]
    fn test_trends_chronological() {
        let as_of = date(2024, 4, 30);
        let rows = vec![
            row("L-1", "Pune", LoanStatus::Active, date(2024, 4, 8), 1000, InstallmentStatus::Pending, 0),
            row("L-1", "Pune", LoanStatus::Active, date(2024, 3, 8), 1000, InstallmentStatus::Paid, 1000),
            row("L-2", "Pune", LoanStatus::Active, date(2024, 3, 8), 1000, InstallmentStatus::Paid, 1000),
        ];
        let points = trends(&rows, as_of, 12);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].month, "2024-03");
        assert_eq!(points[0].active_loan_count, 2);
        assert_eq!(points[0].collection_rate, dec!(100.00));
        assert_eq!(points[1].month, "2024-04");
        assert_eq!(points[1].collection_rate, dec!(0.00));
    }

    #[test]
    fn test_today_summary_exact_date_only() {
        let as_of = date(2024, 4, 8);
        let rows = vec![
            row("L-1", "Pune", LoanStatus::Active, as_of, 1000, InstallmentStatus::Paid, 1000),
            row("L-2", "Pune", LoanStatus::Active, as_of, 1000, InstallmentStatus::Pending, 0),
            row("L-3", "Pune", LoanStatus::Active, date(2024, 4, 9), 9000, InstallmentStatus::Pending, 0),
        ];
        let today = today_summary(&rows, as_of);
        assert_eq!(today.emi_count, 2);
        assert_eq!(today.unique_loan_count, 2);
        assert_eq!(today.demand, Money::from_rupees(2000));
        assert_eq!(today.collection_percentage, dec!(50.00));
    }

    #[test]
    fn test_today_summary_empty_day_is_zeroed() {
        let today = today_summary(&[], date(2024, 4, 8));
        assert_eq!(today.emi_count, 0);
        assert_eq!(today.demand, Money::ZERO);
        assert_eq!(today.collection_percentage, Decimal::ZERO);
    }
}
