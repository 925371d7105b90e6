//! Schedule generation
//!
//! Derives a loan's repayment schedule from its disbursement terms: strict
//! weekly cadence, no calendar-month logic, no weekend or holiday skipping.
//! Generation is idempotent per loan; re-invocation is a reported no-op.

use chrono::Days;
use std::sync::Arc;
use tracing::{info, warn};

use core_kernel::{authorize, CallerIdentity, LoanId, ProtectedOp};

use crate::error::LedgerError;
use crate::installment::Installment;
use crate::loan::Loan;
use crate::store::LedgerStore;

/// Product convention: weekly EMIs over a ~98-day cycle
pub const DEFAULT_INSTALLMENT_COUNT: u32 = 14;

/// Days between consecutive due dates
pub const INSTALLMENT_INTERVAL_DAYS: u64 = 7;

/// Result of a generate call for one loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A fresh schedule was inserted
    Generated { installments: u32 },
    /// The loan already had installment rows; nothing was written
    AlreadyScheduled,
}

/// Builds the ordered installment rows for a loan without touching the store
///
/// Due dates are `disbursement + 7, +14, ..., +7n`; every row starts Pending.
pub fn build_schedule(loan: &Loan) -> Result<Vec<Installment>, LedgerError> {
    let disbursed = loan.disbursement_date.ok_or_else(|| {
        LedgerError::invalid_loan_state(format!("loan {} has no disbursement date", loan.id))
    })?;

    let count = loan.installment_count();
    if count == 0 {
        return Err(LedgerError::invalid_input(
            "total installments must be positive",
        ));
    }
    let amount = loan
        .emi_amount()
        .map_err(|e| LedgerError::invalid_input(e.to_string()))?;

    let mut rows = Vec::with_capacity(count as usize);
    for seq in 1..=count {
        let due_date = disbursed + Days::new(INSTALLMENT_INTERVAL_DAYS * seq as u64);
        rows.push(Installment::new(loan.id.clone(), seq, due_date, amount));
    }
    Ok(rows)
}

/// Per-loan result within a backfill batch
#[derive(Debug)]
pub struct BackfillItem {
    pub loan_id: LoanId,
    pub result: Result<ScheduleOutcome, LedgerError>,
}

/// Service wrapping schedule generation over the injected store
pub struct ScheduleService {
    store: Arc<dyn LedgerStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Generates the schedule for one loan; a second call is a no-op
    /// reported as [`ScheduleOutcome::AlreadyScheduled`]
    pub async fn generate(
        &self,
        caller: &CallerIdentity,
        loan_id: &LoanId,
    ) -> Result<ScheduleOutcome, LedgerError> {
        authorize(caller, ProtectedOp::GenerateSchedule)?;
        let loan = self.store.get_loan(loan_id).await?;
        self.generate_for(&loan).await
    }

    /// Generates schedules for every loan lacking installment rows.
    /// Items succeed or fail independently; the batch itself only fails if
    /// the candidate query does.
    pub async fn backfill(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<BackfillItem>, LedgerError> {
        authorize(caller, ProtectedOp::GenerateSchedule)?;
        let candidates = self.store.loans_without_schedule().await?;
        info!(candidates = candidates.len(), "schedule backfill started");

        let mut items = Vec::with_capacity(candidates.len());
        for loan in candidates {
            let loan_id = loan.id.clone();
            let result = self.generate_for(&loan).await;
            if let Err(err) = &result {
                warn!(loan = %loan_id, error = %err, "schedule backfill item failed");
            }
            items.push(BackfillItem { loan_id, result });
        }
        Ok(items)
    }

    async fn generate_for(&self, loan: &Loan) -> Result<ScheduleOutcome, LedgerError> {
        let rows = build_schedule(loan)?;
        let count = rows.len() as u32;
        // insert_schedule is atomic with respect to concurrent callers; a
        // losing racer observes `false` here rather than duplicate rows.
        if self.store.insert_schedule(&loan.id, rows).await? {
            info!(loan = %loan.id, installments = count, "schedule generated");
            Ok(ScheduleOutcome::Generated {
                installments: count,
            })
        } else {
            Ok(ScheduleOutcome::AlreadyScheduled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{Money, Role};

    use crate::store::mock::MockLedgerStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employee() -> CallerIdentity {
        CallerIdentity::new("u-1", "ops.user", Role::Employee)
    }

    fn disbursed_loan(id: &str) -> Loan {
        Loan::new(
            LoanId::new(id).unwrap(),
            "Sita Kumari",
            Money::from_rupees(10_000),
            Money::from_rupees(14_000),
        )
        .with_disbursement_date(date(2024, 1, 1))
    }

    #[tokio::test]
    async fn test_generate_produces_weekly_contiguous_schedule() {
        let loan = disbursed_loan("MFL-1");
        let store = std::sync::Arc::new(MockLedgerStore::with_loans(vec![loan.clone()]).await);
        let service = ScheduleService::new(store.clone());

        let outcome = service.generate(&employee(), &loan.id).await.unwrap();
        assert_eq!(outcome, ScheduleOutcome::Generated { installments: 14 });

        let rows = store.installments_for_loan(&loan.id).await.unwrap();
        assert_eq!(rows.len(), 14);
        for (i, row) in rows.iter().enumerate() {
            let seq = (i + 1) as u32;
            assert_eq!(row.sequence, seq);
            assert_eq!(
                row.due_date,
                date(2024, 1, 1) + Days::new(7 * seq as u64)
            );
            assert_eq!(row.status, crate::installment::InstallmentStatus::Pending);
            assert_eq!(row.amount, Money::from_rupees(1_000));
        }
        assert_eq!(rows.last().unwrap().due_date, date(2024, 4, 8)); // D+98

        let total: Money = rows.iter().map(|r| r.amount).sum();
        assert_eq!(total, Money::from_rupees(14_000));
    }

    #[tokio::test]
    async fn test_generate_twice_is_a_reported_noop() {
        let loan = disbursed_loan("MFL-2");
        let store = std::sync::Arc::new(MockLedgerStore::with_loans(vec![loan.clone()]).await);
        let service = ScheduleService::new(store.clone());

        service.generate(&employee(), &loan.id).await.unwrap();
        let second = service.generate(&employee(), &loan.id).await.unwrap();
        assert_eq!(second, ScheduleOutcome::AlreadyScheduled);

        let rows = store.installments_for_loan(&loan.id).await.unwrap();
        assert_eq!(rows.len(), 14);
    }

    #[tokio::test]
    async fn test_generate_requires_disbursement_date() {
        let mut loan = disbursed_loan("MFL-3");
        loan.disbursement_date = None;
        let store = std::sync::Arc::new(MockLedgerStore::with_loans(vec![loan.clone()]).await);
        let service = ScheduleService::new(store);

        let err = service.generate(&employee(), &loan.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidLoanState(_)));
    }

    #[tokio::test]
    async fn test_generate_unknown_loan_is_not_found() {
        let store = std::sync::Arc::new(MockLedgerStore::new());
        let service = ScheduleService::new(store);
        let err = service
            .generate(&employee(), &LoanId::new("MFL-404").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_generate_rejects_customer_role() {
        let loan = disbursed_loan("MFL-4");
        let store = std::sync::Arc::new(MockLedgerStore::with_loans(vec![loan.clone()]).await);
        let service = ScheduleService::new(store);

        let customer = CallerIdentity::new("c-1", "borrower", Role::Customer);
        let err = service.generate(&customer, &loan.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_backfill_reports_per_loan_results() {
        let good = disbursed_loan("MFL-10");
        let mut bad = disbursed_loan("MFL-11");
        bad.disbursement_date = None;
        let scheduled = disbursed_loan("MFL-12");

        let store = std::sync::Arc::new(
            MockLedgerStore::with_loans(vec![good.clone(), bad.clone(), scheduled.clone()]).await,
        );
        let service = ScheduleService::new(store.clone());
        service.generate(&employee(), &scheduled.id).await.unwrap();

        let items = service.backfill(&employee()).await.unwrap();
        // the already-scheduled loan is not a backfill candidate
        assert_eq!(items.len(), 2);

        let good_item = items.iter().find(|i| i.loan_id == good.id).unwrap();
        assert!(matches!(
            good_item.result,
            Ok(ScheduleOutcome::Generated { installments: 14 })
        ));

        let bad_item = items.iter().find(|i| i.loan_id == bad.id).unwrap();
        assert!(matches!(
            bad_item.result,
            Err(LedgerError::InvalidLoanState(_))
        ));
    }

    #[tokio::test]
    async fn test_explicit_plan_drives_row_count_and_amount() {
        let loan = disbursed_loan("MFL-20")
            .with_installment_plan(10, Some(Money::from_rupees(1_400)));
        let store = std::sync::Arc::new(MockLedgerStore::with_loans(vec![loan.clone()]).await);
        let service = ScheduleService::new(store.clone());

        let outcome = service.generate(&employee(), &loan.id).await.unwrap();
        assert_eq!(outcome, ScheduleOutcome::Generated { installments: 10 });

        let rows = store.installments_for_loan(&loan.id).await.unwrap();
        assert!(rows.iter().all(|r| r.amount == Money::from_rupees(1_400)));
    }
}
