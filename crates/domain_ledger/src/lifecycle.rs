//! Default marking and reversal
//!
//! Marking a loan Default cascades to its still-Pending installments.
//! Reversal is blanket: every Default installment on the loan goes back to
//! Pending, with no record of whether a row defaulted by cascade or was
//! marked independently.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use core_kernel::{authorize, CallerIdentity, LoanId, ProtectedOp};

use crate::error::LedgerError;
use crate::installment::InstallmentStatus;
use crate::loan::{DefaultMarker, LoanStatus};
use crate::store::LedgerStore;

/// Result of marking a loan Default
#[derive(Debug, Clone, Serialize)]
pub struct DefaultOutcome {
    pub loan_id: LoanId,
    /// Installments cascaded from Pending to Default
    pub cascaded: u64,
}

/// Result of reversing a default
#[derive(Debug, Clone, Serialize)]
pub struct ReinstateOutcome {
    pub loan_id: LoanId,
    /// Installments reverted from Default to Pending
    pub reverted: u64,
}

/// Service for loan lifecycle transitions outside the payment path
pub struct LifecycleManager {
    store: Arc<dyn LedgerStore>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Marks the loan Default and cascades to Pending installments.
    /// Paid and Partial rows are untouched.
    pub async fn mark_default(
        &self,
        caller: &CallerIdentity,
        loan_id: &LoanId,
        reason: impl Into<String>,
        marked_on: NaiveDate,
    ) -> Result<DefaultOutcome, LedgerError> {
        authorize(caller, ProtectedOp::MarkDefault)?;

        let loan = self.store.get_loan(loan_id).await?;
        if !loan.status.can_transition(LoanStatus::Default) {
            return Err(LedgerError::invalid_loan_state(format!(
                "loan {} is {} and cannot be marked Default",
                loan.id, loan.status
            )));
        }

        self.store
            .update_loan_status(loan_id, LoanStatus::Default)
            .await?;
        self.store
            .set_default_marker(
                loan_id,
                Some(DefaultMarker {
                    reason: reason.into(),
                    marked_on,
                }),
            )
            .await?;
        let cascaded = self
            .store
            .set_status_for_loan(loan_id, InstallmentStatus::Pending, InstallmentStatus::Default)
            .await?;

        info!(loan = %loan_id, cascaded, "loan marked default");
        Ok(DefaultOutcome {
            loan_id: loan_id.clone(),
            cascaded,
        })
    }

    /// Reverses a default: loan back to Active, every Default installment
    /// back to Pending, marker cleared. Best-effort: rows marked Default
    /// for other reasons revert too.
    pub async fn remove_default(
        &self,
        caller: &CallerIdentity,
        loan_id: &LoanId,
    ) -> Result<ReinstateOutcome, LedgerError> {
        authorize(caller, ProtectedOp::RemoveDefault)?;

        let loan = self.store.get_loan(loan_id).await?;
        if loan.status != LoanStatus::Default {
            return Err(LedgerError::invalid_loan_state(format!(
                "loan {} is {}, not Default",
                loan.id, loan.status
            )));
        }

        let reverted = self
            .store
            .set_status_for_loan(loan_id, InstallmentStatus::Default, InstallmentStatus::Pending)
            .await?;
        self.store
            .update_loan_status(loan_id, LoanStatus::Active)
            .await?;
        self.store.set_default_marker(loan_id, None).await?;

        info!(loan = %loan_id, reverted, "loan default removed");
        Ok(ReinstateOutcome {
            loan_id: loan_id.clone(),
            reverted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{InstallmentId, Money, Role};
    use std::sync::Arc;

    use crate::installment::{Installment, InstallmentUpdate};
    use crate::loan::Loan;
    use crate::store::mock::MockLedgerStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn manager() -> CallerIdentity {
        CallerIdentity::new("m-1", "branch.manager", Role::Manager)
    }

    fn admin() -> CallerIdentity {
        CallerIdentity::new("a-1", "hq.admin", Role::Admin)
    }

    /// One loan with a Paid first installment and two Pending ones
    async fn seeded() -> (Arc<MockLedgerStore>, LoanId, Vec<InstallmentId>) {
        let loan = Loan::new(
            LoanId::new("MFL-1").unwrap(),
            "Kiran Rao",
            Money::from_rupees(15_000),
            Money::from_rupees(21_000),
        )
        .with_disbursement_date(date(2024, 2, 1));
        let loan_id = loan.id.clone();
        let store = Arc::new(MockLedgerStore::with_loans(vec![loan]).await);

        let rows = vec![
            Installment::new(loan_id.clone(), 1, date(2024, 2, 8), Money::from_rupees(7_000)),
            Installment::new(loan_id.clone(), 2, date(2024, 2, 15), Money::from_rupees(7_000)),
            Installment::new(loan_id.clone(), 3, date(2024, 2, 22), Money::from_rupees(7_000)),
        ];
        let ids: Vec<InstallmentId> = rows.iter().map(|r| r.id).collect();
        store.insert_schedule(&loan_id, rows).await.unwrap();
        store
            .update_installment(
                ids[0],
                InstallmentUpdate {
                    status: Some(InstallmentStatus::Paid),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        (store, loan_id, ids)
    }

    #[tokio::test]
    async fn test_mark_default_cascades_only_pending_rows() {
        let (store, loan_id, ids) = seeded().await;
        let manager_svc = LifecycleManager::new(store.clone());

        let outcome = manager_svc
            .mark_default(&manager(), &loan_id, "ran away from town", date(2024, 3, 1))
            .await
            .unwrap();
        assert_eq!(outcome.cascaded, 2);

        let loan = store.get_loan(&loan_id).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Default);
        let marker = loan.default_marker.unwrap();
        assert_eq!(marker.marked_on, date(2024, 3, 1));

        assert_eq!(
            store.get_installment(ids[0]).await.unwrap().status,
            InstallmentStatus::Paid
        );
        assert_eq!(
            store.get_installment(ids[1]).await.unwrap().status,
            InstallmentStatus::Default
        );
        assert_eq!(
            store.get_installment(ids[2]).await.unwrap().status,
            InstallmentStatus::Default
        );
    }

    #[tokio::test]
    async fn test_remove_default_reverts_blanket() {
        let (store, loan_id, ids) = seeded().await;
        let svc = LifecycleManager::new(store.clone());

        svc.mark_default(&manager(), &loan_id, "missed four cycles", date(2024, 3, 1))
            .await
            .unwrap();
        let outcome = svc.remove_default(&admin(), &loan_id).await.unwrap();
        assert_eq!(outcome.reverted, 2);

        let loan = store.get_loan(&loan_id).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Active);
        assert!(loan.default_marker.is_none());
        assert_eq!(
            store.get_installment(ids[1]).await.unwrap().status,
            InstallmentStatus::Pending
        );
        assert_eq!(
            store.get_installment(ids[0]).await.unwrap().status,
            InstallmentStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_remove_default_requires_default_state() {
        let (store, loan_id, _) = seeded().await;
        let svc = LifecycleManager::new(store);

        let err = svc.remove_default(&admin(), &loan_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidLoanState(_)));
    }

    #[tokio::test]
    async fn test_mark_default_rejects_closed_loan() {
        let (store, loan_id, _) = seeded().await;
        store
            .update_loan_status(&loan_id, LoanStatus::Closed)
            .await
            .unwrap();

        let svc = LifecycleManager::new(store);
        let err = svc
            .mark_default(&manager(), &loan_id, "late", date(2024, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidLoanState(_)));
    }

    #[tokio::test]
    async fn test_role_gating() {
        let (store, loan_id, _) = seeded().await;
        let svc = LifecycleManager::new(store);

        let employee = CallerIdentity::new("e-1", "ops.user", Role::Employee);
        let err = svc
            .mark_default(&employee, &loan_id, "late", date(2024, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));

        svc.mark_default(&manager(), &loan_id, "late", date(2024, 3, 1))
            .await
            .unwrap();
        // removal is admin-only; the manager who marked it cannot revert it
        let err = svc.remove_default(&manager(), &loan_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unknown_loan_is_not_found() {
        let store = Arc::new(MockLedgerStore::new());
        let svc = LifecycleManager::new(store);
        let err = svc
            .mark_default(
                &admin(),
                &LoanId::new("MFL-404").unwrap(),
                "n/a",
                date(2024, 3, 1),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
