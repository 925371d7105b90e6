//! Installment ledger operations
//!
//! Read and adjustment surface over the authoritative installment store:
//! per-loan listing, due-list with overdue annotation, partial updates with
//! transition validation, and bounce handling.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use core_kernel::{BounceCaseId, InstallmentId, LoanId, Money};

use crate::bounce::BounceCase;
use crate::error::LedgerError;
use crate::installment::{DueInstallment, Installment, InstallmentStatus, InstallmentUpdate};
use crate::loan::LoanStatus;
use crate::store::LedgerStore;

/// Balance fields exposed for closure-certificate rendering
#[derive(Debug, Clone, Serialize)]
pub struct LoanBalance {
    pub loan_id: LoanId,
    pub repayment_amount: Money,
    pub amount_received: Money,
    pub outstanding: Money,
    pub status: LoanStatus,
    pub closure_date: Option<NaiveDate>,
}

/// Service over the authoritative installment store
pub struct InstallmentLedger {
    store: Arc<dyn LedgerStore>,
}

impl InstallmentLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// All installments for a loan, ordered by sequence ascending
    pub async fn list_by_loan(&self, loan_id: &LoanId) -> Result<Vec<Installment>, LedgerError> {
        Ok(self.store.installments_for_loan(loan_id).await?)
    }

    /// Pending/Overdue installments across all loans, earliest due first,
    /// each annotated with whole days overdue as of `as_of` (floored at 0)
    pub async fn list_due(&self, as_of: NaiveDate) -> Result<Vec<DueInstallment>, LedgerError> {
        let rows = self.store.due_installments().await?;
        Ok(rows
            .into_iter()
            .map(|installment| {
                let days_overdue = installment.days_overdue(as_of);
                DueInstallment {
                    installment,
                    days_overdue,
                }
            })
            .collect())
    }

    /// Applies a partial update. An empty field set fails with `NoFields`;
    /// a status change must be a valid transition from the current status.
    pub async fn update(
        &self,
        id: InstallmentId,
        update: InstallmentUpdate,
    ) -> Result<(), LedgerError> {
        if update.is_empty() {
            return Err(LedgerError::NoFields);
        }
        if let Some(to) = update.status {
            let current = self.store.get_installment(id).await?;
            if current.status != to && !current.status.can_transition(to) {
                return Err(LedgerError::InvalidTransition {
                    from: current.status.to_string(),
                    to: to.to_string(),
                });
            }
        }
        Ok(self.store.update_installment(id, update).await?)
    }

    /// Flags a failed clearance: the installment goes Overdue and a bounce
    /// case is opened for collections follow-up. An installment already
    /// Overdue keeps its status; the case is opened regardless.
    pub async fn mark_bounced(
        &self,
        id: InstallmentId,
        bounce_date: NaiveDate,
        reason: impl Into<String>,
    ) -> Result<BounceCase, LedgerError> {
        let installment = self.store.get_installment(id).await?;
        if installment.status != InstallmentStatus::Overdue {
            if !installment.status.can_transition(InstallmentStatus::Overdue) {
                return Err(LedgerError::InvalidTransition {
                    from: installment.status.to_string(),
                    to: InstallmentStatus::Overdue.to_string(),
                });
            }
            self.store
                .update_installment(
                    id,
                    InstallmentUpdate {
                        status: Some(InstallmentStatus::Overdue),
                        ..Default::default()
                    },
                )
                .await?;
        }

        let case = BounceCase::open(id, installment.loan_id.clone(), bounce_date, reason);
        self.store.insert_bounce_case(case.clone()).await?;
        info!(loan = %installment.loan_id, installment = %id, "bounce case opened");
        Ok(case)
    }

    /// Closes a bounce case after collections follow-up, recording how it
    /// was settled
    pub async fn resolve_bounce(
        &self,
        id: BounceCaseId,
        note: impl Into<String>,
    ) -> Result<BounceCase, LedgerError> {
        let case = self.store.resolve_bounce_case(id, &note.into()).await?;
        info!(loan = %case.loan_id, case = %case.id, "bounce case resolved");
        Ok(case)
    }

    /// Current balance fields for a loan, for NOC/certificate rendering
    pub async fn loan_balance(&self, loan_id: &LoanId) -> Result<LoanBalance, LedgerError> {
        let loan = self.store.get_loan(loan_id).await?;
        let received = if loan.amount_received.is_zero() {
            // not yet stamped by closure; derive from the payment ledger
            self.store.payment_total_for_loan(loan_id).await?
        } else {
            loan.amount_received
        };
        Ok(LoanBalance {
            loan_id: loan.id,
            repayment_amount: loan.repayment_amount,
            amount_received: received,
            outstanding: loan.repayment_amount.saturating_sub(received),
            status: loan.status,
            closure_date: loan.closure_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use std::sync::Arc;

    use core_kernel::InstallmentId;

    use crate::bounce::BounceCaseStatus;
    use crate::loan::Loan;
    use crate::payment::{Payment, PaymentMethod};
    use crate::store::mock::MockLedgerStore;
    use crate::store::StoreError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(id: &str) -> Loan {
        Loan::new(
            LoanId::new(id).unwrap(),
            "Meena Joshi",
            Money::from_rupees(20_000),
            Money::from_rupees(28_000),
        )
        .with_disbursement_date(date(2024, 3, 1))
    }

    async fn seeded() -> (Arc<MockLedgerStore>, LoanId, Vec<InstallmentId>) {
        let l = loan("MFL-1");
        let loan_id = l.id.clone();
        let store = Arc::new(MockLedgerStore::with_loans(vec![l]).await);
        let rows = vec![
            Installment::new(loan_id.clone(), 1, date(2024, 3, 8), Money::from_rupees(2_000)),
            Installment::new(loan_id.clone(), 2, date(2024, 3, 15), Money::from_rupees(2_000)),
            Installment::new(loan_id.clone(), 3, date(2024, 3, 22), Money::from_rupees(2_000)),
        ];
        let ids = rows.iter().map(|r| r.id).collect();
        store.insert_schedule(&loan_id, rows).await.unwrap();
        (store, loan_id, ids)
    }

    #[tokio::test]
    async fn test_list_by_loan_is_ordered_by_sequence() {
        let (store, loan_id, _) = seeded().await;
        let ledger = InstallmentLedger::new(store);

        let rows = ledger.list_by_loan(&loan_id).await.unwrap();
        assert_eq!(
            rows.iter().map(|r| r.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_list_due_orders_by_due_date_and_clamps_days() {
        let (store, _, ids) = seeded().await;
        // settle the middle installment; it must drop out of the due list
        store
            .update_installment(
                ids[1],
                InstallmentUpdate {
                    status: Some(InstallmentStatus::Paid),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let ledger = InstallmentLedger::new(store);
        let due = ledger.list_due(date(2024, 3, 10)).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].installment.id, ids[0]);
        assert_eq!(due[0].days_overdue, 2);
        assert_eq!(due[1].installment.id, ids[2]);
        // not yet due: clamped to zero, not negative
        assert_eq!(due[1].days_overdue, 0);
    }

    #[tokio::test]
    async fn test_update_with_no_fields_fails() {
        let (store, _, ids) = seeded().await;
        let ledger = InstallmentLedger::new(store);

        let err = ledger
            .update(ids[0], InstallmentUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoFields));
    }

    #[tokio::test]
    async fn test_update_unknown_installment_is_not_found() {
        let (store, _, _) = seeded().await;
        let ledger = InstallmentLedger::new(store);

        let err = ledger
            .update(
                InstallmentId::new(),
                InstallmentUpdate {
                    due_date: Some(date(2024, 4, 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_validates_status_transition() {
        let (store, _, ids) = seeded().await;
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

        let ledger = InstallmentLedger::new(store.clone());
        let err = ledger
            .update(
                ids[0],
                InstallmentUpdate {
                    status: Some(InstallmentStatus::Pending),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));

        // reschedule remains possible on a paid row
        ledger
            .update(
                ids[0],
                InstallmentUpdate {
                    due_date: Some(date(2024, 3, 9)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            store.get_installment(ids[0]).await.unwrap().due_date,
            date(2024, 3, 9)
        );
    }

    #[tokio::test]
    async fn test_mark_bounced_flips_to_overdue_and_opens_case() {
        let (store, loan_id, ids) = seeded().await;
        let ledger = InstallmentLedger::new(store.clone());

        let case = ledger
            .mark_bounced(ids[0], date(2024, 3, 9), "cheque returned unpaid")
            .await
            .unwrap();
        assert_eq!(case.loan_id, loan_id);
        assert_eq!(case.status, BounceCaseStatus::Open);
        assert_eq!(
            store.get_installment(ids[0]).await.unwrap().status,
            InstallmentStatus::Overdue
        );
        assert_eq!(store.opened_bounce_cases().await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_bounce_closes_the_case_once() {
        let (store, _, ids) = seeded().await;
        let ledger = InstallmentLedger::new(store.clone());

        let case = ledger
            .mark_bounced(ids[0], date(2024, 3, 9), "insufficient funds")
            .await
            .unwrap();
        let resolved = ledger
            .resolve_bounce(case.id, "collected in cash on follow-up visit")
            .await
            .unwrap();
        assert_eq!(resolved.status, BounceCaseStatus::Resolved);
        assert_eq!(
            resolved.resolution_note.as_deref(),
            Some("collected in cash on follow-up visit")
        );
        assert_eq!(
            store.opened_bounce_cases().await[0].status,
            BounceCaseStatus::Resolved
        );

        let err = ledger
            .resolve_bounce(case.id, "duplicate entry")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Store(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_resolve_bounce_unknown_case_is_not_found() {
        let (store, _, _) = seeded().await;
        let ledger = InstallmentLedger::new(store);
        let err = ledger
            .resolve_bounce(BounceCaseId::new(), "stray follow-up note")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mark_bounced_rejects_paid_installment() {
        let (store, _, ids) = seeded().await;
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

        let ledger = InstallmentLedger::new(store);
        let err = ledger
            .mark_bounced(ids[0], date(2024, 3, 9), "late bounce notice")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_mark_bounced_missing_installment_is_not_found() {
        let (store, _, _) = seeded().await;
        let ledger = InstallmentLedger::new(store);
        let err = ledger
            .mark_bounced(InstallmentId::new(), date(2024, 3, 9), "n/a")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_loan_balance_derives_from_payment_ledger() {
        let (store, loan_id, ids) = seeded().await;
        store
            .insert_payment(
                Payment::new(
                    loan_id.clone(),
                    Money::from_rupees(2_000),
                    PaymentMethod::Cash,
                    "ops.user",
                )
                .against_installment(ids[0], Some(0))
                .with_received_date(date(2024, 3, 8)),
            )
            .await
            .unwrap();

        let ledger = InstallmentLedger::new(store);
        let balance = ledger.loan_balance(&loan_id).await.unwrap();
        assert_eq!(balance.amount_received, Money::from_rupees(2_000));
        assert_eq!(balance.outstanding, Money::from_rupees(26_000));
        assert!(balance.closure_date.is_none());
    }

    #[tokio::test]
    async fn test_loan_balance_prefers_stamped_amount() {
        let (store, loan_id, _) = seeded().await;
        store
            .set_amount_received(&loan_id, Money::from_rupees(28_000))
            .await
            .unwrap();
        store
            .set_closure_date_if_absent(&loan_id, date(2024, 6, 30))
            .await
            .unwrap();

        let ledger = InstallmentLedger::new(store);
        let balance = ledger.loan_balance(&loan_id).await.unwrap();
        assert_eq!(balance.amount_received, Money::from_rupees(28_000));
        assert_eq!(balance.outstanding, Money::ZERO);
        assert_eq!(balance.closure_date, Some(date(2024, 6, 30)));
    }

    #[tokio::test]
    async fn test_due_list_spans_multiple_loans() {
        let (store, _, _) = seeded().await;
        let other = loan("MFL-2");
        let other_id = other.id.clone();
        store.insert_loan(other).await.unwrap();
        store
            .insert_schedule(
                &other_id,
                vec![Installment::new(
                    other_id.clone(),
                    1,
                    date(2024, 3, 5),
                    Money::from_rupees(900),
                )],
            )
            .await
            .unwrap();

        let ledger = InstallmentLedger::new(store);
        let due = ledger.list_due(date(2024, 3, 5) + Days::new(1)).await.unwrap();
        // earliest due first across loans
        assert_eq!(due[0].installment.loan_id, other_id);
        assert_eq!(due[0].days_overdue, 1);
    }
}
