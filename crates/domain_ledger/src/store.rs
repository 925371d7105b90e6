//! Ledger store port
//!
//! The shared relational store is injected behind this trait so services can
//! run against PostgreSQL in production (`infra_db`) or the in-memory mock in
//! tests. Every method is a bounded unit of work: one store round-trip, no
//! in-process background tasks.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use core_kernel::{BounceCaseId, InstallmentId, LoanId, Money};

use crate::bounce::BounceCase;
use crate::installment::{Installment, InstallmentStatus, InstallmentUpdate};
use crate::loan::{DefaultMarker, Loan, LoanStatus};
use crate::payment::Payment;

/// Errors surfaced by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Internal store error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        StoreError::Conflict(message.into())
    }

    pub fn connection(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        StoreError::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// One installment joined with its loan and collected-to-date figure; the
/// snapshot row the Collection Aggregator works over
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRow {
    pub loan_id: LoanId,
    pub branch: String,
    pub loan_status: LoanStatus,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub status: InstallmentStatus,
    /// Sum of payments recorded against this installment
    pub collected: Money,
}

/// Port over the loans / installments / payments store
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -- loans ---------------------------------------------------------

    async fn insert_loan(&self, loan: Loan) -> Result<(), StoreError>;

    async fn get_loan(&self, id: &LoanId) -> Result<Loan, StoreError>;

    /// Loans with no installment rows at all, for schedule backfill
    async fn loans_without_schedule(&self) -> Result<Vec<Loan>, StoreError>;

    async fn update_loan_status(&self, id: &LoanId, status: LoanStatus) -> Result<(), StoreError>;

    async fn set_amount_received(&self, id: &LoanId, amount: Money) -> Result<(), StoreError>;

    /// Stamps the closure date only if none is set; returns the date now on
    /// record (existing or newly stamped)
    async fn set_closure_date_if_absent(
        &self,
        id: &LoanId,
        date: NaiveDate,
    ) -> Result<NaiveDate, StoreError>;

    /// Sets or clears the default reason/date marker
    async fn set_default_marker(
        &self,
        id: &LoanId,
        marker: Option<DefaultMarker>,
    ) -> Result<(), StoreError>;

    // -- installments --------------------------------------------------

    /// Inserts a full schedule atomically with respect to concurrent
    /// callers. Returns `false` without inserting anything when the loan
    /// already has installment rows.
    async fn insert_schedule(
        &self,
        loan_id: &LoanId,
        rows: Vec<Installment>,
    ) -> Result<bool, StoreError>;

    async fn get_installment(&self, id: InstallmentId) -> Result<Installment, StoreError>;

    /// All installments for the loan, ordered by sequence ascending
    async fn installments_for_loan(&self, loan_id: &LoanId)
        -> Result<Vec<Installment>, StoreError>;

    /// All Pending/Overdue installments across loans, ordered by due date
    /// ascending (collection priority)
    async fn due_installments(&self) -> Result<Vec<Installment>, StoreError>;

    /// Earliest-due Pending/Overdue installment for the loan, if any
    async fn next_due_installment(
        &self,
        loan_id: &LoanId,
    ) -> Result<Option<Installment>, StoreError>;

    /// Applies a non-empty partial update; NotFound when no row matches
    async fn update_installment(
        &self,
        id: InstallmentId,
        update: InstallmentUpdate,
    ) -> Result<(), StoreError>;

    /// Bulk status flip for one loan's installments currently in `from`;
    /// returns the number of rows affected
    async fn set_status_for_loan(
        &self,
        loan_id: &LoanId,
        from: InstallmentStatus,
        to: InstallmentStatus,
    ) -> Result<u64, StoreError>;

    // -- payments ------------------------------------------------------

    async fn insert_payment(&self, payment: Payment) -> Result<(), StoreError>;

    async fn payments_for_loan(&self, loan_id: &LoanId) -> Result<Vec<Payment>, StoreError>;

    /// Sum of all payments ever recorded against the loan
    async fn payment_total_for_loan(&self, loan_id: &LoanId) -> Result<Money, StoreError>;

    // -- bounce cases --------------------------------------------------

    async fn insert_bounce_case(&self, case: BounceCase) -> Result<(), StoreError>;

    /// Marks an open case resolved with a note and returns the updated
    /// record; Conflict when the case is already resolved
    async fn resolve_bounce_case(
        &self,
        id: BounceCaseId,
        note: &str,
    ) -> Result<BounceCase, StoreError>;

    // -- aggregation snapshot ------------------------------------------

    /// Installments joined with loan branch/status and per-installment
    /// collected totals; read-only, latest-committed consistency
    async fn collection_rows(&self) -> Result<Vec<CollectionRow>, StoreError>;
}

/// In-memory mock store for unit tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::RwLock;

    use crate::bounce::BounceCaseStatus;

    /// In-memory implementation of [`LedgerStore`]
    #[derive(Debug, Default)]
    pub struct MockLedgerStore {
        loans: RwLock<HashMap<LoanId, Loan>>,
        installments: RwLock<HashMap<InstallmentId, Installment>>,
        payments: RwLock<Vec<Payment>>,
        bounce_cases: RwLock<Vec<BounceCase>>,
        fail_installment_updates: AtomicBool,
    }

    impl MockLedgerStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates loans for a test
        pub async fn with_loans(loans: Vec<Loan>) -> Self {
            let store = Self::new();
            {
                let mut map = store.loans.write().await;
                for loan in loans {
                    map.insert(loan.id.clone(), loan);
                }
            }
            store
        }

        /// Snapshot of recorded payments, for assertions
        pub async fn recorded_payments(&self) -> Vec<Payment> {
            self.payments.read().await.clone()
        }

        /// Snapshot of opened bounce cases, for assertions
        pub async fn opened_bounce_cases(&self) -> Vec<BounceCase> {
            self.bounce_cases.read().await.clone()
        }

        /// Makes every subsequent `update_installment` call fail, for
        /// exercising partial-failure paths
        pub fn fail_installment_updates(&self) {
            self.fail_installment_updates.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl LedgerStore for MockLedgerStore {
        async fn insert_loan(&self, loan: Loan) -> Result<(), StoreError> {
            let mut loans = self.loans.write().await;
            if loans.contains_key(&loan.id) {
                return Err(StoreError::conflict(format!(
                    "loan {} already exists",
                    loan.id
                )));
            }
            loans.insert(loan.id.clone(), loan);
            Ok(())
        }

        async fn get_loan(&self, id: &LoanId) -> Result<Loan, StoreError> {
            self.loans
                .read()
                .await
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("Loan", id))
        }

        async fn loans_without_schedule(&self) -> Result<Vec<Loan>, StoreError> {
            let loans = self.loans.read().await;
            let installments = self.installments.read().await;
            let mut result: Vec<Loan> = loans
                .values()
                .filter(|loan| !installments.values().any(|i| i.loan_id == loan.id))
                .cloned()
                .collect();
            result.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(result)
        }

        async fn update_loan_status(
            &self,
            id: &LoanId,
            status: LoanStatus,
        ) -> Result<(), StoreError> {
            let mut loans = self.loans.write().await;
            let loan = loans
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found("Loan", id))?;
            loan.status = status;
            Ok(())
        }

        async fn set_amount_received(&self, id: &LoanId, amount: Money) -> Result<(), StoreError> {
            let mut loans = self.loans.write().await;
            let loan = loans
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found("Loan", id))?;
            loan.amount_received = amount;
            Ok(())
        }

        async fn set_closure_date_if_absent(
            &self,
            id: &LoanId,
            date: NaiveDate,
        ) -> Result<NaiveDate, StoreError> {
            let mut loans = self.loans.write().await;
            let loan = loans
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found("Loan", id))?;
            Ok(*loan.closure_date.get_or_insert(date))
        }

        async fn set_default_marker(
            &self,
            id: &LoanId,
            marker: Option<DefaultMarker>,
        ) -> Result<(), StoreError> {
            let mut loans = self.loans.write().await;
            let loan = loans
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found("Loan", id))?;
            loan.default_marker = marker;
            Ok(())
        }

        async fn insert_schedule(
            &self,
            loan_id: &LoanId,
            rows: Vec<Installment>,
        ) -> Result<bool, StoreError> {
            let mut installments = self.installments.write().await;
            if installments.values().any(|i| &i.loan_id == loan_id) {
                return Ok(false);
            }
            for row in rows {
                installments.insert(row.id, row);
            }
            Ok(true)
        }

        async fn get_installment(&self, id: InstallmentId) -> Result<Installment, StoreError> {
            self.installments
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("Installment", id))
        }

        async fn installments_for_loan(
            &self,
            loan_id: &LoanId,
        ) -> Result<Vec<Installment>, StoreError> {
            let mut rows: Vec<Installment> = self
                .installments
                .read()
                .await
                .values()
                .filter(|i| &i.loan_id == loan_id)
                .cloned()
                .collect();
            rows.sort_by_key(|i| i.sequence);
            Ok(rows)
        }

        async fn due_installments(&self) -> Result<Vec<Installment>, StoreError> {
            let mut rows: Vec<Installment> = self
                .installments
                .read()
                .await
                .values()
                .filter(|i| i.status.is_collectible())
                .cloned()
                .collect();
            rows.sort_by_key(|i| (i.due_date, i.sequence));
            Ok(rows)
        }

        async fn next_due_installment(
            &self,
            loan_id: &LoanId,
        ) -> Result<Option<Installment>, StoreError> {
            let rows = self.installments.read().await;
            Ok(rows
                .values()
                .filter(|i| &i.loan_id == loan_id && i.status.is_collectible())
                .min_by_key(|i| (i.due_date, i.sequence))
                .cloned())
        }

        async fn update_installment(
            &self,
            id: InstallmentId,
            update: InstallmentUpdate,
        ) -> Result<(), StoreError> {
            if self.fail_installment_updates.load(Ordering::SeqCst) {
                return Err(StoreError::internal("installment update rejected"));
            }
            let mut installments = self.installments.write().await;
            let row = installments
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found("Installment", id))?;
            if let Some(due_date) = update.due_date {
                row.due_date = due_date;
            }
            if let Some(amount) = update.amount {
                row.amount = amount;
            }
            if let Some(status) = update.status {
                row.status = status;
            }
            Ok(())
        }

        async fn set_status_for_loan(
            &self,
            loan_id: &LoanId,
            from: InstallmentStatus,
            to: InstallmentStatus,
        ) -> Result<u64, StoreError> {
            let mut installments = self.installments.write().await;
            let mut affected = 0;
            for row in installments.values_mut() {
                if &row.loan_id == loan_id && row.status == from {
                    row.status = to;
                    affected += 1;
                }
            }
            Ok(affected)
        }

        async fn insert_payment(&self, payment: Payment) -> Result<(), StoreError> {
            self.payments.write().await.push(payment);
            Ok(())
        }

        async fn payments_for_loan(&self, loan_id: &LoanId) -> Result<Vec<Payment>, StoreError> {
            Ok(self
                .payments
                .read()
                .await
                .iter()
                .filter(|p| &p.loan_id == loan_id)
                .cloned()
                .collect())
        }

        async fn payment_total_for_loan(&self, loan_id: &LoanId) -> Result<Money, StoreError> {
            Ok(self
                .payments
                .read()
                .await
                .iter()
                .filter(|p| &p.loan_id == loan_id)
                .map(|p| p.amount)
                .sum())
        }

        async fn insert_bounce_case(&self, case: BounceCase) -> Result<(), StoreError> {
            self.bounce_cases.write().await.push(case);
            Ok(())
        }

        async fn resolve_bounce_case(
            &self,
            id: BounceCaseId,
            note: &str,
        ) -> Result<BounceCase, StoreError> {
            let mut cases = self.bounce_cases.write().await;
            let case = cases
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| StoreError::not_found("BounceCase", id))?;
            if case.status == BounceCaseStatus::Resolved {
                return Err(StoreError::conflict(format!(
                    "bounce case {id} is already resolved"
                )));
            }
            case.resolve(note);
            Ok(case.clone())
        }

        async fn collection_rows(&self) -> Result<Vec<CollectionRow>, StoreError> {
            let loans = self.loans.read().await;
            let installments = self.installments.read().await;
            let payments = self.payments.read().await;

            let mut rows = Vec::with_capacity(installments.len());
            for inst in installments.values() {
                let loan = loans
                    .get(&inst.loan_id)
                    .ok_or_else(|| StoreError::not_found("Loan", &inst.loan_id))?;
                let collected: Money = payments
                    .iter()
                    .filter(|p| p.installment_id == Some(inst.id))
                    .map(|p| p.amount)
                    .sum();
                rows.push(CollectionRow {
                    loan_id: inst.loan_id.clone(),
                    branch: loan.branch.clone(),
                    loan_status: loan.status,
                    due_date: inst.due_date,
                    amount: inst.amount,
                    status: inst.status,
                    collected,
                });
            }
            rows.sort_by(|a, b| (a.due_date, &a.loan_id).cmp(&(b.due_date, &b.loan_id)));
            Ok(rows)
        }
    }
}
