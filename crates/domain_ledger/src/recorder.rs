//! Payment recording and loan closure
//!
//! Recording a payment is two logically coupled writes: the immutable
//! payment row, then the installment status. The status write always follows
//! a successful insert; if it fails, the error carries the payment id so the
//! partial state can be reconciled instead of silently swallowed.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use core_kernel::{authorize, CallerIdentity, InstallmentId, LoanId, Money, PaymentId, ProtectedOp};

use crate::error::LedgerError;
use crate::installment::{InstallmentStatus, InstallmentUpdate};
use crate::loan::LoanStatus;
use crate::payment::{cycle_delay, Payment, PaymentMethod};
use crate::store::LedgerStore;

/// Inputs for recording one settlement event
#[derive(Debug, Clone)]
pub struct RecordPaymentRequest {
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub remarks: Option<String>,
    pub received_date: Option<NaiveDate>,
}

impl RecordPaymentRequest {
    pub fn new(amount: Money, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            reference: None,
            remarks: None,
            received_date: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn with_received_date(mut self, date: NaiveDate) -> Self {
        self.received_date = Some(date);
        self
    }
}

/// What a successful record call produced
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub installment_id: InstallmentId,
    pub cycle_delay_days: Option<i64>,
    pub status: InstallmentStatus,
}

/// One loan within a bulk-close batch
#[derive(Debug, Clone)]
pub struct CloseRequest {
    pub loan_id: LoanId,
    /// Explicit received amount; when absent the sum of all recorded
    /// payments for the loan is used
    pub amount: Option<Money>,
    /// Terminal status to apply; Closed when unspecified
    pub status: LoanStatus,
}

impl CloseRequest {
    pub fn new(loan_id: LoanId) -> Self {
        Self {
            loan_id,
            amount: None,
            status: LoanStatus::Closed,
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_status(mut self, status: LoanStatus) -> Self {
        self.status = status;
        self
    }
}

/// Outcome for one closed loan
#[derive(Debug, Clone, Serialize)]
pub struct ClosedLoan {
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub amount_received: Money,
    pub closure_date: NaiveDate,
}

/// Per-item result of a bulk close; items succeed or fail independently
#[derive(Debug)]
pub struct CloseResult {
    pub loan_id: LoanId,
    pub result: Result<ClosedLoan, LedgerError>,
}

/// Service applying payments and closures to the ledger
pub struct PaymentRecorder {
    store: Arc<dyn LedgerStore>,
}

impl PaymentRecorder {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Records a settlement against a specific installment.
    ///
    /// Status is decided by this payment's amount alone: `Paid` when it
    /// covers the installment amount, `Partial` otherwise. Prior partial
    /// payments are not accumulated; observed product behavior, kept as-is.
    /// The status write is unconditional and does not consult the ledger
    /// state machine, so a settlement entered against a settled or
    /// defaulted row re-stamps it from this payment alone.
    pub async fn record(
        &self,
        caller: &CallerIdentity,
        installment_id: InstallmentId,
        request: RecordPaymentRequest,
    ) -> Result<PaymentReceipt, LedgerError> {
        let installment = self.store.get_installment(installment_id).await?;
        let delay = cycle_delay(request.received_date, installment.due_date);

        let mut payment = Payment::new(
            installment.loan_id.clone(),
            request.amount,
            request.method,
            caller.username.clone(),
        )
        .against_installment(installment_id, delay);
        if let Some(reference) = request.reference {
            payment = payment.with_reference(reference);
        }
        if let Some(remarks) = request.remarks {
            payment = payment.with_remarks(remarks);
        }
        if let Some(date) = request.received_date {
            payment = payment.with_received_date(date);
        }
        let payment_id = payment.id;

        self.store.insert_payment(payment).await?;

        let status = if request.amount >= installment.amount {
            InstallmentStatus::Paid
        } else {
            InstallmentStatus::Partial
        };
        if status != installment.status {
            let update = InstallmentUpdate {
                status: Some(status),
                ..Default::default()
            };
            if let Err(source) = self.store.update_installment(installment_id, update).await {
                warn!(
                    payment = %payment_id,
                    installment = %installment_id,
                    "payment inserted but status update failed"
                );
                return Err(LedgerError::StatusUpdateFailed { payment_id, source });
            }
        }

        info!(
            loan = %installment.loan_id,
            installment = %installment_id,
            amount = %request.amount,
            status = %status,
            "payment recorded"
        );
        Ok(PaymentReceipt {
            payment_id,
            installment_id,
            cycle_delay_days: delay,
            status,
        })
    }

    /// Applies a payment to the loan's earliest-due Pending/Overdue
    /// installment. Operators often know "loan X paid ₹Y" without knowing
    /// the installment number.
    pub async fn record_next_pending(
        &self,
        caller: &CallerIdentity,
        loan_id: &LoanId,
        request: RecordPaymentRequest,
    ) -> Result<PaymentReceipt, LedgerError> {
        let next = self
            .store
            .next_due_installment(loan_id)
            .await?
            .ok_or_else(|| LedgerError::NoPendingInstallments(loan_id.clone()))?;
        self.record(caller, next.id, request).await
    }

    /// Closes one loan: stamps the received amount (explicit or derived from
    /// the payment ledger) and sets the closure date if not already set.
    pub async fn close_loan(
        &self,
        caller: &CallerIdentity,
        request: CloseRequest,
        closed_on: NaiveDate,
    ) -> Result<ClosedLoan, LedgerError> {
        authorize(caller, ProtectedOp::CloseLoan)?;
        self.close_one(request, closed_on).await
    }

    /// Closes a batch of loans; each item's success or failure is
    /// independent and reported per item, never collapsed to one error.
    pub async fn bulk_close(
        &self,
        caller: &CallerIdentity,
        requests: Vec<CloseRequest>,
        closed_on: NaiveDate,
    ) -> Result<Vec<CloseResult>, LedgerError> {
        authorize(caller, ProtectedOp::CloseLoan)?;
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let loan_id = request.loan_id.clone();
            let result = self.close_one(request, closed_on).await;
            if let Err(err) = &result {
                warn!(loan = %loan_id, error = %err, "bulk close item failed");
            }
            results.push(CloseResult { loan_id, result });
        }
        Ok(results)
    }

    async fn close_one(
        &self,
        request: CloseRequest,
        closed_on: NaiveDate,
    ) -> Result<ClosedLoan, LedgerError> {
        if !request.status.is_terminal() {
            return Err(LedgerError::invalid_input(format!(
                "{} is not a terminal closure status",
                request.status
            )));
        }

        let loan = self.store.get_loan(&request.loan_id).await?;
        if !loan.status.can_transition(request.status) {
            return Err(LedgerError::invalid_loan_state(format!(
                "loan {} is {} and cannot move to {}",
                loan.id, loan.status, request.status
            )));
        }

        let amount_received = match request.amount {
            Some(amount) => amount,
            None => self.store.payment_total_for_loan(&loan.id).await?,
        };

        self.store
            .update_loan_status(&loan.id, request.status)
            .await?;
        self.store
            .set_amount_received(&loan.id, amount_received)
            .await?;
        let closure_date = self
            .store
            .set_closure_date_if_absent(&loan.id, closed_on)
            .await?;

        info!(
            loan = %loan.id,
            status = %request.status,
            received = %amount_received,
            "loan closed"
        );
        Ok(ClosedLoan {
            loan_id: loan.id,
            status: request.status,
            amount_received,
            closure_date,
        })
    }
}
