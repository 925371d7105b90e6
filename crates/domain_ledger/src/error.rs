//! Ledger domain errors

use core_kernel::{AccessError, LoanId, PaymentId};
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A required field is missing or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The loan is not in a state that permits the operation
    #[error("Invalid loan state: {0}")]
    InvalidLoanState(String),

    /// Referenced loan or installment does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A partial update was requested with an empty field set
    #[error("No fields to update")]
    NoFields,

    /// No installment in {Pending, Overdue} exists for the loan
    #[error("No pending installments for loan {0}")]
    NoPendingInstallments(LoanId),

    /// The requested status change is not a valid transition
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Caller's role may not perform the operation
    #[error(transparent)]
    Forbidden(#[from] AccessError),

    /// The payment row was inserted but the coupled status write failed.
    /// The payment id is carried so the caller can reconcile manually.
    #[error("Payment {payment_id} recorded but installment status update failed")]
    StatusUpdateFailed {
        payment_id: PaymentId,
        #[source]
        source: StoreError,
    },

    /// Underlying persistence call failed
    #[error("Store failure: {0}")]
    Store(StoreError),
}

impl LedgerError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        LedgerError::InvalidInput(message.into())
    }

    pub fn invalid_loan_state(message: impl Into<String>) -> Self {
        LedgerError::InvalidLoanState(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            other => LedgerError::Store(other),
        }
    }
}
