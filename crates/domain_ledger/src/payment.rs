//! Payment records
//!
//! Payments are append-only: corrections are new rows plus a manual status
//! fix, never edits to an existing row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CoreError, InstallmentId, LoanId, Money, PaymentId};

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Upi,
    Cheque,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Card => "card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("cash") => Ok(PaymentMethod::Cash),
            v if v.eq_ignore_ascii_case("bank_transfer") => Ok(PaymentMethod::BankTransfer),
            v if v.eq_ignore_ascii_case("upi") => Ok(PaymentMethod::Upi),
            v if v.eq_ignore_ascii_case("cheque") => Ok(PaymentMethod::Cheque),
            v if v.eq_ignore_ascii_case("card") => Ok(PaymentMethod::Card),
            other => Err(CoreError::validation(format!(
                "unrecognized payment method: {other:?}"
            ))),
        }
    }
}

/// A recorded settlement against an installment (or directly against a loan
/// for ad-hoc entries)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// Nullable: ad-hoc entries reference the loan only
    pub installment_id: Option<InstallmentId>,
    pub loan_id: LoanId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Bank reference / UTR code
    pub reference: Option<String>,
    pub remarks: Option<String>,
    /// Date funds were received; absent when unknown
    pub received_date: Option<NaiveDate>,
    /// Received date minus due date in whole days; None when the received
    /// date is unknown (never zero, which would claim an on-time payment)
    pub cycle_delay_days: Option<i64>,
    /// Username of the recording actor
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        loan_id: LoanId,
        amount: Money,
        method: PaymentMethod,
        recorded_by: impl Into<String>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            installment_id: None,
            loan_id,
            amount,
            method,
            reference: None,
            remarks: None,
            received_date: None,
            cycle_delay_days: None,
            recorded_by: recorded_by.into(),
            recorded_at: Utc::now(),
        }
    }

    /// Ties the payment to an installment, with the delay computed from
    /// that installment's due date
    pub fn against_installment(
        mut self,
        installment_id: InstallmentId,
        cycle_delay_days: Option<i64>,
    ) -> Self {
        self.installment_id = Some(installment_id);
        self.cycle_delay_days = cycle_delay_days;
        self
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

/// Whole-day delay between receipt and due date; None when receipt date is
/// unknown
pub fn cycle_delay(received: Option<NaiveDate>, due: NaiveDate) -> Option<i64> {
    received.map(|r| (r - due).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_delay_none_when_receipt_unknown() {
        let due = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(cycle_delay(None, due), None);
    }

    #[test]
    fn test_cycle_delay_signed_days() {
        let due = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let late = due + chrono::Days::new(4);
        let early = due - chrono::Days::new(2);
        assert_eq!(cycle_delay(Some(late), due), Some(4));
        assert_eq!(cycle_delay(Some(early), due), Some(-2));
        assert_eq!(cycle_delay(Some(due), due), Some(0));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("UPI".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
        assert!("barter".parse::<PaymentMethod>().is_err());
    }
}
