//! Loan model and lifecycle status
//!
//! A loan is created once at disbursement entry and never deleted. The
//! Payment Recorder mutates `amount_received`; the Default/Closure manager
//! mutates `status`, `closure_date`, and the default marker.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CoreError, LoanId, Money};

use crate::schedule::DEFAULT_INSTALLMENT_COUNT;

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Active,
    Closed,
    Foreclosed,
    Default,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "Active",
            LoanStatus::Closed => "Closed",
            LoanStatus::Foreclosed => "Foreclosed",
            LoanStatus::Default => "Default",
        }
    }

    /// True once the loan has been settled and archived
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Closed | LoanStatus::Foreclosed)
    }

    /// Valid lifecycle moves: Active can close, foreclose, or default;
    /// Default can be reinstated to Active; Closed/Foreclosed are final.
    pub fn can_transition(&self, to: LoanStatus) -> bool {
        matches!(
            (self, to),
            (LoanStatus::Active, LoanStatus::Closed)
                | (LoanStatus::Active, LoanStatus::Foreclosed)
                | (LoanStatus::Active, LoanStatus::Default)
                | (LoanStatus::Default, LoanStatus::Active)
                | (LoanStatus::Default, LoanStatus::Closed)
                | (LoanStatus::Default, LoanStatus::Foreclosed)
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("active") => Ok(LoanStatus::Active),
            v if v.eq_ignore_ascii_case("closed") => Ok(LoanStatus::Closed),
            v if v.eq_ignore_ascii_case("foreclosed") => Ok(LoanStatus::Foreclosed),
            v if v.eq_ignore_ascii_case("default") => Ok(LoanStatus::Default),
            other => Err(CoreError::validation(format!(
                "unrecognized loan status: {other:?}"
            ))),
        }
    }
}

/// Reason and date recorded when a loan is marked Default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultMarker {
    pub reason: String,
    pub marked_on: NaiveDate,
}

/// A disbursed credit agreement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    /// Business loan number
    pub id: LoanId,
    /// Servicing branch
    pub branch: String,
    /// Origin channel (walk-in, agent, campaign, ...)
    pub channel: String,
    /// Borrower name
    pub customer_name: String,
    /// Principal disbursed
    pub principal: Money,
    /// Processing fee charged at disbursement
    pub processing_fee: Money,
    /// Tax on fees
    pub tax: Money,
    /// Amount actually paid out to the borrower
    pub net_disbursed: Money,
    /// Principal plus interest to be repaid
    pub repayment_amount: Money,
    /// Interest rate percentage
    pub interest_rate: Decimal,
    /// Total loan duration in days
    pub tenure_days: u32,
    /// Disbursement date; schedule generation requires this
    pub disbursement_date: Option<NaiveDate>,
    /// Per-installment amount, if fixed explicitly
    pub installment_amount: Option<Money>,
    /// Number of installments, if fixed explicitly
    pub total_installments: Option<u32>,
    /// Lifecycle status
    pub status: LoanStatus,
    /// Amount received across all payments (stamped at closure)
    pub amount_received: Money,
    /// Set once when the loan is closed
    pub closure_date: Option<NaiveDate>,
    /// Present while the loan is marked Default
    pub default_marker: Option<DefaultMarker>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Creates a new active loan with zero fees and no schedule terms set
    pub fn new(
        id: LoanId,
        customer_name: impl Into<String>,
        principal: Money,
        repayment_amount: Money,
    ) -> Self {
        Self {
            id,
            branch: String::new(),
            channel: String::new(),
            customer_name: customer_name.into(),
            principal,
            processing_fee: Money::ZERO,
            tax: Money::ZERO,
            net_disbursed: principal,
            repayment_amount,
            interest_rate: Decimal::ZERO,
            tenure_days: 98,
            disbursement_date: None,
            installment_amount: None,
            total_installments: None,
            status: LoanStatus::Active,
            amount_received: Money::ZERO,
            closure_date: None,
            default_marker: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_fees(mut self, processing_fee: Money, tax: Money) -> Self {
        self.processing_fee = processing_fee;
        self.tax = tax;
        self.net_disbursed = self.principal - processing_fee - tax;
        self
    }

    pub fn with_interest_rate(mut self, rate_percent: Decimal) -> Self {
        self.interest_rate = rate_percent;
        self
    }

    pub fn with_tenure_days(mut self, days: u32) -> Self {
        self.tenure_days = days;
        self
    }

    pub fn with_disbursement_date(mut self, date: NaiveDate) -> Self {
        self.disbursement_date = Some(date);
        self
    }

    /// Fixes the installment plan explicitly instead of relying on defaults
    pub fn with_installment_plan(mut self, count: u32, amount: Option<Money>) -> Self {
        self.total_installments = Some(count);
        self.installment_amount = amount;
        self
    }

    /// Number of installments, defaulting to the weekly product convention
    pub fn installment_count(&self) -> u32 {
        self.total_installments.unwrap_or(DEFAULT_INSTALLMENT_COUNT)
    }

    /// Per-installment amount: the explicit figure, or an even split of the
    /// repayment amount rounded to paise
    pub fn emi_amount(&self) -> Result<Money, CoreError> {
        match self.installment_amount {
            Some(amount) => Ok(amount),
            None => Ok(self.repayment_amount.split_even(self.installment_count())?),
        }
    }

    /// Checks the construction invariants on loan terms
    ///
    /// Ingestion runs this before handing a loan to `insert_loan`; the
    /// stores accept what they are given and do not re-check.
    ///
    /// The EMI-times-count check tolerates up to one rupee of rounding per
    /// installment, matching how ingestion rounds per-installment figures.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.repayment_amount < self.principal {
            return Err(CoreError::validation(format!(
                "repayment amount {} is below principal {}",
                self.repayment_amount, self.principal
            )));
        }
        if let Some(0) = self.total_installments {
            return Err(CoreError::validation(
                "total installments must be positive when set",
            ));
        }
        if let (Some(amount), Some(count)) = (self.installment_amount, self.total_installments) {
            let implied = amount.multiply(Decimal::from(count));
            let drift = (implied.amount() - self.repayment_amount.amount()).abs();
            if drift >= Decimal::from(count) {
                return Err(CoreError::validation(format!(
                    "installment plan {amount} x {count} does not reconcile with repayment {}",
                    self.repayment_amount
                )));
            }
        }
        Ok(())
    }
}
