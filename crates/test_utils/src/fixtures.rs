//! Pre-built Test Fixtures
//!
//! Ready-to-use data for ledger tests: consistent amounts, anchor dates,
//! and loan identifiers so assertions stay predictable across suites.

use chrono::NaiveDate;
use core_kernel::{LoanId, Money};
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Typical microloan principal
    pub fn principal() -> Money {
        Money::new(dec!(50000.00))
    }

    /// Repayment for [`Self::principal`] at the standard markup
    pub fn repayment() -> Money {
        Money::new(dec!(70000.00))
    }

    /// One weekly EMI of [`Self::repayment`] over fourteen installments
    pub fn weekly_emi() -> Money {
        Money::new(dec!(5000.00))
    }

    /// Small partial settlement
    pub fn partial() -> Money {
        Money::new(dec!(3000.00))
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Standard disbursement date (Jan 1, 2024)
    pub fn disbursement() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Due date of the first weekly installment after [`Self::disbursement`]
    pub fn first_due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
    }

    /// Mid-cycle reporting anchor
    pub fn mid_cycle() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
    }

    /// Anchor after the full fourteen-week cycle has elapsed
    pub fn after_cycle() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 9).unwrap()
    }
}

/// Fixture for loan identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn loan_id() -> LoanId {
        LoanId::new("MFL-1001").unwrap()
    }

    pub fn other_loan_id() -> LoanId {
        LoanId::new("MFL-2002").unwrap()
    }
}
