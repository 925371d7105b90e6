//! Test Data Builders
//!
//! Builder for constructing loans with sensible defaults, so tests specify
//! only the fields they assert on.

use chrono::NaiveDate;
use core_kernel::{LoanId, Money};

use domain_ledger::{build_schedule, Installment, Loan};

use crate::fixtures::{IdFixtures, MoneyFixtures, TemporalFixtures};

/// Builder for test loans
pub struct TestLoanBuilder {
    id: LoanId,
    customer_name: String,
    branch: String,
    channel: String,
    principal: Money,
    repayment: Money,
    disbursement_date: Option<NaiveDate>,
    installment_plan: Option<(u32, Option<Money>)>,
}

impl Default for TestLoanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLoanBuilder {
    /// Creates a builder with the standard ₹50,000 / ₹70,000 loan disbursed
    /// on the fixture date
    pub fn new() -> Self {
        Self {
            id: IdFixtures::loan_id(),
            customer_name: "Asha Pawar".to_string(),
            branch: "Pune".to_string(),
            channel: "branch_walk_in".to_string(),
            principal: MoneyFixtures::principal(),
            repayment: MoneyFixtures::repayment(),
            disbursement_date: Some(TemporalFixtures::disbursement()),
            installment_plan: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = LoanId::new(id).unwrap();
        self
    }

    pub fn with_customer(mut self, name: impl Into<String>) -> Self {
        self.customer_name = name.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_amounts(mut self, principal: Money, repayment: Money) -> Self {
        self.principal = principal;
        self.repayment = repayment;
        self
    }

    pub fn with_disbursement_date(mut self, date: NaiveDate) -> Self {
        self.disbursement_date = Some(date);
        self
    }

    pub fn without_disbursement_date(mut self) -> Self {
        self.disbursement_date = None;
        self
    }

    pub fn with_installment_plan(mut self, count: u32, amount: Option<Money>) -> Self {
        self.installment_plan = Some((count, amount));
        self
    }

    pub fn build(self) -> Loan {
        let mut loan = Loan::new(self.id, self.customer_name, self.principal, self.repayment)
            .with_branch(self.branch)
            .with_channel(self.channel);
        if let Some(date) = self.disbursement_date {
            loan = loan.with_disbursement_date(date);
        }
        if let Some((count, amount)) = self.installment_plan {
            loan = loan.with_installment_plan(count, amount);
        }
        loan
    }
}

/// Weekly schedule rows for a built loan; panics if the loan has no
/// disbursement date
pub fn weekly_schedule(loan: &Loan) -> Vec<Installment> {
    build_schedule(loan).unwrap()
}
