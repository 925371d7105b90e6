//! Installment model and status state machine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CoreError, InstallmentId, LoanId, Money};

/// Installment status
///
/// `Paid` is terminal for normal flow. `Default` is terminal except for the
/// administrative reset back to `Pending` used by default reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Partial,
    Overdue,
    Default,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "Pending",
            InstallmentStatus::Paid => "Paid",
            InstallmentStatus::Partial => "Partial",
            InstallmentStatus::Overdue => "Overdue",
            InstallmentStatus::Default => "Default",
        }
    }

    /// True for statuses still awaiting collection
    pub fn is_collectible(&self) -> bool {
        matches!(self, InstallmentStatus::Pending | InstallmentStatus::Overdue)
    }

    /// Valid transitions per the ledger state machine
    pub fn can_transition(&self, to: InstallmentStatus) -> bool {
        use InstallmentStatus::*;
        match (self, to) {
            (Pending, Paid) | (Pending, Partial) | (Pending, Overdue) | (Pending, Default) => true,
            (Overdue, Paid) | (Overdue, Partial) | (Overdue, Default) => true,
            (Partial, Paid) | (Partial, Default) => true,
            // administrative reset when a loan default is reversed
            (Default, Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InstallmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("pending") => Ok(InstallmentStatus::Pending),
            v if v.eq_ignore_ascii_case("paid") => Ok(InstallmentStatus::Paid),
            v if v.eq_ignore_ascii_case("partial") => Ok(InstallmentStatus::Partial),
            v if v.eq_ignore_ascii_case("overdue") => Ok(InstallmentStatus::Overdue),
            v if v.eq_ignore_ascii_case("default") => Ok(InstallmentStatus::Default),
            other => Err(CoreError::validation(format!(
                "unrecognized installment status: {other:?}"
            ))),
        }
    }
}

/// One scheduled obligation within a loan's repayment schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    /// 1-based position in the schedule, unique per loan
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub status: InstallmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Installment {
    pub fn new(loan_id: LoanId, sequence: u32, due_date: NaiveDate, amount: Money) -> Self {
        Self {
            id: InstallmentId::new(),
            loan_id,
            sequence,
            due_date,
            amount,
            status: InstallmentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Whole days past due as of the given date, floored at zero
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.due_date).num_days().max(0)
    }
}

/// An installment annotated with its collection priority ordering key
#[derive(Debug, Clone, Serialize)]
pub struct DueInstallment {
    pub installment: Installment,
    pub days_overdue: i64,
}

/// Partial update for an installment; at least one field must be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallmentUpdate {
    pub due_date: Option<NaiveDate>,
    pub amount: Option<Money>,
    pub status: Option<InstallmentStatus>,
}

impl InstallmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.due_date.is_none() && self.amount.is_none() && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_match_the_state_machine() {
        use InstallmentStatus::*;
        assert!(Pending.can_transition(Paid));
        assert!(Pending.can_transition(Overdue));
        assert!(Overdue.can_transition(Partial));
        assert!(Partial.can_transition(Paid));
        assert!(Default.can_transition(Pending));

        assert!(!Paid.can_transition(Pending));
        assert!(!Paid.can_transition(Partial));
        assert!(!Partial.can_transition(Overdue));
        assert!(!Default.can_transition(Paid));
    }

    #[test]
    fn test_days_overdue_floors_at_zero() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let inst = Installment::new(
            LoanId::new("MFL-1").unwrap(),
            1,
            due,
            Money::from_rupees(500),
        );
        assert_eq!(inst.days_overdue(due), 0);
        assert_eq!(inst.days_overdue(due + chrono::Days::new(9)), 9);
        assert_eq!(inst.days_overdue(due - chrono::Days::new(3)), 0);
    }

    #[test]
    fn test_update_is_empty() {
        assert!(InstallmentUpdate::default().is_empty());
        let update = InstallmentUpdate {
            amount: Some(Money::from_rupees(100)),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!("Bounced".parse::<InstallmentStatus>().is_err());
        assert_eq!(
            "overdue".parse::<InstallmentStatus>().unwrap(),
            InstallmentStatus::Overdue
        );
    }
}
