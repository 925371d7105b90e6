//! Bounce cases
//!
//! A bounce case is a side-record opened when a scheduled payment fails to
//! clear. It is tracked for collections follow-up separately from the
//! installment's own status.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BounceCaseId, InstallmentId, LoanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BounceCaseStatus {
    Open,
    Resolved,
}

impl BounceCaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BounceCaseStatus::Open => "Open",
            BounceCaseStatus::Resolved => "Resolved",
        }
    }
}

impl std::str::FromStr for BounceCaseStatus {
    type Err = core_kernel::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("open") => Ok(BounceCaseStatus::Open),
            v if v.eq_ignore_ascii_case("resolved") => Ok(BounceCaseStatus::Resolved),
            other => Err(core_kernel::CoreError::validation(format!(
                "unrecognized bounce case status: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BounceCase {
    pub id: BounceCaseId,
    pub installment_id: InstallmentId,
    pub loan_id: LoanId,
    pub bounce_date: NaiveDate,
    pub reason: String,
    pub status: BounceCaseStatus,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BounceCase {
    pub fn open(
        installment_id: InstallmentId,
        loan_id: LoanId,
        bounce_date: NaiveDate,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: BounceCaseId::new(),
            installment_id,
            loan_id,
            bounce_date,
            reason: reason.into(),
            status: BounceCaseStatus::Open,
            resolution_note: None,
            created_at: Utc::now(),
        }
    }

    pub fn resolve(&mut self, note: impl Into<String>) {
        self.status = BounceCaseStatus::Resolved;
        self.resolution_note = Some(note.into());
    }
}
