//! Fixed ageing bands for overdue installments

use serde::{Serialize, Serializer};
use std::fmt;

/// Days-past-due band. Edges are fixed product conventions; an installment
/// due today (zero days overdue) falls in no band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeingBucket {
    Days1To7,
    Days8To15,
    Days16To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgeingBucket {
    /// Every band, ascending by lower bound
    pub const ALL: [AgeingBucket; 6] = [
        AgeingBucket::Days1To7,
        AgeingBucket::Days8To15,
        AgeingBucket::Days16To30,
        AgeingBucket::Days31To60,
        AgeingBucket::Days61To90,
        AgeingBucket::Over90,
    ];

    /// Band for a days-overdue figure; `None` when not past due
    pub fn for_days(days: i64) -> Option<Self> {
        match days {
            d if d <= 0 => None,
            1..=7 => Some(AgeingBucket::Days1To7),
            8..=15 => Some(AgeingBucket::Days8To15),
            16..=30 => Some(AgeingBucket::Days16To30),
            31..=60 => Some(AgeingBucket::Days31To60),
            61..=90 => Some(AgeingBucket::Days61To90),
            _ => Some(AgeingBucket::Over90),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeingBucket::Days1To7 => "1-7",
            AgeingBucket::Days8To15 => "8-15",
            AgeingBucket::Days16To30 => "16-30",
            AgeingBucket::Days31To60 => "31-60",
            AgeingBucket::Days61To90 => "61-90",
            AgeingBucket::Over90 => "90+",
        }
    }
}

impl fmt::Display for AgeingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for AgeingBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
