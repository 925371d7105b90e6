//! Ledger domain - installment schedules, payment recording, and loan
//! lifecycle transitions
//!
//! The flow: loan terms feed the schedule generator, which populates the
//! installment ledger; the payment recorder mutates installment status as
//! settlements arrive; the lifecycle manager handles default and closure.
//! All services run over the injected [`store::LedgerStore`] port.

pub mod bounce;
pub mod error;
pub mod installment;
pub mod ledger;
pub mod lifecycle;
pub mod loan;
pub mod payment;
pub mod recorder;
pub mod schedule;
pub mod store;

pub use bounce::{BounceCase, BounceCaseStatus};
pub use error::LedgerError;
pub use installment::{DueInstallment, Installment, InstallmentStatus, InstallmentUpdate};
pub use ledger::{InstallmentLedger, LoanBalance};
pub use lifecycle::{DefaultOutcome, LifecycleManager, ReinstateOutcome};
pub use loan::{DefaultMarker, Loan, LoanStatus};
pub use payment::{cycle_delay, Payment, PaymentMethod};
pub use recorder::{
    CloseRequest, CloseResult, ClosedLoan, PaymentReceipt, PaymentRecorder, RecordPaymentRequest,
};
pub use schedule::{
    build_schedule, BackfillItem, ScheduleOutcome, ScheduleService, DEFAULT_INSTALLMENT_COUNT,
    INSTALLMENT_INTERVAL_DAYS,
};
pub use store::{CollectionRow, LedgerStore, StoreError};
