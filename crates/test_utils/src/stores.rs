//! Seeded In-Memory Stores
//!
//! Helpers that stand up a mock ledger store pre-loaded with loans and
//! their weekly schedules.

use std::sync::Arc;

use domain_ledger::store::mock::MockLedgerStore;
use domain_ledger::{LedgerStore, Loan};

use crate::builders::weekly_schedule;

/// Store seeded with the given loans and a full weekly schedule for each
/// loan that carries a disbursement date
pub async fn scheduled_store(loans: Vec<Loan>) -> Arc<MockLedgerStore> {
    let store = Arc::new(MockLedgerStore::with_loans(loans.clone()).await);
    for loan in &loans {
        if loan.disbursement_date.is_some() {
            store
                .insert_schedule(&loan.id, weekly_schedule(loan))
                .await
                .unwrap();
        }
    }
    store
}
