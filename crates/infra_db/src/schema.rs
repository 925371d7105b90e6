//! Embedded schema bootstrap
//!
//! The ledger schema is small enough to ship inline. `apply_schema` is
//! idempotent; every statement is `IF NOT EXISTS`. The unique index on
//! (loan_id, sequence) is what makes concurrent schedule generation safe.

use sqlx::PgPool;
use tracing::info;

use crate::error::DatabaseError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS loans (
    loan_id             TEXT PRIMARY KEY,
    branch              TEXT NOT NULL DEFAULT '',
    channel             TEXT NOT NULL DEFAULT '',
    customer_name       TEXT NOT NULL,
    principal           NUMERIC(14, 2) NOT NULL,
    processing_fee      NUMERIC(14, 2) NOT NULL DEFAULT 0,
    tax                 NUMERIC(14, 2) NOT NULL DEFAULT 0,
    net_disbursed       NUMERIC(14, 2) NOT NULL,
    repayment_amount    NUMERIC(14, 2) NOT NULL,
    interest_rate       NUMERIC(7, 4) NOT NULL DEFAULT 0,
    tenure_days         INTEGER NOT NULL DEFAULT 98,
    disbursement_date   DATE,
    installment_amount  NUMERIC(14, 2),
    total_installments  INTEGER,
    status              TEXT NOT NULL DEFAULT 'Active',
    amount_received     NUMERIC(14, 2) NOT NULL DEFAULT 0,
    closure_date        DATE,
    default_reason      TEXT,
    default_marked_on   DATE,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS installments (
    installment_id  UUID PRIMARY KEY,
    loan_id         TEXT NOT NULL REFERENCES loans (loan_id),
    sequence        INTEGER NOT NULL,
    due_date        DATE NOT NULL,
    amount          NUMERIC(14, 2) NOT NULL,
    status          TEXT NOT NULL DEFAULT 'Pending',
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_installments_loan_sequence
    ON installments (loan_id, sequence);

CREATE INDEX IF NOT EXISTS idx_installments_due_date
    ON installments (due_date);

CREATE TABLE IF NOT EXISTS payments (
    payment_id        UUID PRIMARY KEY,
    installment_id    UUID REFERENCES installments (installment_id),
    loan_id           TEXT NOT NULL REFERENCES loans (loan_id),
    amount            NUMERIC(14, 2) NOT NULL,
    method            TEXT NOT NULL,
    reference         TEXT,
    remarks           TEXT,
    received_date     DATE,
    cycle_delay_days  BIGINT,
    recorded_by       TEXT NOT NULL,
    recorded_at       TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_payments_loan ON payments (loan_id);

CREATE TABLE IF NOT EXISTS bounce_cases (
    bounce_case_id   UUID PRIMARY KEY,
    installment_id   UUID NOT NULL REFERENCES installments (installment_id),
    loan_id          TEXT NOT NULL REFERENCES loans (loan_id),
    bounce_date      DATE NOT NULL,
    reason           TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'Open',
    resolution_note  TEXT,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

/// Creates the ledger tables and indexes if they do not exist
pub async fn apply_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::SchemaFailed(e.to_string()))?;
    info!("ledger schema applied");
    Ok(())
}
