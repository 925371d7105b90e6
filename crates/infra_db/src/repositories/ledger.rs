//! PostgreSQL implementation of the ledger store port
//!
//! Status columns are TEXT and parsed strictly on the way out; a stored
//! value that no longer matches a domain enum surfaces as a corrupt-row
//! error rather than being coerced. Schedule insertion relies on the
//! unique (loan_id, sequence) index so concurrent generators cannot both
//! write a schedule.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use core_kernel::{BounceCaseId, InstallmentId, LoanId, Money, PaymentId};
use domain_ledger::{
    BounceCase, CollectionRow, DefaultMarker, Installment, InstallmentStatus, InstallmentUpdate,
    LedgerStore, Loan, LoanStatus, Payment, PaymentMethod, StoreError,
};

use crate::error::DatabaseError;

const LOAN_COLUMNS: &str = "loan_id, branch, channel, customer_name, principal, processing_fee, \
     tax, net_disbursed, repayment_amount, interest_rate, tenure_days, disbursement_date, \
     installment_amount, total_installments, status, amount_received, closure_date, \
     default_reason, default_marked_on, created_at";

const INSTALLMENT_COLUMNS: &str =
    "installment_id, loan_id, sequence, due_date, amount, status, created_at";

const PAYMENT_COLUMNS: &str = "payment_id, installment_id, loan_id, amount, method, reference, \
     remarks, received_date, cycle_delay_days, recorded_by, recorded_at";

const BOUNCE_CASE_COLUMNS: &str = "bounce_case_id, installment_id, loan_id, bounce_date, \
     reason, status, resolution_note, created_at";

/// Store adapter backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LoanRow {
    loan_id: String,
    branch: String,
    channel: String,
    customer_name: String,
    principal: Decimal,
    processing_fee: Decimal,
    tax: Decimal,
    net_disbursed: Decimal,
    repayment_amount: Decimal,
    interest_rate: Decimal,
    tenure_days: i32,
    disbursement_date: Option<NaiveDate>,
    installment_amount: Option<Decimal>,
    total_installments: Option<i32>,
    status: String,
    amount_received: Decimal,
    closure_date: Option<NaiveDate>,
    default_reason: Option<String>,
    default_marked_on: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = DatabaseError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let status: LoanStatus = row
            .status
            .parse()
            .map_err(|_| DatabaseError::corrupt_row("loans.status", &row.status))?;
        let default_marker = match (row.default_reason, row.default_marked_on) {
            (Some(reason), Some(marked_on)) => Some(DefaultMarker { reason, marked_on }),
            (None, None) => None,
            _ => {
                return Err(DatabaseError::CorruptRow(format!(
                    "loan {} has a half-set default marker",
                    row.loan_id
                )))
            }
        };
        Ok(Loan {
            id: LoanId::new(row.loan_id.as_str())
                .map_err(|_| DatabaseError::corrupt_row("loans.loan_id", &row.loan_id))?,
            branch: row.branch,
            channel: row.channel,
            customer_name: row.customer_name,
            principal: Money::new(row.principal),
            processing_fee: Money::new(row.processing_fee),
            tax: Money::new(row.tax),
            net_disbursed: Money::new(row.net_disbursed),
            repayment_amount: Money::new(row.repayment_amount),
            interest_rate: row.interest_rate,
            tenure_days: u32::try_from(row.tenure_days)
                .map_err(|_| DatabaseError::corrupt_row("loans.tenure_days", row.tenure_days))?,
            disbursement_date: row.disbursement_date,
            installment_amount: row.installment_amount.map(Money::new),
            total_installments: row
                .total_installments
                .map(|n| {
                    u32::try_from(n).map_err(|_| {
                        DatabaseError::corrupt_row("loans.total_installments", n)
                    })
                })
                .transpose()?,
            status,
            amount_received: Money::new(row.amount_received),
            closure_date: row.closure_date,
            default_marker,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InstallmentRow {
    installment_id: Uuid,
    loan_id: String,
    sequence: i32,
    due_date: NaiveDate,
    amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<InstallmentRow> for Installment {
    type Error = DatabaseError;

    fn try_from(row: InstallmentRow) -> Result<Self, Self::Error> {
        Ok(Installment {
            id: InstallmentId::from_uuid(row.installment_id),
            loan_id: LoanId::new(row.loan_id.as_str())
                .map_err(|_| DatabaseError::corrupt_row("installments.loan_id", &row.loan_id))?,
            sequence: u32::try_from(row.sequence).map_err(|_| {
                DatabaseError::corrupt_row("installments.sequence", row.sequence)
            })?,
            due_date: row.due_date,
            amount: Money::new(row.amount),
            status: row
                .status
                .parse()
                .map_err(|_| DatabaseError::corrupt_row("installments.status", &row.status))?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    installment_id: Option<Uuid>,
    loan_id: String,
    amount: Decimal,
    method: String,
    reference: Option<String>,
    remarks: Option<String>,
    received_date: Option<NaiveDate>,
    cycle_delay_days: Option<i64>,
    recorded_by: String,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let method: PaymentMethod = row
            .method
            .parse()
            .map_err(|_| DatabaseError::corrupt_row("payments.method", &row.method))?;
        Ok(Payment {
            id: PaymentId::from_uuid(row.payment_id),
            installment_id: row.installment_id.map(InstallmentId::from_uuid),
            loan_id: LoanId::new(row.loan_id.as_str())
                .map_err(|_| DatabaseError::corrupt_row("payments.loan_id", &row.loan_id))?,
            amount: Money::new(row.amount),
            method,
            reference: row.reference,
            remarks: row.remarks,
            received_date: row.received_date,
            cycle_delay_days: row.cycle_delay_days,
            recorded_by: row.recorded_by,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BounceCaseRow {
    bounce_case_id: Uuid,
    installment_id: Uuid,
    loan_id: String,
    bounce_date: NaiveDate,
    reason: String,
    status: String,
    resolution_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BounceCaseRow> for BounceCase {
    type Error = DatabaseError;

    fn try_from(row: BounceCaseRow) -> Result<Self, Self::Error> {
        Ok(BounceCase {
            id: BounceCaseId::from_uuid(row.bounce_case_id),
            installment_id: InstallmentId::from_uuid(row.installment_id),
            loan_id: LoanId::new(row.loan_id.as_str())
                .map_err(|_| DatabaseError::corrupt_row("bounce_cases.loan_id", &row.loan_id))?,
            bounce_date: row.bounce_date,
            reason: row.reason,
            status: row
                .status
                .parse()
                .map_err(|_| DatabaseError::corrupt_row("bounce_cases.status", &row.status))?,
            resolution_note: row.resolution_note,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CollectionRowDb {
    loan_id: String,
    branch: String,
    loan_status: String,
    due_date: NaiveDate,
    amount: Decimal,
    status: String,
    collected: Decimal,
}

impl TryFrom<CollectionRowDb> for CollectionRow {
    type Error = DatabaseError;

    fn try_from(row: CollectionRowDb) -> Result<Self, Self::Error> {
        Ok(CollectionRow {
            loan_id: LoanId::new(row.loan_id.as_str())
                .map_err(|_| DatabaseError::corrupt_row("installments.loan_id", &row.loan_id))?,
            branch: row.branch,
            loan_status: row
                .loan_status
                .parse()
                .map_err(|_| DatabaseError::corrupt_row("loans.status", &row.loan_status))?,
            due_date: row.due_date,
            amount: Money::new(row.amount),
            status: row
                .status
                .parse()
                .map_err(|_| DatabaseError::corrupt_row("installments.status", &row.status))?,
            collected: Money::new(row.collected),
        })
    }
}

fn collect_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter()
        .map(|r| T::try_from(r).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn insert_loan(&self, loan: Loan) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO loans (loan_id, branch, channel, customer_name, principal, \
             processing_fee, tax, net_disbursed, repayment_amount, interest_rate, tenure_days, \
             disbursement_date, installment_amount, total_installments, status, amount_received, \
             closure_date, default_reason, default_marked_on, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20)",
        )
        .bind(loan.id.as_str())
        .bind(&loan.branch)
        .bind(&loan.channel)
        .bind(&loan.customer_name)
        .bind(loan.principal.amount())
        .bind(loan.processing_fee.amount())
        .bind(loan.tax.amount())
        .bind(loan.net_disbursed.amount())
        .bind(loan.repayment_amount.amount())
        .bind(loan.interest_rate)
        .bind(loan.tenure_days as i32)
        .bind(loan.disbursement_date)
        .bind(loan.installment_amount.map(|m| m.amount()))
        .bind(loan.total_installments.map(|n| n as i32))
        .bind(loan.status.as_str())
        .bind(loan.amount_received.amount())
        .bind(loan.closure_date)
        .bind(loan.default_marker.as_ref().map(|m| m.reason.clone()))
        .bind(loan.default_marker.as_ref().map(|m| m.marked_on))
        .bind(loan.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn get_loan(&self, id: &LoanId) -> Result<Loan, StoreError> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| StoreError::not_found("Loan", id))?;
        row.try_into().map_err(StoreError::from)
    }

    async fn loans_without_schedule(&self) -> Result<Vec<Loan>, StoreError> {
        let rows = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans l \
             WHERE NOT EXISTS (SELECT 1 FROM installments i WHERE i.loan_id = l.loan_id) \
             ORDER BY l.loan_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        collect_rows(rows)
    }

    async fn update_loan_status(&self, id: &LoanId, status: LoanStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE loans SET status = $2 WHERE loan_id = $1")
            .bind(id.as_str())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Loan", id));
        }
        Ok(())
    }

    async fn set_amount_received(&self, id: &LoanId, amount: Money) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE loans SET amount_received = $2 WHERE loan_id = $1")
            .bind(id.as_str())
            .bind(amount.amount())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Loan", id));
        }
        Ok(())
    }

    async fn set_closure_date_if_absent(
        &self,
        id: &LoanId,
        date: NaiveDate,
    ) -> Result<NaiveDate, StoreError> {
        // COALESCE keeps the first stamped date over any later close
        let on_record: Option<NaiveDate> = sqlx::query_scalar(
            "UPDATE loans SET closure_date = COALESCE(closure_date, $2) \
             WHERE loan_id = $1 RETURNING closure_date",
        )
        .bind(id.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        on_record.ok_or_else(|| StoreError::not_found("Loan", id))
    }

    async fn set_default_marker(
        &self,
        id: &LoanId,
        marker: Option<DefaultMarker>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE loans SET default_reason = $2, default_marked_on = $3 WHERE loan_id = $1",
        )
        .bind(id.as_str())
        .bind(marker.as_ref().map(|m| m.reason.clone()))
        .bind(marker.as_ref().map(|m| m.marked_on))
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Loan", id));
        }
        Ok(())
    }

    async fn insert_schedule(
        &self,
        loan_id: &LoanId,
        rows: Vec<Installment>,
    ) -> Result<bool, StoreError> {
        if rows.is_empty() {
            return Ok(false);
        }
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM installments WHERE loan_id = $1")
                .bind(loan_id.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(DatabaseError::from)?;
        if existing > 0 {
            return Ok(false);
        }

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO installments ({INSTALLMENT_COLUMNS}) "
        ));
        builder.push_values(rows.iter(), |mut b, inst| {
            b.push_bind(*inst.id.as_uuid())
                .push_bind(inst.loan_id.as_str())
                .push_bind(inst.sequence as i32)
                .push_bind(inst.due_date)
                .push_bind(inst.amount.amount())
                .push_bind(inst.status.as_str())
                .push_bind(inst.created_at);
        });
        // the unique (loan_id, sequence) index settles concurrent generators
        builder.push(" ON CONFLICT (loan_id, sequence) DO NOTHING");

        let affected = builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?
            .rows_affected();
        tx.commit().await.map_err(DatabaseError::from)?;

        debug!(loan = %loan_id, rows = affected, "schedule insert");
        Ok(affected > 0)
    }

    async fn get_installment(&self, id: InstallmentId) -> Result<Installment, StoreError> {
        let row = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments WHERE installment_id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| StoreError::not_found("Installment", id))?;
        row.try_into().map_err(StoreError::from)
    }

    async fn installments_for_loan(
        &self,
        loan_id: &LoanId,
    ) -> Result<Vec<Installment>, StoreError> {
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments \
             WHERE loan_id = $1 ORDER BY sequence"
        ))
        .bind(loan_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        collect_rows(rows)
    }

    async fn due_installments(&self) -> Result<Vec<Installment>, StoreError> {
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments \
             WHERE status IN ('Pending', 'Overdue') ORDER BY due_date, loan_id, sequence"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        collect_rows(rows)
    }

    async fn next_due_installment(
        &self,
        loan_id: &LoanId,
    ) -> Result<Option<Installment>, StoreError> {
        let row = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments \
             WHERE loan_id = $1 AND status IN ('Pending', 'Overdue') \
             ORDER BY due_date, sequence LIMIT 1"
        ))
        .bind(loan_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        row.map(|r| r.try_into().map_err(StoreError::from)).transpose()
    }

    async fn update_installment(
        &self,
        id: InstallmentId,
        update: InstallmentUpdate,
    ) -> Result<(), StoreError> {
        if update.is_empty() {
            return Err(StoreError::internal("empty installment update"));
        }
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE installments SET ");
        let mut fields = builder.separated(", ");
        if let Some(due_date) = update.due_date {
            fields.push("due_date = ").push_bind_unseparated(due_date);
        }
        if let Some(amount) = update.amount {
            fields.push("amount = ").push_bind_unseparated(amount.amount());
        }
        if let Some(status) = update.status {
            fields.push("status = ").push_bind_unseparated(status.as_str());
        }
        builder.push(" WHERE installment_id = ").push_bind(*id.as_uuid());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Installment", id));
        }
        Ok(())
    }

    async fn set_status_for_loan(
        &self,
        loan_id: &LoanId,
        from: InstallmentStatus,
        to: InstallmentStatus,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE installments SET status = $3 WHERE loan_id = $1 AND status = $2",
        )
        .bind(loan_id.as_str())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(result.rows_affected())
    }

    async fn insert_payment(&self, payment: Payment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payments (payment_id, installment_id, loan_id, amount, method, \
             reference, remarks, received_date, cycle_delay_days, recorded_by, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(*payment.id.as_uuid())
        .bind(payment.installment_id.map(|i| *i.as_uuid()))
        .bind(payment.loan_id.as_str())
        .bind(payment.amount.amount())
        .bind(payment.method.as_str())
        .bind(&payment.reference)
        .bind(&payment.remarks)
        .bind(payment.received_date)
        .bind(payment.cycle_delay_days)
        .bind(&payment.recorded_by)
        .bind(payment.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn payments_for_loan(&self, loan_id: &LoanId) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE loan_id = $1 ORDER BY recorded_at"
        ))
        .bind(loan_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        collect_rows(rows)
    }

    async fn payment_total_for_loan(&self, loan_id: &LoanId) -> Result<Money, StoreError> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE loan_id = $1",
        )
        .bind(loan_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(Money::new(total))
    }

    async fn insert_bounce_case(&self, case: BounceCase) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bounce_cases (bounce_case_id, installment_id, loan_id, bounce_date, \
             reason, status, resolution_note, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*case.id.as_uuid())
        .bind(*case.installment_id.as_uuid())
        .bind(case.loan_id.as_str())
        .bind(case.bounce_date)
        .bind(&case.reason)
        .bind(case.status.as_str())
        .bind(&case.resolution_note)
        .bind(case.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn resolve_bounce_case(
        &self,
        id: BounceCaseId,
        note: &str,
    ) -> Result<BounceCase, StoreError> {
        let resolved = sqlx::query_as::<_, BounceCaseRow>(&format!(
            "UPDATE bounce_cases SET status = 'Resolved', resolution_note = $2 \
             WHERE bounce_case_id = $1 AND status = 'Open' \
             RETURNING {BOUNCE_CASE_COLUMNS}"
        ))
        .bind(*id.as_uuid())
        .bind(note)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        match resolved {
            Some(row) => Ok(BounceCase::try_from(row)?),
            None => {
                // no open row matched; distinguish missing from already resolved
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM bounce_cases WHERE bounce_case_id = $1)",
                )
                .bind(*id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::from)?;
                if exists {
                    Err(StoreError::conflict(format!(
                        "bounce case {id} is already resolved"
                    )))
                } else {
                    Err(DatabaseError::not_found("BounceCase", id).into())
                }
            }
        }
    }

    async fn collection_rows(&self) -> Result<Vec<CollectionRow>, StoreError> {
        let rows = sqlx::query_as::<_, CollectionRowDb>(
            "SELECT i.loan_id, l.branch, l.status AS loan_status, i.due_date, i.amount, \
             i.status, COALESCE(p.collected, 0) AS collected \
             FROM installments i \
             JOIN loans l ON l.loan_id = i.loan_id \
             LEFT JOIN ( \
                 SELECT installment_id, SUM(amount) AS collected \
                 FROM payments WHERE installment_id IS NOT NULL \
                 GROUP BY installment_id \
             ) p ON p.installment_id = i.installment_id \
             ORDER BY i.due_date, i.loan_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        collect_rows(rows)
    }
}
