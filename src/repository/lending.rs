//! PostgreSQL implementation of the lending unit of work

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::store::{LendingStore, LendingTx};
use crate::{
    error::{AppError, AppResult},
    models::{Fine, Item, ItemStatus, Loan, Member, MemberStatus, NewFine, NewLoan},
};

#[derive(Clone)]
pub struct PgLendingStore {
    pool: Pool<Postgres>,
}

impl PgLendingStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LendingStore for PgLendingStore {
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLendingTx { tx }))
    }

    async fn loan(&self, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    async fn member_loans(&self, member_id: i32) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE member_id = $1 ORDER BY borrowed_at DESC, id DESC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn overdue_loans(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE status = 'overdue' ORDER BY due_date ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn active_loans_due_before(&self, now: DateTime<Utc>) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM loans WHERE status = 'active' AND due_date < $1 ORDER BY due_date, id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

/// One sqlx transaction. Row locks are taken with `FOR UPDATE`, so under
/// READ COMMITTED every locking read observes the latest committed row.
pub struct PgLendingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LendingTx for PgLendingTx {
    async fn lock_item(&mut self, id: i32) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(item)
    }

    async fn lock_member(&mut self, id: i32) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(member)
    }

    async fn lock_loan(&mut self, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn lock_fine(&mut self, id: i32) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(fine)
    }

    async fn count_open_loans(&mut self, member_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND status IN ('active', 'overdue')",
        )
        .bind(member_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn count_overdue_loans(&mut self, member_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND status = 'overdue'",
        )
        .bind(member_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn count_unpaid_fines(&mut self, member_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fines WHERE member_id = $1 AND paid_at IS NULL",
        )
        .bind(member_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (item_id, member_id, borrowed_at, due_date, status)
            VALUES ($1, $2, $3, $4, 'active')
            RETURNING *
            "#,
        )
        .bind(loan.item_id)
        .bind(loan.member_id)
        .bind(loan.borrowed_at)
        .bind(loan.due_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(created)
    }

    async fn set_item_availability(
        &mut self,
        item_id: i32,
        available_copies: i32,
        status: ItemStatus,
    ) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET available_copies = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(available_copies)
        .bind(status)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", item_id)))
    }

    async fn close_loan(&mut self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            "UPDATE loans SET returned_at = $2, status = 'returned' WHERE id = $1 RETURNING *",
        )
        .bind(loan_id)
        .bind(returned_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    async fn mark_loan_overdue(&mut self, loan_id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            "UPDATE loans SET status = 'overdue' WHERE id = $1 RETURNING *",
        )
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        let created = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (loan_id, member_id, amount, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(fine.loan_id)
        .bind(fine.member_id)
        .bind(fine.amount)
        .bind(fine.created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(created)
    }

    async fn mark_fine_paid(&mut self, fine_id: i32, paid_at: DateTime<Utc>) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>("UPDATE fines SET paid_at = $2 WHERE id = $1 RETURNING *")
            .bind(fine_id)
            .bind(paid_at)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", fine_id)))
    }

    async fn set_member_status(&mut self, member_id: i32, status: MemberStatus) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            "UPDATE members SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(member_id)
        .bind(status)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member_id)))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
