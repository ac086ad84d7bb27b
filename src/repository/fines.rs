//! Fines read side. Fines are created and paid through the lending store.

use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use super::{paging, where_clause};
use crate::{
    error::{AppError, AppResult},
    models::fine::{Fine, FineQuery},
};

#[derive(Clone)]
pub struct FinesRepository {
    pool: Pool<Postgres>,
}

impl FinesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get fine by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    /// List fines, newest first
    pub async fn search(&self, query: &FineQuery) -> AppResult<(Vec<Fine>, i64)> {
        let (_, per_page, offset) = paging(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        match query.paid {
            Some(true) => conditions.push("paid_at IS NOT NULL".to_string()),
            Some(false) => conditions.push("paid_at IS NULL".to_string()),
            None => {}
        }
        if let Some(member_id) = query.member_id {
            params.push(member_id.to_string());
            conditions.push(format!("member_id = ${}::int4", params.len()));
        }

        let where_clause = where_clause(&conditions);

        let count_query = format!("SELECT COUNT(*) FROM fines {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM fines {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Fine>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let fines = select_builder.fetch_all(&self.pool).await?;

        Ok((fines, total))
    }

    /// Unpaid fines of one member, oldest first
    pub async fn unpaid_for_member(&self, member_id: i32) -> AppResult<Vec<Fine>> {
        let fines = sqlx::query_as::<_, Fine>(
            "SELECT * FROM fines WHERE member_id = $1 AND paid_at IS NULL ORDER BY created_at, id",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(fines)
    }

    /// Sum of every unpaid fine
    pub async fn total_unpaid(&self) -> AppResult<Decimal> {
        let total: Option<Decimal> =
            sqlx::query_scalar("SELECT SUM(amount) FROM fines WHERE paid_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(total.unwrap_or(Decimal::ZERO))
    }
}
