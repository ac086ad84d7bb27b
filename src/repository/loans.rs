//! Loans read side: filtered listings for the API layer.
//! Mutations go through [`super::PgLendingStore`] only.

use sqlx::{Pool, Postgres};

use super::{paging, where_clause};
use crate::{
    error::AppResult,
    models::loan::{Loan, LoanQuery},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List loans, newest first
    pub async fn search(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)> {
        let (_, per_page, offset) = paging(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("status::text = ${}", params.len()));
        }
        if let Some(member_id) = query.member_id {
            params.push(member_id.to_string());
            conditions.push(format!("member_id = ${}::int4", params.len()));
        }
        if let Some(item_id) = query.item_id {
            params.push(item_id.to_string());
            conditions.push(format!("item_id = ${}::int4", params.len()));
        }

        let where_clause = where_clause(&conditions);

        let count_query = format!("SELECT COUNT(*) FROM loans {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM loans {} ORDER BY borrowed_at DESC, id DESC LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Loan>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let loans = select_builder.fetch_all(&self.pool).await?;

        Ok((loans, total))
    }
}
