//! Items registry

use sqlx::{Pool, Postgres};

use super::{paging, where_clause};
use crate::{
    error::{AppError, AppResult},
    models::item::{CreateItem, Item, ItemQuery, ItemStatus, UpdateItem},
};

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get item by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    /// Search items with pagination
    pub async fn search(&self, query: &ItemQuery) -> AppResult<(Vec<Item>, i64)> {
        let (_, per_page, offset) = paging(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref title) = query.title {
            params.push(format!("%{}%", title.to_lowercase()));
            conditions.push(format!("LOWER(title) LIKE ${}", params.len()));
        }
        if let Some(ref author) = query.author {
            params.push(format!("%{}%", author.to_lowercase()));
            conditions.push(format!("LOWER(author) LIKE ${}", params.len()));
        }
        if let Some(ref category) = query.category {
            params.push(category.clone());
            conditions.push(format!("category = ${}", params.len()));
        }
        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("status::text = ${}", params.len()));
        }

        let where_clause = where_clause(&conditions);

        let count_query = format!("SELECT COUNT(*) FROM items {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM items {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Item>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let items = select_builder.fetch_all(&self.pool).await?;

        Ok((items, total))
    }

    /// Items that can be borrowed right now
    pub async fn list_available(&self, page: Option<i64>, per_page: Option<i64>) -> AppResult<(Vec<Item>, i64)> {
        let (_, per_page, offset) = paging(page, per_page);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE status = 'available' AND available_copies > 0",
        )
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE status = 'available' AND available_copies > 0
            ORDER BY title, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((items, total))
    }

    /// Create a new item
    pub async fn create(
        &self,
        data: &CreateItem,
        total_copies: i32,
        available_copies: i32,
        status: ItemStatus,
    ) -> AppResult<Item> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (isbn, title, author, category, status, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&data.isbn)
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.category)
        .bind(status)
        .bind(total_copies)
        .bind(available_copies)
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }

    /// Update catalog fields. A new `total_copies` shifts availability by
    /// the same delta and re-derives the status unless an override is set.
    pub async fn update(&self, id: i32, data: &UpdateItem) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET
                isbn = COALESCE($2, isbn),
                title = COALESCE($3, title),
                author = COALESCE($4, author),
                category = COALESCE($5, category),
                available_copies = available_copies + (COALESCE($6, total_copies) - total_copies),
                total_copies = COALESCE($6, total_copies),
                status = CASE
                    WHEN status IN ('reserved', 'maintenance') THEN status
                    WHEN available_copies + (COALESCE($6, total_copies) - total_copies) = 0
                        THEN 'loaned'::item_status
                    ELSE 'available'::item_status
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.isbn)
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.category)
        .bind(data.total_copies)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    /// Apply an admin status. `available` is refused while no copy is free.
    pub async fn set_status(&self, id: i32, status: ItemStatus) -> AppResult<Item> {
        let updated = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET status = $2, updated_at = NOW()
            WHERE id = $1 AND ($2 <> 'available'::item_status OR available_copies > 0)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(item) => Ok(item),
            None => {
                self.get_by_id(id).await?;
                Err(AppError::Validation(
                    "Cannot set status to available when no copies are available".to_string(),
                ))
            }
        }
    }

    /// Number of loans ever recorded against the item, and how many are open
    pub async fn loan_counts(&self, id: i32) -> AppResult<(i64, i64)> {
        let (total, open): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status IN ('active', 'overdue'))
            FROM loans WHERE item_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok((total, open))
    }

    /// Delete an item record
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Item with id {} not found", id)));
        }
        Ok(())
    }
}
