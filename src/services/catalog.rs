//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::item::{CreateItem, Item, ItemQuery, ItemStatus, UpdateItem},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search items with filters
    pub async fn search_items(&self, query: &ItemQuery) -> AppResult<(Vec<Item>, i64)> {
        self.repository.items.search(query).await
    }

    /// Items with a copy on the shelf and no admin hold
    pub async fn available_items(&self, page: Option<i64>, per_page: Option<i64>) -> AppResult<(Vec<Item>, i64)> {
        self.repository.items.list_available(page, per_page).await
    }

    pub async fn get_item(&self, id: i32) -> AppResult<Item> {
        self.repository.items.get_by_id(id).await
    }

    /// Create a new item
    pub async fn create_item(&self, data: CreateItem) -> AppResult<Item> {
        data.validate()?;
        let (total, available) = data.copies()?;
        let status = data.initial_status()?;

        let item = self.repository.items.create(&data, total, available, status).await?;
        tracing::info!(item_id = item.id, isbn = %item.isbn, "Item created");
        Ok(item)
    }

    /// Update catalog fields and the copy count
    pub async fn update_item(&self, id: i32, data: UpdateItem) -> AppResult<Item> {
        data.validate()?;
        check_update(&data, &self.repository.items.get_by_id(id).await?)?;
        self.repository.items.update(id, &data).await
    }

    /// Apply an admin status override
    pub async fn set_status(&self, id: i32, status: ItemStatus) -> AppResult<Item> {
        if status == ItemStatus::Loaned {
            return Err(AppError::Validation(
                "Status 'loaned' is derived from availability and cannot be set".to_string(),
            ));
        }
        let item = self.repository.items.set_status(id, status).await?;
        tracing::info!(item_id = id, %status, "Item status overridden");
        Ok(item)
    }

    /// Delete an item that has never been lent
    pub async fn delete_item(&self, id: i32) -> AppResult<()> {
        self.repository.items.get_by_id(id).await?;
        let (total, open) = self.repository.items.loan_counts(id).await?;
        if open > 0 {
            return Err(AppError::InvalidState(
                "Cannot delete item with open loans".to_string(),
            ));
        }
        if total > 0 {
            return Err(AppError::InvalidState(
                "Cannot delete item with loan history".to_string(),
            ));
        }
        self.repository.items.delete(id).await
    }
}

/// Reject edits that would write availability directly or strand loaned copies
fn check_update(data: &UpdateItem, current: &Item) -> AppResult<()> {
    if data.available_copies.is_some() {
        return Err(AppError::Validation(
            "Available copies are managed by the system".to_string(),
        ));
    }
    if let Some(total) = data.total_copies {
        let on_loan = current.total_copies - current.available_copies;
        if total < on_loan {
            return Err(AppError::Validation(format!(
                "total_copies cannot drop below the {} copies on loan",
                on_loan
            )));
        }
    }
    Ok(())
}
