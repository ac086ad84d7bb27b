//! Item (lendable catalog entry) model and related types.
//!
//! An item carries a pool of physical copies. `available_copies` is only
//! ever moved by the lending state machine; catalog edits may change
//! `total_copies`, which shifts availability by the same delta.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Item circulation status.
///
/// `Loaned` is derived from availability. `Reserved` and `Maintenance`
/// are explicit admin overrides that the borrow path never sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "item_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Available,
    Loaned,
    Reserved,
    Maintenance,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Loaned => "loaned",
            ItemStatus::Reserved => "reserved",
            ItemStatus::Maintenance => "maintenance",
        }
    }

    /// Admin-set states the availability rule must not overwrite
    pub fn is_override(&self) -> bool {
        matches!(self, ItemStatus::Reserved | ItemStatus::Maintenance)
    }
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Available
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: i32,
    /// ISBN-10 or ISBN-13, unique across the catalog
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub status: ItemStatus,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Status implied by an availability count, honouring admin overrides
    pub fn derived_status(&self, available_copies: i32) -> ItemStatus {
        if self.status.is_override() {
            self.status
        } else if available_copies == 0 {
            ItemStatus::Loaned
        } else {
            ItemStatus::Available
        }
    }
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 to 13 characters"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    /// Defaults to 1
    #[validate(range(min = 1, message = "total_copies must be at least 1"))]
    pub total_copies: Option<i32>,
    /// Defaults to `total_copies`
    #[validate(range(min = 0, message = "available_copies cannot be negative"))]
    pub available_copies: Option<i32>,
}

impl CreateItem {
    /// Resolve `(total_copies, available_copies)` for a new record
    pub fn copies(&self) -> AppResult<(i32, i32)> {
        let total = self.total_copies.unwrap_or(1);
        let available = self.available_copies.unwrap_or(total);
        if total < 1 {
            return Err(AppError::Validation(
                "total_copies must be at least 1".to_string(),
            ));
        }
        if available < 0 || available > total {
            return Err(AppError::Validation(
                "available_copies must be between 0 and total_copies".to_string(),
            ));
        }
        Ok((total, available))
    }

    /// Initial status for a new record
    pub fn initial_status(&self) -> AppResult<ItemStatus> {
        let (_, available) = self.copies()?;
        Ok(if available == 0 {
            ItemStatus::Loaned
        } else {
            ItemStatus::Available
        })
    }
}

/// Update item request. `available_copies` is managed by the lending
/// state machine and is rejected if present.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateItem {
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 to 13 characters"))]
    pub isbn: Option<String>,
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: Option<String>,
    #[validate(range(min = 1, message = "total_copies must be at least 1"))]
    pub total_copies: Option<i32>,
    pub available_copies: Option<i32>,
}

/// Admin status override request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateItemStatus {
    pub status: ItemStatus,
}

/// Item query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ItemQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub status: Option<ItemStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
