//! API handlers for the circulation REST endpoints

pub mod fines;
pub mod health;
pub mod items;
pub mod loans;
pub mod members;
pub mod openapi;

use serde::Serialize;
use utoipa::ToSchema;

use crate::repository::paging;

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Records on this page
    pub items: Vec<T>,
    /// Total number of matching records
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Records per page
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: Option<i64>, per_page: Option<i64>) -> Self {
        let (page, per_page, _) = paging(page, per_page);
        Self {
            items,
            total,
            page,
            per_page,
        }
    }
}
