//! Fine listing service. Payment lives in the lending service.

use rust_decimal::Decimal;

use crate::{
    error::AppResult,
    models::fine::{Fine, FineQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct FinesService {
    repository: Repository,
}

impl FinesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Filtered page of fines, its total count and the library-wide unpaid sum
    pub async fn search_fines(&self, query: &FineQuery) -> AppResult<(Vec<Fine>, i64, Decimal)> {
        let (fines, total) = self.repository.fines.search(query).await?;
        let total_unpaid = self.repository.fines.total_unpaid().await?;
        Ok((fines, total, total_unpaid))
    }

    pub async fn get_fine(&self, id: i32) -> AppResult<Fine> {
        self.repository.fines.get_by_id(id).await
    }
}
