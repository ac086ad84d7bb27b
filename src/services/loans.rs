//! Loan listings. Borrow and return live in the lending service.

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Filtered page of loans, newest first
    pub async fn search(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)> {
        self.repository.loans.search(query).await
    }
}
