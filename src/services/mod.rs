//! Business logic services

pub mod catalog;
pub mod eligibility;
pub mod fines;
pub mod lending;
pub mod loans;
pub mod members;
pub mod overdue;
pub mod suspension;

use std::sync::Arc;

use crate::{clock::Clock, config::LendingConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub fines: fines::FinesService,
    pub lending: lending::LendingService,
    pub loans: loans::LoansService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, lending_config: LendingConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        lending_config.validate()?;
        let store = Arc::new(repository.lending.clone());

        Ok(Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            fines: fines::FinesService::new(repository.clone()),
            lending: lending::LendingService::new(store, lending_config, clock),
            loans: loans::LoansService::new(repository.clone()),
            repository,
        })
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
