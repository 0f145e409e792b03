//! Business logic services

pub mod catalog;
pub mod loans;
pub mod users;

use crate::{
    config::{LoansConfig, UsersConfig},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub users: users::UsersService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, users_config: UsersConfig, loans_config: &LoansConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), loans_config),
            users: users::UsersService::new(repository.clone(), users_config),
            repository,
        }
    }
}
