use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    config::DatabaseConfig,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod rest;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Access to the `users` relation of the hosted database.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Inserts a row and returns it with its store-assigned id.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
}

/// Picks a backend from the URL scheme: Postgres connection strings get a
/// pool, anything else is treated as the REST table API.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Arc<dyn UserStore>> {
    if cfg.url.starts_with("postgres://") || cfg.url.starts_with("postgresql://") {
        info!("using postgres user store");
        let store = postgres::PgUserStore::connect(&cfg.url).await?;
        Ok(Arc::new(store))
    } else {
        info!(url = %cfg.url, "using rest user store");
        let store = rest::RestUserStore::new(&cfg.url, &cfg.key)?;
        Ok(Arc::new(store))
    }
}
