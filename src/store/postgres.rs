use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::warn;
use uuid::Uuid;

use super::{StoreError, UserStore};
use crate::auth::repo_types::{NewUser, User};

/// Direct connection to the database behind the hosted service.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            warn!(error = %e, "migration failed; continuing with existing schema");
        }

        Ok(Self { db })
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, hashed_password, full_name
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, hashed_password, full_name
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select user by id")?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, hashed_password, full_name)
            VALUES ($1, $2, $3)
            RETURNING id, email, hashed_password, full_name
            "#,
        )
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.full_name)
        .fetch_one(&self.db)
        .await
        .map_err(insert_error)
    }
}

fn insert_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        other => StoreError::Backend(anyhow::Error::new(other).context("insert user")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{error::Error as StdError, fmt};

    #[derive(Debug)]
    struct FakeDbError(ErrorKind);

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake database error {:?}", self.0)
        }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_email_key\""
        }
        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }
        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }
        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
        fn kind(&self) -> ErrorKind {
            match self.0 {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    #[test]
    fn unique_violation_becomes_duplicate_email() {
        let err = sqlx::Error::Database(Box::new(FakeDbError(ErrorKind::UniqueViolation)));
        assert!(matches!(insert_error(err), StoreError::DuplicateEmail));
    }

    #[test]
    fn other_failures_stay_backend_errors() {
        let err = sqlx::Error::Database(Box::new(FakeDbError(ErrorKind::Other)));
        assert!(matches!(insert_error(err), StoreError::Backend(_)));
        assert!(matches!(insert_error(sqlx::Error::PoolTimedOut), StoreError::Backend(_)));
    }
}
