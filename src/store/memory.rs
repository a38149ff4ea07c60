use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{StoreError, UserStore};
use crate::auth::repo_types::{NewUser, User};

/// In-process stand-in for the hosted table, with the same unique-email
/// behavior as the Postgres schema.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            hashed_password: user.hashed_password,
            full_name: user.full_name,
        };
        rows.push(row.clone());
        Ok(row)
    }
}
