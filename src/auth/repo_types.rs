use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User row as stored in the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String, // Argon2 PHC string, never sent to clients
    #[serde(default)]
    pub full_name: String,
}

/// Values for a row about to be inserted; the store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub full_name: String,
}
