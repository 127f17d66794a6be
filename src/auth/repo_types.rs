use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// User record in the `user_data` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,                  // assigned by the database
    pub email: String,             // unique
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,     // Argon2 PHC string, not exposed in JSON
}

/// Row to insert; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
}
