use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for user registration.
///
/// Absent keys deserialize as empty strings so validation can name them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub password: String,
    pub email: String,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned after login or registration.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Payload of the protected homepage.
#[derive(Debug, Serialize)]
pub struct HomepageResponse {
    pub id: Uuid,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub message: String,
}
