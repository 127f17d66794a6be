use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload used for authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,  // issuer
    pub sub: Uuid,    // user ID
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub iat: usize,   // issued at (unix timestamp)
    pub exp: usize,   // expires at (unix timestamp)
}
