use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::auth::{claims::Claims, repo_types::User};
use crate::config::{JwtConfig, MAX_TTL_MINUTES};

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Authorization header must carry a Bearer token")]
    MissingPrefix,
    #[error("Token signature is invalid")]
    SignatureInvalid,
    #[error("Token has expired")]
    Expired,
    #[error("Token is malformed")]
    Malformed,
    #[error("Unable to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Issues and checks identity tokens.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user: &User) -> Result<String, TokenError>;

    /// `presented` is the raw `Authorization` value, scheme prefix included.
    fn verify(&self, presented: &str) -> Result<Claims, TokenError>;
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        let JwtConfig {
            secret,
            issuer,
            ttl_minutes,
        } = config;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.clone(),
            ttl: Duration::from_secs((*ttl_minutes).clamp(0, MAX_TTL_MINUTES).unsigned_abs() * 60),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        // expiry is exact: no grace window past `exp`
        validation.leeway = 0;
        validation
    }
}

fn strip_scheme(presented: &str) -> Option<&str> {
    presented
        .strip_prefix("Bearer ")
        .or_else(|| presented.strip_prefix("bearer "))
}

impl TokenIssuer for JwtKeys {
    fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user.id,
            display_name: user.display_name.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(user_id = %user.id, "jwt signed");
        Ok(token)
    }

    fn verify(&self, presented: &str) -> Result<Claims, TokenError> {
        let token = strip_scheme(presented).ok_or(TokenError::MissingPrefix)?;
        let data = decode::<Claims>(token.trim(), &self.decoding, &self.validation())?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) fn test_keys() -> JwtKeys {
    JwtKeys::new(&JwtConfig {
        secret: "dev-secret".into(),
        issuer: "test-issuer".into(),
        ttl_minutes: 60,
    })
}
