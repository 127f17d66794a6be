//! Registration and login orchestration over the store, hasher and issuer.

use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use crate::auth::{
    dto::{LoginRequest, RegisterRequest},
    errors::AuthError,
    jwt::TokenIssuer,
    password::CredentialHasher,
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User},
};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Ok,
}

#[derive(Debug)]
pub struct Issued {
    pub token: String,
    pub outcome: Outcome,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
    deadline: Duration,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.hasher.clone(),
            state.tokens.clone(),
            Duration::from_secs(state.config.server.request_timeout_secs),
        )
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Names every empty field, in the order displayName, password, email.
pub(crate) fn validate_registration(
    display_name: &str,
    password: &str,
    email: &str,
) -> Result<(), AuthError> {
    let missing: Vec<&'static str> = [
        ("displayName", display_name),
        ("password", password),
        ("email", email),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::MissingFields(missing))
    }
}

pub(crate) fn validate_login(email: &str, password: &str) -> Result<(), AuthError> {
    match (email.is_empty(), password.is_empty()) {
        (true, true) => Err(AuthError::EmailAndPasswordMissing),
        (true, false) => Err(AuthError::EmailMissing),
        (false, true) => Err(AuthError::PasswordMissing),
        (false, false) => Ok(()),
    }
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            deadline,
        }
    }

    #[instrument(skip(self, req))]
    pub async fn register(&self, req: RegisterRequest) -> Result<Issued, AuthError> {
        let email = normalize_email(&req.email);
        validate_registration(&req.display_name, &req.password, &email)?;

        let password_hash = self.hasher.hash(&req.password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            AuthError::Internal("Unable to hash password")
        })?;

        let new_user = NewUser {
            email: email.clone(),
            display_name: req.display_name,
            password_hash,
        };
        let created = timeout(self.deadline, self.store.create_user(new_user))
            .await
            .map_err(|_| {
                error!(email = %email, "create user timed out");
                AuthError::Internal("Error creating the user")
            })?;
        let user = match created {
            Ok(u) => u,
            Err(StoreError::AlreadyExists) => {
                warn!(email = %email, "email already registered");
                return Err(AuthError::EmailTaken(email));
            }
            Err(e) => {
                error!(error = %e, "create user failed");
                return Err(AuthError::Internal("Error creating the user"));
            }
        };

        let token = self.issue(&user)?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(Issued {
            token,
            outcome: Outcome::Created,
        })
    }

    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> Result<Issued, AuthError> {
        let email = normalize_email(&req.email);
        validate_login(&email, &req.password)?;

        let found = timeout(self.deadline, self.store.get_user_by_email(&email))
            .await
            .map_err(|_| {
                error!(email = %email, "user lookup timed out");
                AuthError::Internal("Error checking user credentials")
            })?;
        let user = match found {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                // same hashing work as a known account
                let _ = self.hasher.verify(self.hasher.dummy_hash(), &req.password);
                warn!(email = %email, "login unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!(error = %e, "get_user_by_email failed");
                return Err(AuthError::Internal("Error checking user credentials"));
            }
        };

        let ok = self
            .hasher
            .verify(&user.password_hash, &req.password)
            .map_err(|e| {
                error!(error = %e, user_id = %user.id, "verify_password failed");
                AuthError::Internal("Error checking user credentials")
            })?;
        if !ok {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue(&user)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(Issued {
            token,
            outcome: Outcome::Ok,
        })
    }

    fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.tokens.issue(user).map_err(|e| {
            error!(error = %e, user_id = %user.id, "jwt sign failed");
            AuthError::Internal("Unable to create JSON token")
        })
    }
}
