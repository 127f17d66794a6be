use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{HomepageResponse, LoginRequest, RegisterRequest, TokenResponse},
        errors::AuthError,
        extractors::AuthUser,
        service::{AuthService, Issued, Outcome},
    },
    state::AppState,
};

// OPTIONS on these paths is answered by the CORS layer in `app`.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/user", post(create_user))
}

pub fn homepage_routes() -> Router<AppState> {
    Router::new().route("/homepage", get(homepage))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload.map(|Json(p)| p).map_err(|e| {
        warn!(error = %e, "unable to decode body");
        AuthError::InvalidBody(e.body_text())
    })
}

fn token_reply(issued: Issued) -> (StatusCode, Json<TokenResponse>) {
    let status = match issued.outcome {
        Outcome::Created => StatusCode::CREATED,
        Outcome::Ok => StatusCode::OK,
    };
    (status, Json(TokenResponse { token: issued.token }))
}

#[instrument(skip(auth, payload))]
pub async fn create_user(
    State(auth): State<AuthService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
    let req = body(payload)?;
    let issued = auth.register(req).await?;
    Ok(token_reply(issued))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
    let req = body(payload)?;
    let issued = auth.login(req).await?;
    Ok(token_reply(issued))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn homepage(AuthUser(claims): AuthUser) -> Json<HomepageResponse> {
    Json(HomepageResponse {
        id: claims.sub,
        message: format!("Welcome back, {}", claims.display_name),
        display_name: claims.display_name,
    })
}
