use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod errors;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::homepage_routes())
}
