use crate::state::AppState;
use axum::Router;

pub mod dto;
pub(crate) mod extractors;
pub mod federated;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod reset;
pub(crate) mod services;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::routes())
}
