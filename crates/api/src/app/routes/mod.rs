use axum::Router;

pub mod lists;
pub mod rows;
pub mod system;

/// Router for all list and row endpoints.
pub fn router() -> Router {
    Router::new().merge(lists::router()).merge(rows::router())
}
