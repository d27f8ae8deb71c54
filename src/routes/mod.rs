pub mod authors;
pub mod comments;
pub mod home;
pub mod libraries;
pub mod poems;
pub mod users;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(home::router())
        .merge(authors::router())
        .merge(comments::router())
        .merge(libraries::router())
        .merge(poems::router())
        .merge(users::router())
}

async fn health() -> &'static str {
    "ok"
}
