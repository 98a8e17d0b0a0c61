pub mod chat;
pub mod page;
pub mod status;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// All routes of the chat service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(chat::index).post(chat::ask))
        .route("/health", get(status::health))
        .route("/info", get(status::info))
        .route("/warmup", get(status::warmup))
        .with_state(state)
}
