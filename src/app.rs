use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/progress", post(handlers::change_form))
        .route("/api/progress", get(handlers::get_progress).post(handlers::change))
        .route("/api/events", get(handlers::events))
        .with_state(state)
}
