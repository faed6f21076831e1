pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::fitting::handlers as fitting;
use crate::generation::handlers as generation;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generation API
        .route("/api/v1/generate", post(generation::handle_generate))
        .route(
            "/api/v1/programs/generate",
            post(generation::handle_generate_program),
        )
        // Fitting API
        .route("/api/v1/fit/session", post(fitting::handle_fit_session))
        .route("/api/v1/fit/program", post(fitting::handle_fit_program))
        .with_state(state)
}
