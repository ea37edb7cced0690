use super::controller;
use crate::app::AppState;
use axum::Router;
use axum::routing::{get, post};

pub fn register_routes(state: AppState) -> Router {
    Router::new()
        .route("/refine", post(controller::refine))
        .route("/refine/:job_id", get(controller::get_job_status))
        .route("/health", get(controller::health))
        .with_state(state)
}
