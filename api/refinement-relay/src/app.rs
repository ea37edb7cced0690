use crate::config::environment::AppConfig;
use crate::module::refinement::route::register_routes;
use axum::Router;
use axum::http::{HeaderValue, Method};
use reqwest::Client;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub http: Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_seconds.max(1)))
            .build()
            .map_err(|e| format!("failed to build http client: {e}"))?;
        Ok(Self { config, http })
    }
}

pub fn build_router(state: AppState) -> Router {
    let origins = state
        .config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid cors origin");
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    register_routes(state).layer(cors)
}
