use refinement_relay::app::{AppState, build_router};
use refinement_relay::config::environment::AppConfig;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    init_logging();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "config error");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("{}:{}", config.api_host, config.api_port);
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, bind_addr = %bind_addr, "server bind error");
            std::process::exit(1);
        }
    };

    if config.refinement_endpoint.is_none() {
        warn!("REFINEMENT_ENDPOINT not set; refine requests will be rejected");
    }

    info!(
        env = %config.rust_env,
        host = %config.api_host,
        port = config.api_port,
        api_version = config.refinement_api_version.as_str(),
        refiner_id = config.refiner_id.as_deref().unwrap_or("-"),
        "refinement-relay started"
    );

    let state = match AppState::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "state init failed");
            std::process::exit(1);
        }
    };
    let app = build_router(state);
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server runtime error");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
