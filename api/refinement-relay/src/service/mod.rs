pub mod metrics_service;
pub mod upstream_service;
