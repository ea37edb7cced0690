use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound body of `POST /refine`. Fields stay loosely typed so that
/// numeric and string file ids are both forwarded as received.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RefineRequest {
    #[serde(default)]
    pub file_id: Option<Value>,
    #[serde(default)]
    pub encryption_key: Option<Value>,
    #[serde(default)]
    pub refiner_id: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRefinePayload {
    pub file_id: Value,
    pub encryption_key: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refiner_id: Option<Value>,
    pub env_vars: UpstreamEnvVars,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpstreamEnvVars {
    #[serde(rename = "PINATA_API_KEY", skip_serializing_if = "Option::is_none")]
    pub pinata_api_key: Option<String>,
    #[serde(rename = "PINATA_API_SECRET", skip_serializing_if = "Option::is_none")]
    pub pinata_api_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetricsView {
    pub refine_requests_relayed: u64,
    pub refine_requests_rejected: u64,
    pub status_polls_relayed: u64,
    pub upstream_failures: u64,
    pub last_error_ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub endpoint_configured: bool,
    pub api_version: String,
    pub metrics: HealthMetricsView,
    pub reason: String,
}
