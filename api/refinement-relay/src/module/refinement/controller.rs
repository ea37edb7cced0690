use super::error::AppError;
use super::schema::{
    ErrorResponse, HealthMetricsView, HealthResponse, RefineRequest, UpstreamEnvVars,
    UpstreamRefinePayload,
};
use crate::app::AppState;
use crate::config::environment::RefinementApiVersion;
use crate::service::metrics_service;
use crate::service::upstream_service::{self, UpstreamReply};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;
use tracing::{error, info};

pub async fn refine(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let Some(endpoint) = state.config.refinement_endpoint.as_deref() else {
        return error_reply(AppError::endpoint_not_configured());
    };

    let req: RefineRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return masked_error_reply(
                AppError::internal("REFINE_BODY_INVALID", format!("invalid json body: {e}")),
                "Failed to process refinement request",
            );
        }
    };

    let payload = match build_payload(&state, req) {
        Ok(p) => p,
        Err(err) => {
            metrics_service::inc_refine_rejected();
            return error_reply(err);
        }
    };

    let version = state.config.refinement_api_version;
    match upstream_service::post_refine(&state.http, endpoint, version, &payload).await {
        Ok(UpstreamReply { status, body }) => {
            metrics_service::inc_refine_relayed();
            info!(
                upstream_status = status,
                api_version = version.as_str(),
                "refinement request relayed"
            );
            let body = match version {
                RefinementApiVersion::V2 => upstream_service::annotate_v2(body),
                RefinementApiVersion::V1 => body,
            };
            (passthrough_status(status), Json(body))
        }
        Err(message) => {
            metrics_service::inc_upstream_failures();
            masked_error_reply(
                AppError::internal("REFINE_UPSTREAM_FAILED", message),
                "Failed to process refinement request",
            )
        }
    }
}

pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let Some(endpoint) = state.config.refinement_endpoint.as_deref() else {
        return error_reply(AppError::endpoint_not_configured());
    };
    if job_id.trim().is_empty() {
        return error_reply(AppError::bad_request("JOB_ID_REQUIRED", "Job ID is required"));
    }

    match upstream_service::get_job_status(&state.http, endpoint, &job_id).await {
        Ok(UpstreamReply { status, body }) => {
            metrics_service::inc_status_polls();
            info!(job_id = %job_id, upstream_status = status, "refinement job status relayed");
            (passthrough_status(status), Json(body))
        }
        Err(message) => {
            metrics_service::inc_upstream_failures();
            masked_error_reply(
                AppError::internal("JOB_STATUS_UPSTREAM_FAILED", message),
                "Failed to check job status",
            )
        }
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let m = metrics_service::snapshot();
    let endpoint_configured = state.config.refinement_endpoint.is_some();
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: endpoint_configured,
            endpoint_configured,
            api_version: state.config.refinement_api_version.as_str().to_string(),
            metrics: HealthMetricsView {
                refine_requests_relayed: m.refine_requests_relayed,
                refine_requests_rejected: m.refine_requests_rejected,
                status_polls_relayed: m.status_polls_relayed,
                upstream_failures: m.upstream_failures,
                last_error_ts: m.last_error_ts,
            },
            reason: if endpoint_configured {
                "healthy".to_string()
            } else {
                "refinement endpoint not configured".to_string()
            },
        }),
    )
}

fn build_payload(state: &AppState, req: RefineRequest) -> Result<UpstreamRefinePayload, AppError> {
    let missing = || {
        AppError::bad_request(
            "MISSING_PARAMETERS",
            "Missing required parameters: file_id or encryption_key",
        )
    };
    let file_id = req.file_id.filter(is_truthy).ok_or_else(missing)?;
    let encryption_key = req.encryption_key.filter(is_truthy).ok_or_else(missing)?;

    let refiner_id = match state.config.refiner_id.as_deref() {
        Some(configured) => Some(refiner_id_value(configured)),
        None => req.refiner_id.filter(|v| !v.is_null()),
    };

    Ok(UpstreamRefinePayload {
        file_id,
        encryption_key,
        refiner_id,
        env_vars: UpstreamEnvVars {
            pinata_api_key: state.config.pinata_api_key.clone(),
            pinata_api_secret: state.config.pinata_api_secret.clone(),
        },
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Refiner ids are numeric on chain; forward configured values as numbers when they parse.
fn refiner_id_value(configured: &str) -> Value {
    configured
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(configured))
}

fn passthrough_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

type Reply = (StatusCode, Json<Value>);

fn error_reply(err: AppError) -> Reply {
    error!(error_code = err.code, reason = %err.message, "refinement relay rejected request");
    (err.status, Json(error_body(&err.message)))
}

/// Logs the internal reason but answers with a fixed client-facing message.
fn masked_error_reply(err: AppError, public_message: &str) -> Reply {
    error!(error_code = err.code, reason = %err.message, "refinement relay failed");
    (err.status, Json(error_body(public_message)))
}

fn error_body(message: &str) -> Value {
    serde_json::to_value(ErrorResponse {
        error: message.to_string(),
    })
    .unwrap_or(Value::Null)
}
