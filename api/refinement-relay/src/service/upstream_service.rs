use crate::config::environment::RefinementApiVersion;
use crate::module::refinement::schema::UpstreamRefinePayload;
use reqwest::{Client, Url};
use serde_json::{Value, json};

pub const ACCEPT_VERSION_HEADER: &str = "Vana-Accept-Version";

#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Value,
}

pub async fn post_refine(
    http: &Client,
    endpoint: &str,
    version: RefinementApiVersion,
    payload: &UpstreamRefinePayload,
) -> Result<UpstreamReply, String> {
    let url = refine_url(endpoint, None)?;
    let mut request = http
        .post(url)
        .header("content-type", "application/json")
        .json(payload);
    if version == RefinementApiVersion::V2 {
        request = request.header(ACCEPT_VERSION_HEADER, "v2");
    }

    let response = request
        .send()
        .await
        .map_err(|e| format!("refinement request failed: {e}"))?;
    let status = response.status().as_u16();
    let body = response
        .json::<Value>()
        .await
        .map_err(|e| format!("failed to decode refinement response: {e}"))?;
    Ok(UpstreamReply { status, body })
}

pub async fn get_job_status(
    http: &Client,
    endpoint: &str,
    job_id: &str,
) -> Result<UpstreamReply, String> {
    let url = refine_url(endpoint, Some(job_id))?;
    let response = http
        .get(url)
        .header("content-type", "application/json")
        .send()
        .await
        .map_err(|e| format!("job status request failed: {e}"))?;
    let status = response.status().as_u16();
    let body = response
        .json::<Value>()
        .await
        .map_err(|e| format!("failed to decode job status response: {e}"))?;
    Ok(UpstreamReply { status, body })
}

/// Tags a V2 response so callers know the job runs asynchronously.
pub fn annotate_v2(body: Value) -> Value {
    let mut object = match body {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    object.insert("api_version".to_string(), json!("V2"));
    object.insert("requires_polling".to_string(), json!(true));
    Value::Object(object)
}

fn refine_url(endpoint: &str, job_id: Option<&str>) -> Result<Url, String> {
    let mut url =
        Url::parse(endpoint).map_err(|e| format!("invalid refinement endpoint: {e}"))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| "refinement endpoint cannot be a base url".to_string())?;
        segments.pop_if_empty().push("refine");
        if let Some(job_id) = job_id {
            segments.push(job_id);
        }
    }
    Ok(url)
}
