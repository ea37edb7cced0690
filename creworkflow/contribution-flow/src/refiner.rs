use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info};

use crate::collaborators::Refiner;
use crate::config::RefinerConfig;
use crate::models::{RefineOutcome, RefineRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
enum JobState {
    Pending,
    Done,
    Failed(String),
}

/// Talks to the refinement relay and waits out asynchronous (V2) jobs.
#[derive(Debug, Clone)]
pub struct HttpRefiner {
    http: Client,
    config: RefinerConfig,
}

impl HttpRefiner {
    pub fn new(config: RefinerConfig) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| format!("failed to build http client: {e}"))?;
        Ok(Self { http, config })
    }

    async fn poll_job(&self, job_id: &str) -> Result<Value, String> {
        let url = relay_url(&self.config.relay_url, &["refine", job_id])?;
        let attempts = self.config.max_poll_attempts.max(1);

        for attempt in 1..=attempts {
            tokio::time::sleep(self.config.poll_interval).await;

            let (status, body) = read_json(self.http.get(url.clone()).send().await)
                .await
                .map_err(|e| format!("refinement job status check failed: {e}"))?;
            if !(200..300).contains(&status) {
                return Err(format!(
                    "refinement job status check failed with status {status}: {body}"
                ));
            }

            match job_state(&body) {
                JobState::Done => return Ok(body),
                JobState::Failed(reason) => {
                    return Err(format!("refinement job {job_id} failed: {reason}"));
                }
                JobState::Pending => {
                    debug!(job_id = %job_id, attempt, "refinement job still running");
                }
            }
        }

        Err(format!(
            "refinement job {job_id} did not finish after {attempts} status checks"
        ))
    }
}

#[async_trait]
impl Refiner for HttpRefiner {
    async fn refine(&self, mut request: RefineRequest) -> Result<RefineOutcome, String> {
        if request.refiner_id.is_none() {
            request.refiner_id = self.config.refiner_id;
        }
        let url = relay_url(&self.config.relay_url, &["refine"])?;

        let (status, body) = read_json(self.http.post(url).json(&request).send().await)
            .await
            .map_err(|e| format!("refinement request failed: {e}"))?;
        if !(200..300).contains(&status) {
            return Err(format!("refinement failed with status {status}: {body}"));
        }

        let job_id = body
            .get("job_id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        let requires_polling = body
            .get("requires_polling")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !requires_polling {
            return Ok(RefineOutcome {
                body,
                job_id,
                polled: false,
            });
        }

        let job_id =
            job_id.ok_or_else(|| "refinement response requires polling but has no job_id".to_string())?;
        info!(job_id = %job_id, "refinement job accepted; polling for completion");
        let body = self.poll_job(&job_id).await?;
        Ok(RefineOutcome {
            body,
            job_id: Some(job_id),
            polled: true,
        })
    }
}

async fn read_json(
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<(u16, Value), String> {
    let response = response.map_err(|e| e.to_string())?;
    let status = response.status().as_u16();
    let text = response.text().await.map_err(|e| e.to_string())?;
    if text.trim().is_empty() {
        return Ok((status, Value::Null));
    }
    let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
    Ok((status, body))
}

fn job_state(body: &Value) -> JobState {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_ascii_lowercase();
    match status.as_str() {
        "completed" | "complete" | "success" | "succeeded" => JobState::Done,
        "failed" | "error" | "cancelled" | "canceled" => JobState::Failed(
            body.get("error")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or(status),
        ),
        _ => JobState::Pending,
    }
}

fn relay_url(base: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = Url::parse(base).map_err(|e| format!("invalid refinement relay url: {e}"))?;
    url.path_segments_mut()
        .map_err(|_| "refinement relay url cannot be a base url".to_string())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
