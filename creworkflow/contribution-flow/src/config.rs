use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RefinerConfig {
    pub relay_url: String,
    pub refiner_id: Option<u64>,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub request_timeout: Duration,
}

impl RefinerConfig {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            refiner_id: None,
            poll_interval: Duration::from_millis(3_000),
            max_poll_attempts: 100,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_env() -> Result<Self, String> {
        load_dotenv_layers();
        let refiner_id = match env::var("REFINER_ID") {
            Ok(v) if !v.trim().is_empty() => Some(
                v.trim()
                    .parse::<u64>()
                    .map_err(|e| format!("invalid REFINER_ID: {e}"))?,
            ),
            _ => None,
        };
        Ok(Self {
            relay_url: read_var("REFINEMENT_RELAY_URL")?,
            refiner_id,
            poll_interval: Duration::from_millis(read_optional_u64(
                "REFINEMENT_POLL_INTERVAL_MS",
                3_000,
            )?),
            max_poll_attempts: read_optional_u32("REFINEMENT_MAX_POLL_ATTEMPTS", 100)?,
            request_timeout: Duration::from_secs(read_optional_u64(
                "REFINEMENT_REQUEST_TIMEOUT_SECONDS",
                30,
            )?),
        })
    }
}

fn read_var(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("missing required env var: {key}"))
}

fn read_optional_u64(key: &str, default: u64) -> Result<u64, String> {
    match env::var(key) {
        Ok(v) => v.parse::<u64>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_u32(key: &str, default: u32) -> Result<u32, String> {
    match env::var(key) {
        Ok(v) => v.parse::<u32>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn load_dotenv_layers() {
    for path in [".env", "../.env", "../../.env"] {
        let _ = dotenvy::from_path_override(path);
    }
}
