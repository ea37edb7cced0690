use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementApiVersion {
    V1,
    V2,
}

impl RefinementApiVersion {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "V2" => Self::V2,
            _ => Self::V1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "V1",
            Self::V2 => "V2",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rust_env: String,
    pub api_host: String,
    pub api_port: u16,
    pub refinement_endpoint: Option<String>,
    pub refinement_api_version: RefinementApiVersion,
    pub refiner_id: Option<String>,
    pub pinata_api_key: Option<String>,
    pub pinata_api_secret: Option<String>,
    pub upstream_timeout_seconds: u64,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        load_dotenv_layers();
        Ok(Self {
            rust_env: read_var("RUST_ENV")?,
            api_host: read_var("API_HOST")?,
            api_port: read_var("API_PORT")?
                .parse::<u16>()
                .map_err(|e| format!("invalid API_PORT: {e}"))?,
            refinement_endpoint: read_non_empty("REFINEMENT_ENDPOINT"),
            refinement_api_version: RefinementApiVersion::parse(&read_optional_string(
                "REFINEMENT_API_VERSION",
                "V1",
            )),
            refiner_id: read_non_empty("REFINER_ID"),
            pinata_api_key: read_non_empty("PINATA_API_KEY"),
            pinata_api_secret: read_non_empty("PINATA_API_SECRET"),
            upstream_timeout_seconds: read_optional_u64("UPSTREAM_TIMEOUT_SECONDS", 30)?,
            cors_allowed_origins: read_optional_string(
                "CORS_ALLOWED_ORIGINS",
                "http://localhost:3000,http://127.0.0.1:3000",
            )
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        })
    }
}

fn read_var(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("missing required env var: {key}"))
}

fn read_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_optional_u64(key: &str, default: u64) -> Result<u64, String> {
    match env::var(key) {
        Ok(v) => v.parse::<u64>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn load_dotenv_layers() {
    for path in [".env", "../.env", "../../.env"] {
        let _ = dotenvy::from_path_override(path);
    }
}
