use std::net::IpAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "masld-intake";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-file ceiling for uploaded reports (10 MiB).
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Default request body cap, sized for a handful of full-size reports
/// plus multipart overhead.
pub const DEFAULT_MAX_BODY_BYTES: usize = 110 * 1024 * 1024;

pub const DEFAULT_PORT: u16 = 5050;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "masld_intake=info,tower_http=info"
}

/// Get the application data directory.
/// Platform local data dir joined with the app name, `./data` as fallback.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("data"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub storage_dir: PathBuf,
    /// Prefix for public object URLs, without trailing slash.
    pub public_base_url: String,
    /// Single CORS origin. `None` allows any origin.
    pub allowed_origin: Option<String>,
    pub max_body_bytes: usize,
}

impl IntakeConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("INTAKE_PORT").or_else(|| get("PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                var: "INTAKE_PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let bind_addr = match get("INTAKE_BIND_ADDR") {
            Some(raw) => raw.trim().parse::<IpAddr>().map_err(|_| ConfigError::InvalidValue {
                var: "INTAKE_BIND_ADDR",
                value: raw,
            })?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let max_body_bytes = match get("INTAKE_MAX_BODY_BYTES") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                var: "INTAKE_MAX_BODY_BYTES",
                value: raw,
            })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let data_dir = app_data_dir();
        let database_path = get("INTAKE_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("intake.db"));
        let storage_dir = get("INTAKE_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("objects"));

        let public_base_url = get("INTAKE_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}/files"))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bind_addr,
            port,
            database_path,
            storage_dir,
            public_base_url,
            allowed_origin: get("INTAKE_ALLOWED_ORIGIN"),
            max_body_bytes,
        })
    }
}
