//! Application configuration loaded from environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g. `0.0.0.0:3000`).
    pub server_addr: SocketAddr,
    /// Wallet API hostname.
    pub wallet_api_host: String,
    /// Wallet API port.
    pub wallet_api_port: u16,
    /// Client certificate material for the wallet API channel.
    pub mtls: MtlsConfig,
    /// Callback URL registered with the wallet API.
    pub callback_url: String,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let server_addr =
            std::env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let server_addr: SocketAddr = server_addr
            .parse()
            .map_err(|_| ConfigLoadError::InvalidServerAddr)?;

        let wallet_api_host =
            std::env::var("WALLET_API_HOST").unwrap_or_else(|_| "localhost".to_string());
        let wallet_api_port = parse_var("WALLET_API_PORT", 9257)?;

        let callback_url = std::env::var("WEBHOOK_CALLBACK_URL")
            .unwrap_or_else(|_| "http://localhost:3000/wallet_hook".to_string());
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server_addr,
            wallet_api_host,
            wallet_api_port,
            mtls: MtlsConfig::from_env(),
            callback_url,
            log_level,
        })
    }
}

/// Client certificate and key for the mutually-authenticated wallet API
/// channel: file paths or inline PEM.
#[derive(Debug, Clone, Default)]
pub struct MtlsConfig {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
}

impl MtlsConfig {
    fn from_env() -> Self {
        Self {
            cert_path: std::env::var("CLIENT_CERT_PATH").ok(),
            key_path: std::env::var("CLIENT_KEY_PATH").ok(),
            cert: std::env::var("CLIENT_CERT").ok(),
            key: std::env::var("CLIENT_KEY").ok(),
        }
    }

    /// Resolve certificate and key into one PEM buffer, preferring file paths
    /// over inline values. Missing material is a per-call error, not a crash.
    pub fn load_pem(&self) -> Result<Vec<u8>, ConfigLoadError> {
        let (cert, key) = match (&self.cert_path, &self.key_path, &self.cert, &self.key) {
            (Some(cert_path), Some(key_path), _, _) => {
                let cert = std::fs::read_to_string(cert_path).map_err(|source| {
                    ConfigLoadError::CertRead {
                        path: cert_path.clone(),
                        source,
                    }
                })?;
                let key = std::fs::read_to_string(key_path).map_err(|source| {
                    ConfigLoadError::CertRead {
                        path: key_path.clone(),
                        source,
                    }
                })?;
                (cert, key)
            }
            (_, _, Some(cert), Some(key)) => (cert.clone(), key.clone()),
            _ => return Err(ConfigLoadError::MissingMtlsMaterial),
        };
        Ok(format!("{}\n{}", cert, key).into_bytes())
    }
}

/// Configuration for the `hooklens-watch` client binary.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Event stream endpoint.
    pub events_url: String,
    /// Fixed delay before a reconnect attempt.
    pub reconnect_delay: Duration,
    /// Silence threshold after which the stream is treated as dead.
    pub heartbeat_timeout: Duration,
    /// Event persistence settings.
    pub store: StoreConfig,
    /// Session-active marker consulted by the auto-connect decision.
    pub session_path: PathBuf,
    pub log_level: String,
}

impl WatchConfig {
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let events_url = std::env::var("EVENTS_URL")
            .unwrap_or_else(|_| "http://localhost:3000/events".to_string());
        let reconnect_delay = Duration::from_millis(parse_var("RECONNECT_DELAY_MS", 3000)?);
        let heartbeat_timeout = Duration::from_millis(parse_var("HEARTBEAT_TIMEOUT_MS", 45_000)?);
        let store = StoreConfig::from_env()?;
        let session_path = store.path.with_extension("session");
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            events_url,
            reconnect_delay,
            heartbeat_timeout,
            store,
            session_path,
            log_level,
        })
    }
}

/// Event persistence settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Feature flag; storage must also probe writable to be used.
    pub enabled: bool,
    /// FIFO cap on the stored sequence.
    pub max_events: usize,
    /// Path of the JSON blob holding the event history.
    pub path: PathBuf,
}

impl StoreConfig {
    fn from_env() -> Result<Self, ConfigLoadError> {
        let enabled = std::env::var("EVENT_STORE_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let max_events = parse_var("MAX_EVENTS", 100)?;
        let path = std::env::var("EVENT_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("hooklens-events.json"));
        Ok(Self {
            enabled,
            max_events,
            path,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigLoadError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigLoadError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid SERVER_ADDR")]
    InvalidServerAddr,
    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),
    #[error("Either CLIENT_CERT_PATH/CLIENT_KEY_PATH or CLIENT_CERT/CLIENT_KEY must be set")]
    MissingMtlsMaterial,
    #[error("Failed to read certificate file {path}: {source}")]
    CertRead {
        path: String,
        source: std::io::Error,
    },
}
