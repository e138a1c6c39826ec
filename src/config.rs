use rocket::figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_PATH: &str = "/api";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub relay: RelayConfig,
    pub photo: PhotoConfig,
    pub limits: LimitsConfig,
    #[serde(default)]
    pub devices: Vec<DeviceCredentialConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Roots of the per-device directory trees holding uploaded files.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub qr_root: PathBuf,
    pub photo_root: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub ttl_hours: i64,
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    pub handshake_timeout_seconds: u64,
    pub location_history_limit: usize,
    pub pdf_history_limit: usize,
}

/// Bounds for re-encoding uploaded item photos.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PhotoConfig {
    pub max_bytes: usize,
    pub initial_quality: u8,
    pub min_quality: u8,
    pub quality_step: u8,
    pub max_dimension: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitsConfig {
    pub json_mib: u64,
    pub form_mib: u64,
}

/// One entry of the static device allow-list. Exactly one of `password_hash`
/// (an argon2 PHC string) or `password` must be set.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceCredentialConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            enable_swagger: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            qr_root: PathBuf::from("data/qr-pdfs"),
            photo_root: PathBuf::from("data/item-photos"),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            cleanup_interval_seconds: 300,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_seconds: 10,
            location_history_limit: 100,
            pdf_history_limit: 50,
        }
    }
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            initial_quality: 85,
            min_quality: 20,
            quality_step: 10,
            max_dimension: 2048,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { json_mib: 50, form_mib: 25 }
    }
}

impl RelayConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_seconds.max(1))
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours.max(1))
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Built-in defaults
    /// 2. Relay.toml (base configuration file)
    /// 3. Environment variables prefixed with RELAY_, `__` separating sections
    ///    (e.g. RELAY_RELAY__PDF_HISTORY_LIMIT=20)
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("Relay.toml"))
            .merge(Env::prefixed("RELAY_").split("__"))
    }
}
