use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the intake service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub intake: IntakeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let intake = IntakeConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            intake,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

pub const DEFAULT_ATTACHMENT_MAX_MB: f64 = 5.0;
pub const DEFAULT_CAPTURE_JPEG_QUALITY: u8 = 92;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

/// Limits applied to document scans and selfies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntakeConfig {
    pub attachment_max_mb: f64,
    pub capture_jpeg_quality: u8,
    /// Idle time after which an unfinished session is evicted.
    pub session_ttl_secs: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            attachment_max_mb: DEFAULT_ATTACHMENT_MAX_MB,
            capture_jpeg_quality: DEFAULT_CAPTURE_JPEG_QUALITY,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl IntakeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let attachment_max_mb = match env::var("KYC_ATTACHMENT_MAX_MB") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value > 0.0)
                .ok_or(ConfigError::InvalidAttachmentLimit { value: raw })?,
            Err(_) => DEFAULT_ATTACHMENT_MAX_MB,
        };

        let capture_jpeg_quality = match env::var("KYC_CAPTURE_JPEG_QUALITY") {
            Ok(raw) => raw
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|value| (1..=100).contains(value))
                .ok_or(ConfigError::InvalidCaptureQuality { value: raw })?,
            Err(_) => DEFAULT_CAPTURE_JPEG_QUALITY,
        };

        let session_ttl_secs = match env::var("KYC_SESSION_TTL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidSessionTtl { value: raw })?,
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };

        Ok(Self {
            attachment_max_mb,
            capture_jpeg_quality,
            session_ttl_secs,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn attachment_max_bytes(&self) -> u64 {
        (self.attachment_max_mb * 1024.0 * 1024.0).floor() as u64
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidAttachmentLimit { value: String },
    InvalidCaptureQuality { value: String },
    InvalidSessionTtl { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidAttachmentLimit { value } => write!(
                f,
                "KYC_ATTACHMENT_MAX_MB must be a positive number of megabytes (found '{value}')"
            ),
            ConfigError::InvalidCaptureQuality { value } => write!(
                f,
                "KYC_CAPTURE_JPEG_QUALITY must be between 1 and 100 (found '{value}')"
            ),
            ConfigError::InvalidSessionTtl { value } => write!(
                f,
                "KYC_SESSION_TTL_SECS must be a positive number of seconds (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidAttachmentLimit { .. }
            | ConfigError::InvalidCaptureQuality { .. }
            | ConfigError::InvalidSessionTtl { .. } => None,
        }
    }
}
