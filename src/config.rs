//! Configuration management for mini-idp.
//!
//! Settings are read from an optional `config.yaml` in the working directory
//! and then overridden by `MINI_IDP_*` environment variables, using `__` to
//! address nested keys (e.g. `MINI_IDP_SERVER__PORT=9000`).

use jsonwebtoken::Algorithm;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "MINI_IDP";

/// Application configuration settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub key: KeySettings,
    pub telemetry: TelemetryConfig,
}

/// Listener settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the listener binds to.
    pub host: String,
    /// Port number the server will listen on.
    pub port: u16,
    /// Use `X-Forwarded-Host` as the request authority when present.
    /// Only enable this behind a proxy that sets the header itself.
    pub trust_forwarded_host: bool,
    /// How long in-flight requests get to finish after a shutdown signal.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trust_forwarded_host: false,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Where the signing key comes from and how it is identified.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    /// Key ID published in the JWK and stamped into every token header.
    pub kid: String,
    /// Signing algorithm. Must belong to the RSA family.
    pub algorithm: Algorithm,
    /// Path to the RSA private key (PKCS#1 or PKCS#8 PEM).
    pub private_key_path: Option<String>,
    /// Inline PEM, takes precedence over `private_key_path`.
    pub private_key_pem: Option<String>,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            kid: "123456".to_string(),
            algorithm: Algorithm::RS256,
            private_key_path: None,
            private_key_pem: None,
        }
    }
}

// Hand-written so the inline PEM never ends up in a log line.
impl std::fmt::Debug for KeySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySettings")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("private_key_path", &self.private_key_path)
            .field(
                "private_key_pem",
                &self.private_key_pem.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LoggingFormat {
    Json,
    Pretty,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Logging and trace export settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub level: LogLevel,
    /// Level for axum's own targets.
    pub axum_level: LogLevel,
    pub format: LoggingFormat,
    /// Export spans over OTLP/gRPC (endpoint from `OTEL_EXPORTER_OTLP_ENDPOINT`).
    pub otlp_enabled: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            axum_level: LogLevel::Info,
            format: LoggingFormat::Pretty,
            otlp_enabled: false,
            service_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Loads configuration from `config.yaml` (if present) and the environment.
///
/// # Errors
/// Returns an error if a source cannot be parsed or the merged values don't
/// match the `Settings` structure (for instance an unknown algorithm name).
pub fn load_config() -> Result<Settings, config::ConfigError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    cfg.try_deserialize::<Settings>()
}
