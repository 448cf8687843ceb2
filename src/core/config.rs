/// Server configuration from environment variables.
///
/// Every setting has a default so the server starts with no environment at
/// all. Values that are present but unparseable are rejected instead of being
/// silently replaced by the default.
///
/// Environment Variables:
/// - SERVER_NAME: reported in `initialize` and `/health` (default: "mcp-oauth-demo")
/// - SERVER_VERSION: reported in `initialize` (default: crate version)
/// - MCP_TRANSPORT_MODE: "http", "stdio" or "both" (default: "http")
/// - HOST: bind address for HTTP mode (default: "0.0.0.0")
/// - PORT: port for HTTP mode (default: 8080)
/// - WORKER_THREADS: actix worker count (default: CPU count, capped at 16)
/// - HANDLER_TIMEOUT_MS: upper bound on a single tool call (default: 30000)
/// - SESSION_IDLE_TTL_SECS: idle time after which a session is evicted (default: 1800)
/// - SURFACE_IDENTITY: include the caller identity in `get_user_info` (default: false)

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SERVER_NAME: &str = "mcp-oauth-demo";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 30 * 60;
const MAX_DEFAULT_WORKERS: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Http,
    Stdio,
    Both,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "stdio" => Ok(Self::Stdio),
            "both" => Ok(Self::Both),
            _ => Err("must be 'stdio', 'http', or 'both'".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub server_name: String,
    pub server_version: String,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub handler_timeout: Duration,
    pub session_idle_ttl: Duration,
    pub surface_identity: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let workers = positive(
            "WORKER_THREADS",
            parse(&lookup, "WORKER_THREADS")?
                .unwrap_or_else(|| num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS)),
        )?;
        let timeout_ms = positive(
            "HANDLER_TIMEOUT_MS",
            parse(&lookup, "HANDLER_TIMEOUT_MS")?.unwrap_or(DEFAULT_HANDLER_TIMEOUT_MS),
        )?;
        let idle_ttl_secs = positive(
            "SESSION_IDLE_TTL_SECS",
            parse(&lookup, "SESSION_IDLE_TTL_SECS")?.unwrap_or(DEFAULT_SESSION_IDLE_TTL_SECS),
        )?;

        Ok(Self {
            server_name: text("SERVER_NAME", DEFAULT_SERVER_NAME),
            server_version: text("SERVER_VERSION", env!("CARGO_PKG_VERSION")),
            transport: parse(&lookup, "MCP_TRANSPORT_MODE")?.unwrap_or(TransportMode::Http),
            host: text("HOST", DEFAULT_HOST),
            port: parse(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT),
            workers,
            handler_timeout: Duration::from_millis(timeout_ms),
            session_idle_ttl: Duration::from_secs(idle_ttl_secs),
            surface_identity: parse_flag(&lookup, "SURFACE_IDENTITY")?.unwrap_or(false),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

/// Reject zero for settings that must be at least 1.
fn positive<T>(key: &'static str, value: T) -> Result<T, ConfigError>
where
    T: Default + PartialEq + ToString,
{
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".to_string(),
            }),
        })
        .transpose()
}
