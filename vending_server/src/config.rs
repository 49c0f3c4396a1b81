use std::env;

use chrono::Duration;
use log::*;
use vending_engine::SessionConfig;

const DEFAULT_VMS_HOST: &str = "127.0.0.1";
const DEFAULT_VMS_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/vending.db";
const DEFAULT_SESSION_TTL: Duration = Duration::minutes(5);
const DEFAULT_SESSION_RETENTION: Duration = Duration::minutes(10);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::seconds(60);
const DEFAULT_EVENT_BUFFER: usize = 64;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The size of the connection pool.
    pub max_connections: u32,
    /// How long a payment session stays valid after it was opened.
    pub session_ttl: Duration,
    /// How long finished sessions are kept in memory before the sweep drops them.
    pub session_retention: Duration,
    /// How often the expiry worker runs.
    pub sweep_interval: Duration,
    /// Capacity of the outbound confirmation channel.
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VMS_HOST.to_string(),
            port: DEFAULT_VMS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            session_ttl: DEFAULT_SESSION_TTL,
            session_retention: DEFAULT_SESSION_RETENTION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VMS_HOST").ok().unwrap_or_else(|| DEFAULT_VMS_HOST.into());
        let port = env::var("VMS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for VMS_PORT. {e} Using the default, {DEFAULT_VMS_PORT}, instead."
                    );
                    DEFAULT_VMS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_VMS_PORT);
        let database_url = env::var("VMS_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ VMS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let session_ttl = seconds_from_env("VMS_SESSION_TTL", DEFAULT_SESSION_TTL);
        let session_retention = seconds_from_env("VMS_SESSION_RETENTION", DEFAULT_SESSION_RETENTION);
        let sweep_interval = seconds_from_env("VMS_SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL);
        let event_buffer = env::var("VMS_EVENT_BUFFER")
            .ok()
            .and_then(|s| {
                s.parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .or_else(|| {
                        warn!("🪛️ Invalid configuration value for VMS_EVENT_BUFFER: {s}. Using {DEFAULT_EVENT_BUFFER}.");
                        None
                    })
            })
            .unwrap_or(DEFAULT_EVENT_BUFFER);
        Self {
            host,
            port,
            database_url,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            session_ttl,
            session_retention,
            sweep_interval,
            event_buffer,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.session_ttl, self.session_retention)
    }
}

/// Reads a positive whole number of seconds from `var`. Missing or invalid values fall back to `default`.
fn seconds_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {}s.", default.num_seconds()))
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}"))
                .and_then(|n| {
                    if n > 0 {
                        Ok(Duration::seconds(n))
                    } else {
                        warn!("🪛️ {var} must be positive, but was {n}.");
                        Err(())
                    }
                })
        })
        .ok()
        .unwrap_or(default)
}
