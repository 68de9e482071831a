use std::time::Duration;

use serde::Deserialize;

use crate::utils::{HubError, Result};

/// Top-level configuration settings for the application.
///
/// Includes settings for the listener, the broker, the heartbeat protocol
/// and logging.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub heartbeat: HeartbeatSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Live connections accepted at once; extra peers are closed after the handshake.
    pub max_connections: usize,
    /// Capacity of each endpoint's outbound queue.
    pub queue_capacity: usize,
    /// Consecutive transport errors tolerated on a read before the peer is dropped.
    pub max_read_errors: u32,
}

/// Liveness windows, in milliseconds.
///
/// `ping_period_ms` must be strictly shorter than `pong_wait_ms` so that a
/// responsive peer always gets a probe before its read deadline elapses.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    pub pong_wait_ms: u64,
    pub write_wait_ms: u64,
    pub ping_period_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub heartbeat: Option<PartialHeartbeatSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub max_read_errors: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialHeartbeatSettings {
    pub pong_wait_ms: Option<u64>,
    pub write_wait_ms: Option<u64>,
    pub ping_period_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl HeartbeatSettings {
    /// Longest accepted heartbeat window (one day).
    pub const MAX_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

    /// Builds heartbeat settings from a read-deadline window, deriving the
    /// ping period as 9/10 of it.
    pub fn from_pong_wait(pong_wait_ms: u64, write_wait_ms: u64) -> Self {
        Self {
            pong_wait_ms,
            write_wait_ms,
            ping_period_ms: pong_wait_ms.saturating_mul(9) / 10,
        }
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    pub fn ping_period(&self) -> Duration {
        Duration::from_millis(self.ping_period_ms)
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self::from_pong_wait(60_000, 10_000)
    }
}

impl Settings {
    /// Fills every missing value of `partial` from `Settings::default()`.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server.unwrap_or_default();
        let broker = partial.broker.unwrap_or_default();
        let heartbeat = partial.heartbeat.unwrap_or_default();
        let log = partial.log.unwrap_or_default();

        let pong_wait_ms = heartbeat
            .pong_wait_ms
            .unwrap_or(default.heartbeat.pong_wait_ms);
        let write_wait_ms = heartbeat
            .write_wait_ms
            .unwrap_or(default.heartbeat.write_wait_ms);
        let derived = HeartbeatSettings::from_pong_wait(pong_wait_ms, write_wait_ms);

        Self {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .max_connections
                    .unwrap_or(default.broker.max_connections),
                queue_capacity: broker
                    .queue_capacity
                    .unwrap_or(default.broker.queue_capacity),
                max_read_errors: broker
                    .max_read_errors
                    .unwrap_or(default.broker.max_read_errors),
            },
            heartbeat: HeartbeatSettings {
                ping_period_ms: heartbeat.ping_period_ms.unwrap_or(derived.ping_period_ms),
                ..derived
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }

    /// Rejects combinations the pumps cannot run with.
    pub fn validate(&self) -> Result<()> {
        let hb = &self.heartbeat;
        if hb.pong_wait_ms == 0 || hb.write_wait_ms == 0 || hb.ping_period_ms == 0 {
            return Err(HubError::InvalidSettings(
                "heartbeat windows must be non-zero".to_string(),
            ));
        }
        let longest = hb.pong_wait_ms.max(hb.write_wait_ms).max(hb.ping_period_ms);
        if longest > HeartbeatSettings::MAX_WINDOW_MS {
            return Err(HubError::InvalidSettings(format!(
                "heartbeat windows must not exceed {}ms (got {longest}ms)",
                HeartbeatSettings::MAX_WINDOW_MS
            )));
        }
        if hb.ping_period_ms >= hb.pong_wait_ms {
            return Err(HubError::InvalidSettings(format!(
                "ping period ({}ms) must be shorter than pong wait ({}ms)",
                hb.ping_period_ms, hb.pong_wait_ms
            )));
        }
        if self.broker.queue_capacity == 0 {
            return Err(HubError::InvalidSettings(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.broker.max_connections == 0 {
            return Err(HubError::InvalidSettings(
                "max connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broker: BrokerSettings {
                max_connections: 1000,
                queue_capacity: 256,
                max_read_errors: 16,
            },
            heartbeat: HeartbeatSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
