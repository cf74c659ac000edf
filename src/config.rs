//! Server configuration loaded from environment variables

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime knobs for the room server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_addr: SocketAddr,
    /// Whether the host's countdown advances phases automatically
    pub auto_advance: bool,
    /// Length of one countdown tick (one second in production)
    pub timer_tick: Duration,
    /// How long an intent may wait for a room's writer slot
    pub store_lock_timeout: Duration,
    /// Rooms without any committed change for this long get deleted
    pub room_idle_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            auto_advance: true,
            timer_tick: Duration::from_secs(1),
            store_lock_timeout: Duration::from_secs(5),
            room_idle_ttl: Duration::from_secs(3600),
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match env_string("BIND_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid BIND_ADDR '{}': {}, using default", raw, e);
                defaults.bind_addr
            }),
            None => defaults.bind_addr,
        };

        Self {
            bind_addr,
            auto_advance: env_flag("AUTO_ADVANCE").unwrap_or(defaults.auto_advance),
            timer_tick: env_parse::<u64>("TIMER_TICK_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.timer_tick),
            store_lock_timeout: env_parse::<u64>("STORE_LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_lock_timeout),
            room_idle_ttl: env_parse::<u64>("ROOM_IDLE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.room_idle_ttl),
        }
    }
}

/// Read an env var, treating empty or whitespace-only values as unset
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|s| s.parse().ok())
}

pub(crate) fn env_flag(key: &str) -> Option<bool> {
    env_string(key).map(|v| v != "0" && v.to_lowercase() != "false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "BIND_ADDR",
            "AUTO_ADVANCE",
            "TIMER_TICK_MS",
            "STORE_LOCK_TIMEOUT_MS",
            "ROOM_IDLE_TTL_SECS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ServerConfig::from_env();
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.auto_advance);
        assert_eq!(config.timer_tick, Duration::from_secs(1));
        assert_eq!(config.store_lock_timeout, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        std::env::set_var("BIND_ADDR", "127.0.0.1:8080");
        std::env::set_var("AUTO_ADVANCE", "false");
        std::env::set_var("TIMER_TICK_MS", "250");
        std::env::set_var("ROOM_IDLE_TTL_SECS", "60");

        let config = ServerConfig::from_env();
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert!(!config.auto_advance);
        assert_eq!(config.timer_tick, Duration::from_millis(250));
        assert_eq!(config.room_idle_ttl, Duration::from_secs(60));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_and_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("BIND_ADDR", "not an address");
        std::env::set_var("TIMER_TICK_MS", "   ");
        std::env::set_var("STORE_LOCK_TIMEOUT_MS", "soon");

        let config = ServerConfig::from_env();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.timer_tick, Duration::from_secs(1));
        assert_eq!(config.store_lock_timeout, Duration::from_secs(5));
        clear_env();
    }
}
