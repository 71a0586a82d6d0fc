//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use poker_core::TournamentConfig;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Complete server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address.
    pub bind: SocketAddr,
    /// Tunables handed straight to the tournament core.
    pub tournament: TournamentConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args).
    ///
    /// # Errors
    ///
    /// Returns an error if a present variable fails validation.
    pub fn from_env(bind_override: Option<SocketAddr>) -> Result<Self, ConfigError> {
        let bind = bind_override
            .or_else(|| {
                std::env::var("SERVER_BIND")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or_else(|| {
                "127.0.0.1:8765"
                    .parse()
                    .expect("default bind address is valid")
            });

        let min_players: usize = parse_env_or("MIN_PLAYERS", 2);
        let max_players: usize = parse_env_or("MAX_PLAYERS", 9);
        let starting_stack: i64 = parse_env_or("STARTING_STACK", 10_000);
        let action_timeout_seconds: u64 = parse_env_or("ACTION_TIMEOUT_SECONDS", 30);
        let lobby_wait_seconds: u64 = parse_env_or("LOBBY_WAIT_SECONDS", 5);

        let blind_schedule = match std::env::var("BLIND_SCHEDULE") {
            Ok(raw) => parse_blind_schedule(&raw)?,
            Err(_) => TournamentConfig::default().blind_schedule,
        };

        let tournament = TournamentConfig {
            min_players,
            max_players,
            starting_stack,
            action_timeout_seconds,
            lobby_wait_seconds,
            blind_schedule,
        };

        Ok(ServerConfig { bind, tournament })
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tournament;

        if t.min_players < 2 {
            return Err(ConfigError::Invalid {
                var: "MIN_PLAYERS".to_string(),
                reason: "must be at least 2".to_string(),
            });
        }

        if t.max_players < t.min_players {
            return Err(ConfigError::Invalid {
                var: "MAX_PLAYERS".to_string(),
                reason: format!("must be at least MIN_PLAYERS ({})", t.min_players),
            });
        }

        if t.max_players > 23 {
            return Err(ConfigError::Invalid {
                var: "MAX_PLAYERS".to_string(),
                reason: "must be at most 23 (max players with a 52-card deck)".to_string(),
            });
        }

        if t.starting_stack <= 0 {
            return Err(ConfigError::Invalid {
                var: "STARTING_STACK".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if t.action_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                var: "ACTION_TIMEOUT_SECONDS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if t.blind_schedule.is_empty() {
            return Err(ConfigError::Invalid {
                var: "BLIND_SCHEDULE".to_string(),
                reason: "must contain at least one threshold".to_string(),
            });
        }

        Ok(())
    }
}

/// Parses `"1:50:100,10:100:200"` into a blind schedule, the format BLIND_SCHEDULE
/// is accepted in when overriding the default ladder from the environment.
fn parse_blind_schedule(raw: &str) -> Result<BTreeMap<u64, (i64, i64)>, ConfigError> {
    let mut schedule = BTreeMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let parts: Vec<&str> = entry.split(':').collect();
        let invalid = || ConfigError::Invalid {
            var: "BLIND_SCHEDULE".to_string(),
            reason: format!("malformed entry {entry:?}, expected hand:sb:bb"),
        };
        let [hand, sb, bb] = parts.as_slice() else {
            return Err(invalid());
        };
        let hand: u64 = hand.parse().map_err(|_| invalid())?;
        let sb: i64 = sb.parse().map_err(|_| invalid())?;
        let bb: i64 = bb.parse().map_err(|_| invalid())?;
        schedule.insert(hand, (sb, bb));
    }
    Ok(schedule)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {var}\nhint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback.
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "SERVER_BIND".to_string(),
            hint: "set host:port".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SERVER_BIND"));
        assert!(msg.contains("set host:port"));
    }

    #[test]
    fn test_config_validation_rejects_max_below_min() {
        let mut config = ServerConfig {
            bind: "127.0.0.1:8765".parse().unwrap(),
            tournament: TournamentConfig::default(),
        };
        config.tournament.min_players = 5;
        config.tournament.max_players = 3;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_rejects_zero_starting_stack() {
        let mut config = ServerConfig {
            bind: "127.0.0.1:8765".parse().unwrap(),
            tournament: TournamentConfig::default(),
        };
        config.tournament.starting_stack = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_blind_schedule_parses_multiple_entries() {
        let schedule = parse_blind_schedule("1:50:100,10:100:200").unwrap();
        assert_eq!(schedule.get(&1), Some(&(50, 100)));
        assert_eq!(schedule.get(&10), Some(&(100, 200)));
    }

    #[test]
    fn test_blind_schedule_rejects_malformed_entry() {
        assert!(parse_blind_schedule("not-a-schedule").is_err());
    }
}
