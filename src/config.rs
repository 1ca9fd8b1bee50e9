//! Configuration management with validation and defaults
//!
//! Room tables, round timing, listen address and seed balances. Values come
//! from defaults, then an optional TOML file, then `CASINO_*` environment
//! variables, then command-line flags.

use crate::common::types::Amount;
use crate::errors::ConfigError;
use crate::games::room::{RoomConfig, ROULETTE_HISTORY_CAPACITY};
use crate::games::types::GameType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub engine: TimingConfig,
    pub rooms: RoomsConfig,
    pub users: Vec<SeedUser>,
}

/// HTTP and websocket listener
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Round timing shared by every room
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Shared scheduler period
    pub tick_interval_ms: u64,
    /// Crash multiplier refresh period while a round is running
    pub crash_sub_tick_ms: u64,
    pub coinflip_resolve_seconds: u32,
    pub roulette_roll_seconds: u32,
    pub crash_cooldown_seconds: u32,
    /// Exponent rate of the crash curve, `e^(rate·t)`
    pub crash_growth_rate: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            crash_sub_tick_ms: 50,
            coinflip_resolve_seconds: 3,
            roulette_roll_seconds: 5,
            crash_cooldown_seconds: 3,
            crash_growth_rate: 0.06,
        }
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn crash_sub_tick(&self) -> Duration {
        Duration::from_millis(self.crash_sub_tick_ms)
    }
}

/// Room tables per game, keyed by room id
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub coinflip: BTreeMap<String, RoomConfig>,
    pub roulette: BTreeMap<String, RoomConfig>,
    pub crash: BTreeMap<String, RoomConfig>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        let table = |rooms: &[(&str, i64, u32)], capacity: Option<usize>| {
            rooms
                .iter()
                .map(|(id, min_bet, seconds)| {
                    let mut config = RoomConfig::new(Amount::from_units(*min_bet), *seconds);
                    if let Some(capacity) = capacity {
                        config = config.with_history_capacity(capacity);
                    }
                    (id.to_string(), config)
                })
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            coinflip: table(&[("standard", 5, 15), ("vip", 50, 15)], None),
            roulette: table(
                &[("standard", 10, 30), ("vip", 100, 30)],
                Some(ROULETTE_HISTORY_CAPACITY),
            ),
            crash: table(&[("standard", 5, 15), ("vip", 50, 15)], None),
        }
    }
}

impl RoomsConfig {
    pub fn for_game(&self, game: GameType) -> &BTreeMap<String, RoomConfig> {
        match game {
            GameType::CoinFlip => &self.coinflip,
            GameType::Roulette => &self.roulette,
            GameType::Crash => &self.crash,
        }
    }
}

/// Account preloaded into the in-memory balance store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub name: String,
    pub balance: Amount,
}

impl EngineConfig {
    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "0", "Port cannot be zero"));
        }
        if self.server.host.is_empty() {
            return Err(ConfigError::ValidationFailed("server.host is required".to_string()));
        }
        if self.engine.tick_interval_ms == 0 {
            return Err(invalid("engine.tick_interval_ms", "0", "Tick interval must be > 0"));
        }
        if self.engine.crash_sub_tick_ms == 0 {
            return Err(invalid("engine.crash_sub_tick_ms", "0", "Sub-tick must be > 0"));
        }
        if !self.engine.crash_growth_rate.is_finite() || self.engine.crash_growth_rate <= 0.0 {
            return Err(invalid(
                "engine.crash_growth_rate",
                &self.engine.crash_growth_rate.to_string(),
                "Growth rate must be a positive number",
            ));
        }

        for game in GameType::ALL {
            let rooms = self.rooms.for_game(game);
            if rooms.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "no rooms configured for {}",
                    game
                )));
            }
            for (id, room) in rooms {
                let field = format!("rooms.{}.{}", game, id);
                if id.is_empty() {
                    return Err(invalid(&field, id, "Room id cannot be empty"));
                }
                if !room.min_bet.is_positive() {
                    return Err(invalid(
                        &format!("{}.min_bet", field),
                        &room.min_bet.to_string(),
                        "Minimum bet must be > 0",
                    ));
                }
                if room.round_duration_seconds == 0 {
                    return Err(invalid(
                        &format!("{}.round_duration_seconds", field),
                        "0",
                        "Round duration must be > 0",
                    ));
                }
                if room.history_capacity == 0 {
                    return Err(invalid(
                        &format!("{}.history_capacity", field),
                        "0",
                        "History capacity must be > 0",
                    ));
                }
            }
        }

        for user in &self.users {
            if user.id.is_empty() || user.id == "guest" {
                return Err(invalid("users.id", &user.id, "Reserved or empty user id"));
            }
            if user.balance < Amount::ZERO {
                return Err(invalid(
                    &format!("users.{}.balance", user.id),
                    &user.balance.to_string(),
                    "Balance cannot be negative",
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load from file and process environment, then validate
    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        self.load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with a custom variable lookup
    pub fn load_with<F>(&self, lookup: F) -> Result<EngineConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => EngineConfig::default(),
        };

        Self::apply_env_overrides(&mut config, lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &str) -> Result<EngineConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    fn apply_env_overrides<F>(config: &mut EngineConfig, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CASINO_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("CASINO_PORT") {
            config.server.port = parse_var("CASINO_PORT", port, "Invalid port number")?;
        }
        if let Some(origins) = lookup("CASINO_ALLOWED_ORIGINS") {
            config.server.allowed_origins = origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        if let Some(tick) = lookup("CASINO_TICK_MS") {
            config.engine.tick_interval_ms = parse_var("CASINO_TICK_MS", tick, "Invalid tick period")?;
        }
        if let Some(sub_tick) = lookup("CASINO_CRASH_SUB_TICK_MS") {
            config.engine.crash_sub_tick_ms =
                parse_var("CASINO_CRASH_SUB_TICK_MS", sub_tick, "Invalid sub-tick period")?;
        }
        Ok(())
    }

    /// Write a configuration as pretty TOML
    pub fn save(config: &EngineConfig, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::ValidationFailed(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_string_lossy().to_string(),
            source,
        })
    }
}

fn parse_var<T: std::str::FromStr>(field: &str, value: String, reason: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}
