//! Server configuration from environment variables

use crate::types::{GameConfig, KeepaliveConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_WORDLIST: &str = "wordlist.txt";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub wordlist_path: PathBuf,
    pub game: GameConfig,
    pub keepalive: KeepaliveConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            wordlist_path: PathBuf::from(DEFAULT_WORDLIST),
            game: GameConfig::default(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

/// Parse `name`, falling back to `default` when unset or invalid
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid value {:?} for {}, using default", raw, name);
                default
            }
        },
        Err(_) => default,
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env_or("PLAYZIO_ADDR", defaults.bind_addr);
        let wordlist_path = std::env::var("WORDLIST_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_WORDLIST));

        let game = GameConfig {
            countdown_secs: env_or("COUNTDOWN_SECS", defaults.game.countdown_secs),
            turn_time_ceiling: env_or("TURN_TIME_CEILING", defaults.game.turn_time_ceiling),
            turn_time_floor: env_or("TURN_TIME_FLOOR", defaults.game.turn_time_floor),
            initial_lives: env_or("INITIAL_LIVES", defaults.game.initial_lives),
            max_room_capacity: env_or("MAX_ROOM_CAPACITY", defaults.game.max_room_capacity),
        };

        let keepalive = KeepaliveConfig {
            ping_interval: Duration::from_secs(
                env_or("PING_INTERVAL_SECS", defaults.keepalive.ping_interval.as_secs()).max(1),
            ),
            pong_timeout: Duration::from_secs(env_or(
                "PONG_TIMEOUT_SECS",
                defaults.keepalive.pong_timeout.as_secs(),
            )),
        };

        tracing::info!(
            %bind_addr,
            wordlist = %wordlist_path.display(),
            countdown_secs = game.countdown_secs,
            max_room_capacity = game.max_room_capacity,
            "Server config loaded"
        );

        Self {
            bind_addr,
            wordlist_path,
            game,
            keepalive,
        }
    }
}
