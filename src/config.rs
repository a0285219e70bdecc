//! Application-level configuration loading, including gameplay tunables and
//! extra word packs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CLUEGRID_BACK_CONFIG_PATH";

/// Timer presets a room may select, in seconds. Zero disables the timer.
pub const TIMER_PRESETS: &[u32] = &[0, 60, 90, 120, 180, 300];

const DEFAULT_CAPACITY: usize = 12;
const DEFAULT_OWNER_GRACE_SECS: u64 = 30;
const DEFAULT_TIMER_RETRY_BUFFER_MS: u64 = 2_000;
const DEFAULT_BAN_SECS: u64 = 15 * 60;
const DEFAULT_LIVENESS_TIMEOUT_SECS: u64 = 25;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;
const DEFAULT_STALE_AFTER_SECS: u64 = 10 * 60;
const DEFAULT_ROOM_TTL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_MESSAGE_PRUNE_THRESHOLD: usize = 400;
const DEFAULT_MESSAGE_KEEP: usize = 300;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Maximum number of players a new room admits.
    pub default_capacity: usize,
    /// How long a disconnected owner keeps the seat before succession.
    pub owner_grace: Duration,
    /// Slack added when re-arming a turn timer that fired mid-write.
    pub timer_retry_buffer: Duration,
    /// How long a kicked player stays banned from rejoining.
    pub ban_duration: Duration,
    /// Heartbeat age after which a player counts as disconnected.
    pub liveness_timeout: Duration,
    /// Interval between liveness and janitor sweeps.
    pub sweep_interval: Duration,
    /// Disconnected-clue-giver age after which stale demotion may act.
    pub stale_after: Duration,
    /// Every-player-disconnected age after which a room is collected.
    pub room_ttl: Duration,
    /// Message count that triggers pruning of the chat log.
    pub message_prune_threshold: usize,
    /// Messages kept once pruning triggers.
    pub message_keep: usize,
    /// Extra word packs merged into the built-in catalog, keyed by pack id.
    pub extra_packs: Vec<(String, Vec<String>)>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        extra_packs = app_config.extra_packs.len(),
                        "loaded configuration from file"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
            owner_grace: Duration::from_secs(DEFAULT_OWNER_GRACE_SECS),
            timer_retry_buffer: Duration::from_millis(DEFAULT_TIMER_RETRY_BUFFER_MS),
            ban_duration: Duration::from_secs(DEFAULT_BAN_SECS),
            liveness_timeout: Duration::from_secs(DEFAULT_LIVENESS_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
            room_ttl: Duration::from_secs(DEFAULT_ROOM_TTL_SECS),
            message_prune_threshold: DEFAULT_MESSAGE_PRUNE_THRESHOLD,
            message_keep: DEFAULT_MESSAGE_KEEP,
            extra_packs: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    default_capacity: Option<usize>,
    owner_grace_secs: Option<u64>,
    timer_retry_buffer_ms: Option<u64>,
    ban_duration_secs: Option<u64>,
    liveness_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    stale_after_secs: Option<u64>,
    room_ttl_secs: Option<u64>,
    message_prune_threshold: Option<usize>,
    message_keep: Option<usize>,
    #[serde(default)]
    word_packs: Vec<RawWordPack>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let seconds =
            |raw: Option<u64>, fallback: Duration| raw.map(Duration::from_secs).unwrap_or(fallback);
        Self {
            default_capacity: value.default_capacity.unwrap_or(defaults.default_capacity),
            owner_grace: seconds(value.owner_grace_secs, defaults.owner_grace),
            timer_retry_buffer: value
                .timer_retry_buffer_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timer_retry_buffer),
            ban_duration: seconds(value.ban_duration_secs, defaults.ban_duration),
            liveness_timeout: seconds(value.liveness_timeout_secs, defaults.liveness_timeout),
            sweep_interval: seconds(value.sweep_interval_secs, defaults.sweep_interval),
            stale_after: seconds(value.stale_after_secs, defaults.stale_after),
            room_ttl: seconds(value.room_ttl_secs, defaults.room_ttl),
            message_prune_threshold: value
                .message_prune_threshold
                .unwrap_or(defaults.message_prune_threshold),
            message_keep: value.message_keep.unwrap_or(defaults.message_keep),
            extra_packs: value
                .word_packs
                .into_iter()
                .map(|pack| (pack.id, pack.words))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of one extra word pack inside the configuration file.
struct RawWordPack {
    id: String,
    words: Vec<String>,
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
