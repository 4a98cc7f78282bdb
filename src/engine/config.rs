//! Server configuration: card file location, pacing delays, RNG seed.
//! Loaded from TOML at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Fixed delays used to pace the match for the UI, in milliseconds.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PacingConfig {
    pub pass_cooldown_ms: u64,
    pub surprise_reveal_ms: u64,
    pub after_surprise_ms: u64,
    pub correct_answer_ms: u64,
    pub win_teardown_ms: u64,
    pub disconnect_grace_ms: u64,
    /// Seconds before the answer deadline at which the player is warned.
    pub timer_warning_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            pass_cooldown_ms: 2000,
            surprise_reveal_ms: 3000,
            after_surprise_ms: 1500,
            correct_answer_ms: 2000,
            win_teardown_ms: 10_000,
            disconnect_grace_ms: 8000,
            timer_warning_secs: 10,
        }
    }
}

impl PacingConfig {
    /// No delays at all; used by tests and simulations.
    pub fn instant() -> Self {
        Self {
            pass_cooldown_ms: 0,
            surprise_reveal_ms: 0,
            after_surprise_ms: 0,
            correct_answer_ms: 0,
            win_teardown_ms: 0,
            disconnect_grace_ms: 0,
            timer_warning_secs: 10,
        }
    }

    pub fn pass_cooldown(&self) -> Duration {
        Duration::from_millis(self.pass_cooldown_ms)
    }

    pub fn surprise_reveal(&self) -> Duration {
        Duration::from_millis(self.surprise_reveal_ms)
    }

    pub fn after_surprise(&self) -> Duration {
        Duration::from_millis(self.after_surprise_ms)
    }

    pub fn correct_answer(&self) -> Duration {
        Duration::from_millis(self.correct_answer_ms)
    }

    pub fn win_teardown(&self) -> Duration {
        Duration::from_millis(self.win_teardown_ms)
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_ms)
    }
}

/// Top-level TOML file structure.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub cards_path: PathBuf,
    pub pacing: PacingConfig,
    /// Fixed seed for die rolls and card draws (reproducible matches).
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cards_path: PathBuf::from("cards/default.json"),
            pacing: PacingConfig::default(),
            rng_seed: None,
        }
    }
}

/// Load config from a TOML file at the given path.
pub fn load_config(path: &Path) -> Result<ServerConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

/// Try to load config from well-known paths, returning defaults if none found.
pub fn load_default_config() -> ServerConfig {
    let candidates = ["trivia.toml", "../trivia.toml", "/etc/trivia/trivia.toml"];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_config(p) {
                Ok(config) => {
                    tracing::info!(path = %p.display(), "loaded server config");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load server config");
                }
            }
        }
    }
    tracing::info!("no trivia.toml found, using built-in defaults");
    ServerConfig::default()
}
