//! Config module.
//! JSON config file plus documented defaults; CLI flags override whatever
//! the file says. Everything a session needs lives here: service
//! endpoints, cadences, and engine knobs.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::recognize::PlayerSide;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Board recognition endpoint.
    pub recognizer_url: String,
    /// Engine analysis endpoint.
    pub analyzer_url: String,
    /// Delay between analysis iterations, in milliseconds.
    pub interval_ms: u64,
    /// Delay between screen captures, in milliseconds.
    pub capture_interval_ms: u64,
    /// Engine search depth.
    pub depth: u32,
    /// Number of principal variations requested.
    pub multi_pv: u32,
    /// Which side the player is playing.
    pub side: PlayerSide,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recognizer_url: "https://api.chessvision.ai/v1/recognize".into(),
            analyzer_url: "https://your-stockfish-server.com/api/analyze".into(),
            interval_ms: 5000,
            capture_interval_ms: 1000,
            depth: 15,
            multi_pv: 1,
            side: PlayerSide::White,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.interval_ms, 5000);
        assert_eq!(config.capture_interval_ms, 1000);
        assert_eq!(config.depth, 15);
        assert_eq!(config.multi_pv, 1);
        assert_eq!(config.side, PlayerSide::White);
    }

    #[test]
    fn json_roundtrip_preserves_fields() {
        let mut config = Config::default();
        config.depth = 20;
        config.side = PlayerSide::Black;
        let raw = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: Config = serde_json::from_str(r#"{ "depth": 12, "side": "black" }"#).unwrap();
        assert_eq!(parsed.depth, 12);
        assert_eq!(parsed.side, PlayerSide::Black);
        assert_eq!(parsed.interval_ms, 5000);
    }
}
