//! Configuration loading
//!
//! Configuration comes from a TOML file. The path is resolved in priority
//! order: explicit path (CLI/env), then `~/.config/castlink/config.toml`,
//! then `/etc/castlink/config.toml` on Linux. Every field has a default so
//! the server starts with an empty file.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub widgets: WidgetsConfig,
    pub tts: TtsConfig,
    pub local_engine: LocalEngineConfig,
    pub cloud_engine: CloudEngineConfig,
    pub sounds: SoundsConfig,
    pub webhooks: WebhooksConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5600,
        }
    }
}

/// Chat relay log tailing
///
/// The relay writes chat logs as `room_<id>-<yyyymmdd>_*.txt` under
/// `log_dir`. Ingestion tails the newest matching file. Tailing is disabled
/// when `log_dir` is unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub room_id: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            room_id: None,
            log_dir: None,
            poll_interval_ms: 500,
        }
    }
}

/// Counter widget milestone lists
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WidgetsConfig {
    pub monetization: CounterConfig,
    pub guard_progress: CounterConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Must be strictly ascending by threshold
    pub milestones: Vec<MilestoneConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneConfig {
    pub threshold: f64,
    /// Opaque payload forwarded to widgets when the threshold is crossed
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Speak queued requests automatically; when off, requests accumulate
    pub autoplay: bool,
    /// Round-robin across senders instead of strict arrival order
    pub fairness: bool,
    /// Maximum queued requests; oldest is dropped at the cap. Unbounded
    /// when unset.
    pub queue_cap: Option<usize>,
    /// Event kinds eligible for speech (names from `EventKind::name`)
    pub speak_kinds: Vec<String>,
    /// Translation target for spoken chat/superchat text (e.g. "EN-US");
    /// forwarded to the synthesis engine, unset disables translation
    pub translate_to: Option<String>,
    /// Which synthesis engine starts active: "local" or "cloud"
    pub engine: String,
    pub voice: String,
    pub speed: f64,
    pub synth_timeout_secs: u64,
    /// Silence between consecutive spoken requests
    pub gap_ms: u64,
    /// External player command; synthesized audio is piped to its stdin
    pub player_command: Vec<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            autoplay: false,
            fairness: true,
            queue_cap: None,
            speak_kinds: vec!["superchat".to_string(), "membership".to_string()],
            translate_to: None,
            engine: "local".to_string(),
            voice: "default".to_string(),
            speed: 1.0,
            synth_timeout_secs: 15,
            gap_ms: 500,
            player_command: vec![
                "ffplay".to_string(),
                "-autoexit".to_string(),
                "-nodisp".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
                "-".to_string(),
            ],
        }
    }
}

/// Local subprocess synthesis engine
///
/// The command receives the text on stdin and must write audio to stdout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalEngineConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            command: "espeak-ng".to_string(),
            args: vec!["--stdout".to_string(), "--stdin".to_string()],
        }
    }
}

/// Remote HTTP synthesis engine; inactive unless `endpoint` is set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CloudEngineConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// Chat sound commands, keyed by the exact chat token that triggers them
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SoundsConfig {
    pub commands: HashMap<String, SoundClipConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoundClipConfig {
    pub file: String,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    1.0
}

/// Per-tier membership webhook URLs; a tier without a URL is skipped
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhooksConfig {
    pub captain: Option<String>,
    pub admiral: Option<String>,
    pub governor: Option<String>,
}

impl Config {
    /// Load configuration from `path`, or from the default locations when
    /// no path is given. A missing default file yields `Config::default()`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Config::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that serde cannot express
    pub fn validate(&self) -> Result<()> {
        for (name, counter) in [
            ("monetization", &self.widgets.monetization),
            ("guard_progress", &self.widgets.guard_progress),
        ] {
            let thresholds: Vec<f64> =
                counter.milestones.iter().map(|m| m.threshold).collect();
            if thresholds.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::Config(format!(
                    "widgets.{name}.milestones must be strictly ascending"
                )));
            }
            if thresholds.iter().any(|t| *t <= 0.0) {
                return Err(Error::Config(format!(
                    "widgets.{name}.milestones thresholds must be positive"
                )));
            }
        }

        match self.tts.engine.as_str() {
            "local" | "cloud" => {}
            other => {
                return Err(Error::Config(format!(
                    "tts.engine must be \"local\" or \"cloud\", got {other:?}"
                )));
            }
        }

        if self.tts.player_command.is_empty() {
            return Err(Error::Config(
                "tts.player_command must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// First existing default config file, if any
fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("castlink").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(target_os = "linux") {
        let system = PathBuf::from("/etc/castlink/config.toml");
        if system.exists() {
            return Some(system);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5600);
        assert!(!config.tts.autoplay);
        assert!(config.tts.fairness);
        assert_eq!(config.tts.speak_kinds, vec!["superchat", "membership"]);
        assert!(config.relay.log_dir.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 6000

[tts]
autoplay = true

[widgets.monetization]
milestones = [
    {{ threshold = 100.0, payload = "confetti" }},
    {{ threshold = 500.0, payload = "fireworks" }},
]

[sounds.commands."!horn"]
file = "horn.ogg"

[webhooks]
captain = "http://127.0.0.1:9000/captain"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 6000);
        assert!(config.tts.autoplay);
        assert_eq!(config.widgets.monetization.milestones.len(), 2);
        assert_eq!(config.sounds.commands["!horn"].volume, 1.0);
        assert_eq!(
            config.webhooks.captain.as_deref(),
            Some("http://127.0.0.1:9000/captain")
        );
        assert!(config.webhooks.admiral.is_none());
        // untouched sections keep defaults
        assert_eq!(config.relay.poll_interval_ms, 500);
    }

    #[test]
    fn test_rejects_unordered_milestones() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[widgets.guard_progress]
milestones = [
    {{ threshold = 10.0 }},
    {{ threshold = 5.0 }},
]
"#
        )
        .unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_engine() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tts]\nengine = \"carrier-pigeon\"").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
