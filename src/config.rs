//! Configuration system for kwm
//!
//! Loads configuration from TOML file at `~/.config/kwm/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::wm::decorations::{DecorationMetrics, Palette, Theme};
use crate::wm::keyboard::Action;

/// Environment variable overriding the decoration scale factor
pub const SCALE_ENV: &str = "K_SCALE";

/// Larger factors would only produce title bars taller than any screen
pub const MAX_SCALE: u32 = 16;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decoration scale factor, used when `K_SCALE` is not set
    pub scale: u32,
    pub colors: ColorsConfig,
    pub keybindings: Vec<KeyBindingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scale: 1,
            colors: ColorsConfig::default(),
            keybindings: default_keybindings(),
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config = Self::parse(&content)?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("kwm");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string =
            toml::to_string_pretty(&Self::default()).context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }

    /// Scale factor from the environment, falling back to the file
    pub fn effective_scale(&self) -> u32 {
        let env = std::env::var(SCALE_ENV).ok();
        resolve_scale(env.as_deref(), self.scale)
    }

    /// Decoration theme at the configured scale
    pub fn theme(&self) -> Theme {
        Theme {
            metrics: DecorationMetrics::new(self.scale.min(MAX_SCALE)),
            palette: self.colors.palette(),
        }
    }
}

/// `K_SCALE` wins when present; anything non-numeric or below 1 means 1
pub fn resolve_scale(env: Option<&str>, configured: u32) -> u32 {
    let scale = match env {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(1),
        None => configured,
    };
    scale.clamp(1, MAX_SCALE)
}

/// Decoration colors as 0xRRGGBB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub background: u32,
    pub text: u32,
    pub border: u32,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        let palette = Palette::default();
        Self {
            background: palette.background,
            text: palette.text,
            border: palette.border,
        }
    }
}

impl ColorsConfig {
    pub fn palette(&self) -> Palette {
        Palette {
            background: self.background & 0xff_ffff,
            text: self.text & 0xff_ffff,
            border: self.border & 0xff_ffff,
        }
    }
}

/// One `[[keybindings]]` entry; the key is always combined with Super
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindingConfig {
    pub key: String,
    #[serde(flatten)]
    pub action: Action,
}

fn spawn(key: &str, command: &str) -> KeyBindingConfig {
    KeyBindingConfig {
        key: key.to_string(),
        action: Action::Spawn {
            command: command.split_whitespace().map(str::to_string).collect(),
        },
    }
}

fn bind(key: &str, action: Action) -> KeyBindingConfig {
    KeyBindingConfig {
        key: key.to_string(),
        action,
    }
}

fn default_keybindings() -> Vec<KeyBindingConfig> {
    vec![
        bind("F1", Action::Quit),
        bind("Tab", Action::FocusNext),
        bind("q", Action::KillFocused),
        bind("m", Action::MaximizeFocused),
        spawn("w", "kweb"),
        spawn("e", "kfile"),
        spawn("r", "st"),
        spawn("t", "kterm"),
        spawn("y", "amixer -q set Master toggle"),
        spawn("u", "amixer -q set Master 5%- unmute"),
        spawn("i", "amixer -q set Master 5%+ unmute"),
        spawn("o", "bri -"),
        spawn("p", "bri +"),
        spawn("space", "dmenu_run"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_scale() {
        assert_eq!(resolve_scale(None, 1), 1);
        assert_eq!(resolve_scale(None, 3), 3);
        assert_eq!(resolve_scale(None, 0), 1);
        assert_eq!(resolve_scale(Some("2"), 3), 2);
        assert_eq!(resolve_scale(Some(" 2 "), 1), 2);
        assert_eq!(resolve_scale(Some("0"), 3), 1);
        assert_eq!(resolve_scale(Some("-4"), 3), 1);
        assert_eq!(resolve_scale(Some("big"), 3), 1);
        assert_eq!(resolve_scale(Some("1000"), 1), MAX_SCALE);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse(
            r#"
scale = 2

[colors]
background = 0x202020

[[keybindings]]
key = "Return"
action = "spawn"
command = ["st", "-e", "htop"]

[[keybindings]]
key = "F1"
action = "quit"
"#,
        )
        .unwrap();

        assert_eq!(config.scale, 2);
        assert_eq!(config.colors.background, 0x202020);
        assert_eq!(config.colors.text, 0x000000);
        assert_eq!(config.keybindings.len(), 2);
        assert_eq!(
            config.keybindings[0].action,
            Action::Spawn {
                command: vec!["st".into(), "-e".into(), "htop".into()]
            }
        );
        assert_eq!(config.keybindings[1].action, Action::Quit);

        let theme = config.theme();
        assert_eq!(theme.metrics.title_height, 48);
        assert_eq!(theme.palette.background, 0x202020);
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        let result = Config::parse(
            r#"
[[keybindings]]
key = "x"
action = "explode"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), Config::default());
    }

    #[test]
    fn test_default_bindings_split_commands() {
        let config = Config::default();
        let volume = config.keybindings.iter().find(|b| b.key == "u").unwrap();
        assert_eq!(
            volume.action,
            Action::Spawn {
                command: vec!["amixer", "-q", "set", "Master", "5%-", "unmute"]
                    .into_iter()
                    .map(String::from)
                    .collect()
            }
        );
    }
}
