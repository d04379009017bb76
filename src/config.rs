use std::path::{Path, PathBuf};

use crossterm::event::KeyCode;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub filter: FilterConfig,
    pub probes: ProbesConfig,
    pub display: DisplayConfig,
    pub keybinds: KeybindsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub text_only: bool,
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 1000,
            text_only: false,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub pids: Vec<u32>,
    pub hostnames: Vec<String>,
    pub follow_children: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    /// `symbol`, `symbol+offset` or address specs.
    pub kprobes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// 0 shows every row that fits.
    pub max_rows: usize,
    pub show_threads: bool,
    pub theme: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            max_rows: 0,
            show_threads: true,
            theme: "dark".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KeybindsConfig {
    pub quit: String,
    pub pause: String,
}

impl Default for KeybindsConfig {
    fn default() -> Self {
        KeybindsConfig {
            quit: "q".to_string(),
            pause: "p".to_string(),
        }
    }
}

/// Parse a key name from the config: a single character or one of a few
/// named keys.
pub fn parse_key(s: &str) -> Option<KeyCode> {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(c));
    }
    match s.to_lowercase().as_str() {
        "space" => Some(KeyCode::Char(' ')),
        "enter" => Some(KeyCode::Enter),
        "esc" | "escape" => Some(KeyCode::Esc),
        "tab" => Some(KeyCode::Tab),
        "f1" => Some(KeyCode::F(1)),
        _ => None,
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tracetop").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}
