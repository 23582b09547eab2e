//! Configuration management for the quad warp tool

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::geometry::{Point, Rect};
use crate::input::Key;

/// Nudge step for arrow keys without the modifier held
pub const DEFAULT_NUDGE_SMALL: f64 = 0.3;

/// Nudge step while the modifier is held
pub const DEFAULT_NUDGE_FAST: f64 = 10.0;

/// Default edge length of a corner handle; the hit radius is half of it
pub const DEFAULT_ANCHOR_SIZE: f64 = 10.0;

/// Arrow-key nudge amounts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Nudge {
    pub small: f64,
    pub fast: f64,
}

impl Nudge {
    /// Step for the current modifier state
    pub fn amount(&self, fast: bool) -> f64 {
        if fast {
            self.fast
        } else {
            self.small
        }
    }
}

impl Default for Nudge {
    fn default() -> Self {
        Self {
            small: DEFAULT_NUDGE_SMALL,
            fast: DEFAULT_NUDGE_FAST,
        }
    }
}

/// Editor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Reference rectangle the source quad is built from
    #[serde(default)]
    pub source: Rect,

    /// Handle size in pixels
    #[serde(default = "default_anchor_size")]
    pub anchor_size: f64,

    #[serde(default)]
    pub nudge: Nudge,

    /// Offset of the editor origin in host coordinates
    #[serde(default)]
    pub position: Point,

    /// Start with the overlay shown
    #[serde(default)]
    pub visible: bool,
}

fn default_anchor_size() -> f64 {
    DEFAULT_ANCHOR_SIZE
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            source: Rect::default(),
            anchor_size: DEFAULT_ANCHOR_SIZE,
            nudge: Nudge::default(),
            position: Point::default(),
            visible: false,
        }
    }
}

/// Character bindings for the corner cycling keys
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyBindings {
    pub next_corner: char,
    pub previous_corner: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            next_corner: 'p',
            previous_corner: 'o',
        }
    }
}

impl KeyBindings {
    /// Map a host character key onto the editor's key set
    pub fn resolve(&self, c: char) -> Key {
        if c == self.next_corner {
            Key::NextCorner
        } else if c == self.previous_corner {
            Key::PreviousCorner
        } else {
            Key::Other
        }
    }
}

/// Persisted document settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub path: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(crate::persist::DEFAULT_FILE_NAME),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub editor: EditorConfig,

    #[serde(default)]
    pub keys: KeyBindings,

    #[serde(default)]
    pub document: DocumentConfig,
}

impl Config {
    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
