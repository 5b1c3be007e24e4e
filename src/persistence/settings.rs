use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::{Direction, LayoutOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    // If None, use OS default autosave directory
    pub autosave_override: Option<PathBuf>,
    // If None, exports land in the OS temporary directory
    #[serde(default)]
    pub export_override: Option<PathBuf>,
    // Autosave at most once per this many milliseconds
    #[serde(default = "AppSettings::default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,
    // Auto-layout defaults; the toolbar direction picker starts here
    #[serde(default)]
    pub layout_direction: Direction,
    #[serde(default = "AppSettings::default_rank_spacing")]
    pub layout_rank_spacing: f32,
    #[serde(default = "AppSettings::default_node_spacing")]
    pub layout_node_spacing: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            autosave_override: None,
            export_override: None,
            autosave_debounce_ms: Self::default_autosave_debounce_ms(),
            layout_direction: Direction::LR,
            layout_rank_spacing: Self::default_rank_spacing(),
            layout_node_spacing: Self::default_node_spacing(),
        }
    }
}

impl AppSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Lineage-Canvas
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Lineage-Canvas");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Lineage-Canvas
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Lineage-Canvas");
            }
            return PathBuf::from("Lineage-Canvas");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/lineage-canvas or ~/.config/lineage-canvas
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("lineage-canvas");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("lineage-canvas");
        }
    }

    fn autosave_default_dir() -> PathBuf {
        // Cross-platform user-writable autosave dir
        #[cfg(target_os = "macos")]
        {
            let tmp = std::env::var_os("TMPDIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp"));
            return tmp.join("Lineage-Canvas");
        }
        #[cfg(target_os = "windows")]
        {
            // %LOCALAPPDATA%\Lineage-Canvas\Autosave else TEMP
            if let Ok(local) = std::env::var("LOCALAPPDATA") {
                return PathBuf::from(local).join("Lineage-Canvas").join("Autosave");
            }
            if let Ok(temp) = std::env::var("TEMP") {
                return PathBuf::from(temp).join("Lineage-Canvas");
            }
            return PathBuf::from("Lineage-Canvas");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_STATE_HOME/lineage-canvas or ~/.local/state/lineage-canvas, else /tmp
            if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
                return PathBuf::from(xdg).join("lineage-canvas");
            }
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(".local").join("state").join("lineage-canvas");
            }
            return PathBuf::from("/tmp").join("Lineage-Canvas");
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_dir().join("settings.json");
        if path.exists() {
            let mut f = std::fs::File::open(path)?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            let v: Self = serde_json::from_str(&s)?;
            return Ok(v);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join("settings.json");
        let s = serde_json::to_string_pretty(self)?;
        let mut f = std::fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn autosave_dir(&self) -> PathBuf {
        if let Some(p) = &self.autosave_override { return p.clone(); }
        Self::autosave_default_dir()
    }

    /// Default export directory when no override is set: OS temporary directory.
    /// Example: {temp_dir}/Lineage-Canvas/exports
    pub fn export_default_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push("Lineage-Canvas");
        p.push("exports");
        p
    }

    /// Effective export directory honoring user override or falling back to OS temp.
    pub fn export_dir(&self) -> PathBuf {
        if let Some(p) = &self.export_override { return p.clone(); }
        Self::export_default_dir()
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Layout engine options as configured, with the given direction taking
    /// precedence over the stored default when provided.
    pub fn layout_options(&self, direction: Option<Direction>) -> LayoutOptions {
        LayoutOptions {
            direction: direction.unwrap_or(self.layout_direction),
            rank_spacing: self.layout_rank_spacing,
            node_spacing: self.layout_node_spacing,
        }
    }

    fn default_autosave_debounce_ms() -> u64 { 750 }
    fn default_rank_spacing() -> f32 { 100.0 }
    fn default_node_spacing() -> f32 { 70.0 }
}
