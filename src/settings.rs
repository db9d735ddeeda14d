//! Persisted application configuration.
//!
//! Stored as plain `key=value` lines.  Unknown keys are ignored and bad values
//! fall back to defaults, so a corrupt file never stops the app from starting.
//! Selections are deliberately *not* stored here.

use std::path::PathBuf;

use image::Rgb;

use crate::assets::{AssetLayout, DEFAULT_ASSET_EXTENSION};
use crate::compositor::DEFAULT_CANVAS_SIZE;
use crate::log_warn;
use crate::selection::{DEFAULT_BACKGROUND_COLOR, format_hex_color, parse_hex_color};

/// Largest canvas edge accepted from config or CLI.
pub const MAX_CANVAS_SIZE: u32 = 4096;

#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Directory holding `{category}/{option}.{ext}` images.
    pub asset_root: PathBuf,
    pub canvas_size: u32,
    pub full_extension: String,
    pub preview_extension: String,
    pub default_background_color: Rgb<u8>,
    /// Directory the save dialog opens in.
    pub last_export_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("pfp"),
            canvas_size: DEFAULT_CANVAS_SIZE,
            full_extension: DEFAULT_ASSET_EXTENSION.to_string(),
            preview_extension: DEFAULT_ASSET_EXTENSION.to_string(),
            default_background_color: DEFAULT_BACKGROUND_COLOR,
            last_export_dir: None,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pfp-composer/pfp_composer_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PfpComposer\pfp_composer_settings.cfg
    /// On macOS:   ~/Library/Application Support/PfpComposer/pfp_composer_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        let dir = config_dir()?;
        let _ = std::fs::create_dir_all(&dir);
        Some(dir.join("pfp_composer_settings.cfg"))
    }

    pub fn asset_layout(&self) -> AssetLayout {
        AssetLayout {
            full_extension: self.full_extension.clone(),
            preview_extension: self.preview_extension.clone(),
        }
    }

    /// Clamp a requested canvas edge to `1..=MAX_CANVAS_SIZE`.
    pub fn clamp_canvas_size(size: u32) -> u32 {
        size.clamp(1, MAX_CANVAS_SIZE)
    }

    pub fn to_config_string(&self) -> String {
        let mut content = format!(
            "asset_root={}\n\
             canvas_size={}\n\
             full_extension={}\n\
             preview_extension={}\n\
             default_background_color={}\n",
            self.asset_root.display(),
            self.canvas_size,
            self.full_extension,
            self.preview_extension,
            format_hex_color(self.default_background_color),
        );
        if let Some(dir) = &self.last_export_dir {
            content.push_str(&format!("last_export_dir={}\n", dir.display()));
        }
        content
    }

    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "asset_root" if !val.is_empty() => s.asset_root = PathBuf::from(val),
                "canvas_size" => {
                    s.canvas_size = val
                        .parse()
                        .map(Self::clamp_canvas_size)
                        .unwrap_or(DEFAULT_CANVAS_SIZE);
                }
                "full_extension" if !val.is_empty() => s.full_extension = val.to_string(),
                "preview_extension" if !val.is_empty() => s.preview_extension = val.to_string(),
                "default_background_color" => {
                    if let Some(c) = parse_hex_color(val) {
                        s.default_background_color = c;
                    }
                }
                "last_export_dir" if !val.is_empty() => {
                    s.last_export_dir = Some(PathBuf::from(val));
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            log_warn!("Could not write settings {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
        return Some(PathBuf::from(appdata).join("PfpComposer"));
    }
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").ok()?;
        return Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("PfpComposer"),
        );
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .ok()?;
        Some(base.join("pfp-composer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text() {
        let s = AppSettings {
            asset_root: PathBuf::from("/srv/pfp"),
            canvas_size: 512,
            full_extension: "png".into(),
            preview_extension: "webp".into(),
            default_background_color: Rgb([1, 2, 3]),
            last_export_dir: Some(PathBuf::from("/tmp/out")),
        };
        assert_eq!(AppSettings::from_config_str(&s.to_config_string()), s);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let s = AppSettings::from_config_str(
            "canvas_size=huge\n\
             default_background_color=blue\n\
             no equals sign here\n\
             mystery_key=1\n\
             asset_root=\n",
        );
        assert_eq!(s, AppSettings::default());
    }

    #[test]
    fn canvas_size_is_clamped() {
        assert_eq!(AppSettings::from_config_str("canvas_size=0").canvas_size, 1);
        assert_eq!(AppSettings::from_config_str("canvas_size=100000").canvas_size, MAX_CANVAS_SIZE);
    }

    #[test]
    fn comments_are_skipped() {
        let s = AppSettings::from_config_str("# canvas_size=10\ncanvas_size=300");
        assert_eq!(s.canvas_size, 300);
    }
}
