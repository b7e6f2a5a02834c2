//! Tunables, themes, and persisted settings.
//!
//! [`Settings`] round-trips through a pretty-printed JSON file next to the
//! executable. Loading tolerates missing fields (they fall back to defaults)
//! and a corrupt file (the whole struct falls back), so a hand-edited or
//! older file never prevents startup.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wyrm_render::coords::Color;

// ── global constants ──────────────────────────────────────────────────────

pub const WINDOW_W: u32 = 1920;
pub const WINDOW_H: u32 = 1080;
pub const GRID_W: u32 = 24;
pub const GRID_H: u32 = 24;
pub const CELL_PADDING: f32 = 0.05;

/// Seconds per simulation step during play.
pub const TICK: f32 = 0.16;
/// Seconds per step for the menu background preview.
pub const PREVIEW_TICK: f32 = 0.16;

pub const SETTINGS_PATH: &str = "settings.json";
pub const SAVE_PATH: &str = "savegame.json";
pub const DIRT_PATH: &str = "assets/dirt.jpg";

/// Selectable window resolutions. One entry today; the settings screen
/// cycles through this list.
pub const RESOLUTIONS: &[(u32, u32)] = &[(1920, 1080)];

// ── themes ────────────────────────────────────────────────────────────────

/// A named color palette. Every drawable surface the game styles pulls its
/// color from here.
pub struct Theme {
    pub name: &'static str,
    pub snake: Color,
    pub apple: Color,
    pub border: Color,
    pub title: Color,
    pub menu_text: Color,
    pub menu_text_selected: Color,
    pub menu_highlight_rect: Color,
}

pub const THEMES: &[Theme] = &[
    Theme {
        name: "Classic Green",
        snake: Color::new(0.15, 0.95, 0.2, 1.0),
        apple: Color::new(0.95, 0.15, 0.15, 1.0),
        border: Color::new(1.0, 1.0, 1.0, 0.06),
        title: Color::new(1.0, 0.96, 0.51, 1.0),
        menu_text: Color::new(0.7, 0.7, 0.7, 1.0),
        menu_text_selected: Color::new(1.0, 0.96, 0.51, 1.0),
        menu_highlight_rect: Color::new(1.0, 0.9, 0.6, 0.15),
    },
    Theme {
        name: "Cyberpunk",
        snake: Color::new(0.0, 0.8, 0.8, 1.0),
        apple: Color::new(1.0, 0.0, 0.9, 1.0),
        border: Color::new(0.2, 0.0, 0.2, 0.15),
        title: Color::new(0.0, 1.0, 1.0, 1.0),
        menu_text: Color::new(0.0, 0.8, 0.8, 1.0),
        menu_text_selected: Color::new(1.0, 0.0, 0.9, 1.0),
        menu_highlight_rect: Color::new(1.0, 0.0, 0.9, 0.25),
    },
    Theme {
        name: "Monochrome",
        snake: Color::new(0.7, 0.7, 0.7, 1.0),
        apple: Color::new(1.0, 1.0, 1.0, 1.0),
        border: Color::new(0.2, 0.2, 0.2, 0.1),
        title: Color::new(1.0, 1.0, 1.0, 1.0),
        menu_text: Color::new(0.5, 0.5, 0.5, 1.0),
        menu_text_selected: Color::new(1.0, 1.0, 1.0, 1.0),
        menu_highlight_rect: Color::new(1.0, 1.0, 1.0, 0.15),
    },
];

/// Looks up a theme by name, falling back to the first theme for unknown
/// names (e.g. a settings file written by a build with different themes).
pub fn theme(name: &str) -> &'static Theme {
    THEMES
        .iter()
        .find(|t| t.name == name)
        .unwrap_or(&THEMES[0])
}

/// Returns the theme name `step` entries away from `current`, wrapping.
pub fn cycle_theme(current: &str, step: i32) -> &'static str {
    let len = THEMES.len() as i32;
    let idx = THEMES
        .iter()
        .position(|t| t.name == current)
        .unwrap_or(0) as i32;
    THEMES[(idx + step).rem_euclid(len) as usize].name
}

/// Returns the resolution `step` entries away from `current`, wrapping.
/// Unknown resolutions snap to the first entry.
pub fn cycle_resolution(current: (u32, u32), step: i32) -> (u32, u32) {
    let len = RESOLUTIONS.len() as i32;
    let idx = RESOLUTIONS
        .iter()
        .position(|r| *r == current)
        .unwrap_or(0) as i32;
    RESOLUTIONS[(idx + step).rem_euclid(len) as usize]
}

// ── persisted settings ────────────────────────────────────────────────────

/// User-facing options persisted across runs.
///
/// `#[serde(default)]` backfills fields missing from an older settings file
/// with the values from [`Settings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub vsync: bool,
    pub bloom: bool,
    pub use_kawase: bool,
    pub shake_on_death: bool,
    pub bloom_strength: f32,
    pub bloom_radius: f32,
    pub exposure: f32,
    pub fullscreen: bool,
    pub resolution: (u32, u32),
    pub chroma_enabled: bool,
    pub chroma_amount: f32,
    pub chroma_bias: f32,
    pub color_theme: String,
    pub high_score: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vsync: true,
            bloom: true,
            use_kawase: false,
            shake_on_death: true,
            bloom_strength: 0.9,
            bloom_radius: 2.0,
            exposure: 1.0,
            fullscreen: false,
            resolution: RESOLUTIONS[0],
            chroma_enabled: true,
            chroma_amount: 0.02,
            chroma_bias: 1.0,
            color_theme: THEMES[0].name.to_owned(),
            high_score: 0,
        }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file is normal (first run);
    /// an unreadable or corrupt file logs a warning. Both fall back to
    /// defaults rather than failing startup.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(settings) => settings,
                Err(err) => {
                    log::warn!(
                        "settings file {} is corrupt, using defaults: {err}",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                log::warn!("failed to read settings file {}: {err}", path.display());
                Self::default()
            }
        }
    }

    /// Writes settings to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, text)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    pub fn theme(&self) -> &'static Theme {
        theme(&self.color_theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ──────────────────────────────────────────────────────────

    #[test]
    fn defaults_match_shipping_values() {
        let s = Settings::default();
        assert!(s.vsync);
        assert!(s.bloom);
        assert!(!s.use_kawase);
        assert!(s.shake_on_death);
        assert_eq!(s.bloom_strength, 0.9);
        assert_eq!(s.bloom_radius, 2.0);
        assert_eq!(s.exposure, 1.0);
        assert!(!s.fullscreen);
        assert_eq!(s.resolution, (1920, 1080));
        assert!(s.chroma_enabled);
        assert_eq!(s.chroma_amount, 0.02);
        assert_eq!(s.chroma_bias, 1.0);
        assert_eq!(s.color_theme, "Classic Green");
        assert_eq!(s.high_score, 0);
    }

    // ── serde tolerance ───────────────────────────────────────────────────

    #[test]
    fn partial_file_backfills_missing_fields() {
        let s: Settings = serde_json::from_str(r#"{"vsync": false, "high_score": 42}"#)
            .expect("partial settings should deserialize");
        assert!(!s.vsync);
        assert_eq!(s.high_score, 42);
        assert!(s.bloom);
        assert_eq!(s.color_theme, "Classic Green");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let s: Settings = serde_json::from_str(r#"{"bloom": false, "legacy_option": 3}"#)
            .expect("unknown fields should be skipped");
        assert!(!s.bloom);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let s = Settings::load("/nonexistent/wyrm/settings.json");
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = std::env::temp_dir().join(format!(
            "wyrm-settings-roundtrip-{}.json",
            std::process::id()
        ));
        let mut s = Settings::default();
        s.vsync = false;
        s.bloom_strength = 1.3;
        s.color_theme = "Cyberpunk".to_owned();
        s.high_score = 17;
        s.save(&path).expect("save should succeed");
        let loaded = Settings::load(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, s);
    }

    // ── themes ────────────────────────────────────────────────────────────

    #[test]
    fn unknown_theme_falls_back_to_first() {
        assert_eq!(theme("Does Not Exist").name, "Classic Green");
    }

    #[test]
    fn theme_cycle_wraps_both_ways() {
        assert_eq!(cycle_theme("Classic Green", 1), "Cyberpunk");
        assert_eq!(cycle_theme("Cyberpunk", 1), "Monochrome");
        assert_eq!(cycle_theme("Monochrome", 1), "Classic Green");
        assert_eq!(cycle_theme("Classic Green", -1), "Monochrome");
    }

    #[test]
    fn resolution_cycle_wraps() {
        assert_eq!(cycle_resolution((1920, 1080), 1), (1920, 1080));
        assert_eq!(cycle_resolution((640, 480), 1), RESOLUTIONS[0]);
    }
}
