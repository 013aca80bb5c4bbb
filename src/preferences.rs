//! Presentation preferences handed through to the external renderer.
//!
//! Nothing in the ingestion path reads these values. They live next to the
//! session so the UI and the renderer share one explicit, validated copy.

use std::{fmt::Display, str::FromStr};

use crate::error::PreferenceError;

pub const MIN_LIGHT_INTENSITY: f32 = 0.0;
pub const MAX_LIGHT_INTENSITY: f32 = 2.0;
/// Granularity of the intensity slider.
pub const LIGHT_INTENSITY_STEP: f32 = 0.1;

/// HDR environment presets understood by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EnvironmentPreset {
    #[default]
    City,
    Sunset,
    Dawn,
    Night,
    Warehouse,
    Forest,
    Apartment,
    Studio,
    Park,
    Lobby,
}

impl EnvironmentPreset {
    pub const ALL: [EnvironmentPreset; 10] = [
        EnvironmentPreset::City,
        EnvironmentPreset::Sunset,
        EnvironmentPreset::Dawn,
        EnvironmentPreset::Night,
        EnvironmentPreset::Warehouse,
        EnvironmentPreset::Forest,
        EnvironmentPreset::Apartment,
        EnvironmentPreset::Studio,
        EnvironmentPreset::Park,
        EnvironmentPreset::Lobby,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentPreset::City => "city",
            EnvironmentPreset::Sunset => "sunset",
            EnvironmentPreset::Dawn => "dawn",
            EnvironmentPreset::Night => "night",
            EnvironmentPreset::Warehouse => "warehouse",
            EnvironmentPreset::Forest => "forest",
            EnvironmentPreset::Apartment => "apartment",
            EnvironmentPreset::Studio => "studio",
            EnvironmentPreset::Park => "park",
            EnvironmentPreset::Lobby => "lobby",
        }
    }
}

impl FromStr for EnvironmentPreset {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == name)
            .ok_or_else(|| PreferenceError::UnknownPreset(s.to_string()))
    }
}

impl Display for EnvironmentPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lighting, environment, grid and shadow settings for the viewport.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenePreferences {
    pub environment: EnvironmentPreset,
    light_intensity: f32,
    pub show_grid: bool,
    pub show_shadow: bool,
}

impl ScenePreferences {
    pub fn new() -> Self {
        Self {
            environment: EnvironmentPreset::default(),
            light_intensity: 1.0,
            show_grid: true,
            show_shadow: true,
        }
    }

    pub fn light_intensity(&self) -> f32 {
        self.light_intensity
    }

    pub fn set_light_intensity(&mut self, intensity: f32) -> Result<(), PreferenceError> {
        if !intensity.is_finite() || !(MIN_LIGHT_INTENSITY..=MAX_LIGHT_INTENSITY).contains(&intensity) {
            return Err(PreferenceError::IntensityOutOfRange(intensity));
        }
        self.light_intensity = intensity;
        Ok(())
    }

    /// Parses and applies a preset name coming from the UI.
    pub fn set_environment(&mut self, name: &str) -> Result<(), PreferenceError> {
        self.environment = name.parse()?;
        Ok(())
    }

    pub fn toggle_grid(&mut self) -> bool {
        self.show_grid = !self.show_grid;
        self.show_grid
    }

    pub fn toggle_shadow(&mut self) -> bool {
        self.show_shadow = !self.show_shadow;
        self.show_shadow
    }
}

impl Default for ScenePreferences {
    fn default() -> Self {
        Self::new()
    }
}
