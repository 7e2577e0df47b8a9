//! Environment settings
//!
//! Construction-time generation and reward parameters. Immutable for an
//! environment instance; loadable from a JSON document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Track generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    /// Closed Bezier curve through control points
    #[default]
    Bezier,
    /// Cursor marched around a ring of checkpoints
    Polar,
}

impl TrackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackMode::Bezier => "bezier",
            TrackMode::Polar => "polar",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bezier" => Some(TrackMode::Bezier),
            "polar" | "checkpoints" => Some(TrackMode::Polar),
            _ => None,
        }
    }
}

/// Environment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    // === Track generation ===
    pub mode: TrackMode,
    /// Bezier anchors or polar checkpoints
    pub n_control_points: usize,
    /// Emit hazard stripes on hard turns
    pub show_borders: bool,
    /// Polar checkpoint radius range, as fractions of TRACK_RAD
    pub min_rad_ratio: f32,
    pub max_rad_ratio: f32,
    /// Polar attempts with the requested checkpoints before the fresh final attempt
    pub polar_attempts: u32,
    /// Polar border threshold as a fraction of TRACK_TURN_RATE
    pub border_turn_fraction: f32,
    /// Preloaded track document (Bezier mode only)
    pub track_file: Option<PathBuf>,

    // === Episode ===
    /// Fraction of tiles to visit before re-entering tile 0 completes a lap
    pub lap_complete_percent: f32,
    /// Continuous (steer, gas, brake) or discrete 0..=4 actions
    pub continuous: bool,
    /// Symmetric clamp on the revealed reward
    pub clip_reward: Option<f32>,

    // === Sparse rewards ===
    pub sparse_rewards: bool,
    pub num_goal_bins: u32,
    /// Tiles near the finish where bin 0 (and near the start where the last bin) cannot trigger
    pub goal_guard_distance: usize,

    // === Randomness ===
    pub seed: Option<u64>,
    /// Reseed with `seed` on every reset so each episode sees the same track
    pub fixed_environment: bool,
    /// Randomize road and background colors
    pub domain_randomize: bool,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            mode: TrackMode::Bezier,
            n_control_points: 12,
            show_borders: true,
            min_rad_ratio: 0.333_333_34,
            max_rad_ratio: 1.0,
            polar_attempts: 10,
            border_turn_fraction: 0.2,
            track_file: None,

            lap_complete_percent: 0.95,
            continuous: true,
            clip_reward: None,

            sparse_rewards: false,
            num_goal_bins: 24,
            goal_guard_distance: 10,

            seed: None,
            fixed_environment: false,
            domain_randomize: false,
        }
    }
}

impl EnvSettings {
    /// Default settings with the given generation mode
    pub fn with_mode(mode: TrackMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.n_control_points < 3 {
            return Err(SettingsError::Invalid(format!(
                "n_control_points must be at least 3, got {}",
                self.n_control_points
            )));
        }
        if !(self.lap_complete_percent > 0.0 && self.lap_complete_percent <= 1.0) {
            return Err(SettingsError::Invalid(format!(
                "lap_complete_percent must be in (0, 1], got {}",
                self.lap_complete_percent
            )));
        }
        if !(self.min_rad_ratio > 0.0 && self.min_rad_ratio <= self.max_rad_ratio) {
            return Err(SettingsError::Invalid(format!(
                "radius ratios must satisfy 0 < min <= max, got {}..{}",
                self.min_rad_ratio, self.max_rad_ratio
            )));
        }
        if self.sparse_rewards && self.num_goal_bins < 2 {
            return Err(SettingsError::Invalid(format!(
                "sparse rewards need at least 2 goal bins, got {}",
                self.num_goal_bins
            )));
        }
        if let Some(bound) = self.clip_reward {
            if bound < 0.0 {
                return Err(SettingsError::Invalid(format!(
                    "clip_reward must be non-negative, got {bound}"
                )));
            }
        }
        Ok(())
    }

    /// Effective clip bound; zero disables clipping
    pub fn effective_clip(&self) -> Option<f32> {
        self.clip_reward.filter(|b| *b > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EnvSettings::default().validate().is_ok());
        assert!(EnvSettings::with_mode(TrackMode::Polar).validate().is_ok());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(TrackMode::from_str("Polar"), Some(TrackMode::Polar));
        assert_eq!(TrackMode::from_str("BEZIER"), Some(TrackMode::Bezier));
        assert_eq!(TrackMode::from_str("spline"), None);
        assert_eq!(TrackMode::Polar.as_str(), "polar");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings =
            EnvSettings::from_json(r#"{"mode": "polar", "sparse_rewards": true}"#).unwrap();
        assert_eq!(settings.mode, TrackMode::Polar);
        assert!(settings.sparse_rewards);
        assert_eq!(settings.num_goal_bins, 24);
        assert_eq!(settings.n_control_points, 12);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = EnvSettings::from_json(r#"{"n_control_points": 2}"#);
        assert!(matches!(err, Err(SettingsError::Invalid(_))));

        let err = EnvSettings::from_json(r#"{"sparse_rewards": true, "num_goal_bins": 1}"#);
        assert!(matches!(err, Err(SettingsError::Invalid(_))));

        let err = EnvSettings::from_json(r#"{"mode": 3}"#);
        assert!(matches!(err, Err(SettingsError::Json(_))));
    }

    #[test]
    fn test_zero_clip_disables_clipping() {
        let mut settings = EnvSettings::default();
        settings.clip_reward = Some(0.0);
        assert_eq!(settings.effective_clip(), None);
        settings.clip_reward = Some(5.0);
        assert_eq!(settings.effective_clip(), Some(5.0));
    }
}
