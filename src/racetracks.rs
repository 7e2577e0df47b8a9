//! Preloaded racetracks
//!
//! A preloaded track is a dense point list that replaces Bezier curve
//! evaluation, plus the playfield bounds and zoom it was authored for.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::SCALE;
use crate::error::SettingsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadedTrack {
    pub name: String,
    /// Curve samples in world units
    pub xy: Vec<[f32; 2]>,
    /// Playfield half extent in pixels (world units times SCALE)
    pub bounds: f32,
    /// Birdseye zoom for rendering
    #[serde(default = "default_full_zoom")]
    pub full_zoom: f32,
}

fn default_full_zoom() -> f32 {
    0.25
}

impl PreloadedTrack {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let track: Self = serde_json::from_str(json)?;
        if track.xy.len() < 3 {
            return Err(SettingsError::Invalid(format!(
                "track `{}` has {} points, need at least 3",
                track.name,
                track.xy.len()
            )));
        }
        if !(track.bounds > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "track `{}` has non-positive bounds {}",
                track.name, track.bounds
            )));
        }
        Ok(track)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let track = Self::from_json(&json)?;
        log::info!(
            "Loaded track `{}` ({} points) from {}",
            track.name,
            track.xy.len(),
            path.as_ref().display()
        );
        Ok(track)
    }

    pub fn points(&self) -> Vec<Vec2> {
        self.xy.iter().map(|&[x, y]| Vec2::new(x, y)).collect()
    }

    /// Out-of-bounds threshold in world units
    pub fn playfield(&self) -> f32 {
        self.bounds / SCALE
    }
}
