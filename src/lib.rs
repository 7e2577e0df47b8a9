//! Bezier Racing - procedural racetracks for a top-down driving environment
//!
//! Core modules:
//! - `sim`: Deterministic track generation, contact tracking, reward and termination
//! - `env`: Reset/step facade owning the RNG, world, vehicle and episode state
//! - `settings`: Construction-time generation parameters
//! - `racetracks`: Preloaded control-point tracks
//! - `palette`: Road and background colors (optionally domain randomized)

pub mod env;
pub mod error;
pub mod palette;
pub mod racetracks;
pub mod settings;
pub mod sim;

pub use env::{CarRacing, ResetOptions};
pub use error::{EnvError, GenerationError, SettingsError};
pub use settings::{EnvSettings, TrackMode};

use glam::Vec2;

/// Environment configuration constants
pub mod consts {
    /// Track scale
    pub const SCALE: f32 = 6.0;
    /// Track is a heavily morphed circle with this radius
    pub const TRACK_RAD: f32 = 900.0 / SCALE;
    /// Game over boundary (half extent on each axis)
    pub const PLAYFIELD: f32 = 2000.0 / SCALE;

    /// Simulation ticks per second
    pub const FPS: f32 = 50.0;
    /// Fixed simulation timestep
    pub const SIM_DT: f32 = 1.0 / FPS;

    /// Cursor advance per polar-mode sample
    pub const TRACK_DETAIL_STEP: f32 = 21.0 / SCALE;
    /// Maximum heading change per polar-mode sample (radians)
    pub const TRACK_TURN_RATE: f32 = 0.31;
    /// Half width of the road
    pub const TRACK_WIDTH: f32 = 40.0 / SCALE;
    /// Width of the hazard stripe outside the road on hard turns
    pub const BORDER: f32 = 8.0 / SCALE;
    /// Consecutive same-direction sharp deltas needed to flag a border
    pub const BORDER_MIN_COUNT: usize = 4;
    /// A track with fewer points than this is rejected
    pub const MIN_TRACK_POINTS: usize = 3;

    /// Total reward for visiting every tile once
    pub const LAP_REWARD: f32 = 1000.0;
    /// Reward subtracted every tick an action is applied
    pub const STEP_PENALTY: f32 = 0.1;
    /// Reward for leaving the playfield
    pub const OUT_OF_BOUNDS_REWARD: f32 = -100.0;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Convert cartesian (x, y) to polar (r, theta)
#[inline]
pub fn cartesian_to_polar(pos: Vec2) -> (f32, f32) {
    (pos.length(), pos.y.atan2(pos.x))
}

/// Unit vector pointing along `angle`
#[inline]
pub fn unit(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_normalize_angle_wraps() {
        assert!((normalize_angle(3.0 * PI + 0.1) - (-PI + 0.1)).abs() < 1e-5);
        assert!((normalize_angle(3.0 * PI).abs() - PI).abs() < 1e-5);
        assert!((normalize_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-6);
        assert!((normalize_angle(2.5 * PI) - PI / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_polar_roundtrip_angle() {
        let p = polar_to_cartesian(10.0, 0.75);
        let (r, theta) = cartesian_to_polar(p);
        assert!((r - 10.0).abs() < 1e-4);
        assert!((theta - 0.75).abs() < 1e-5);
    }
}
