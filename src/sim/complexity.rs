//! Geometric complexity of a closed track
//!
//! Pure function of the point sequence. Callers that want it cached keep
//! the result themselves.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::normalize_angle;

/// Turns smaller than this (radians) do not count toward inflections
const INFLECTION_EPS: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complexity {
    /// Closed polyline length
    pub length: f32,
    /// Sum of absolute heading changes (radians)
    pub total_turning: f32,
    /// Turning per unit length
    pub mean_curvature: f32,
    /// Largest single-vertex heading change (radians)
    pub max_turn: f32,
    /// Changes of turn direction around the loop
    pub inflections: usize,
    /// Net signed turning over 2π; ±1 for a simple loop
    pub turning_number: f32,
}

/// Compute the complexity descriptor of a closed point sequence
///
/// Zero-length segments are skipped. Fewer than three distinct points yield
/// the default (all zero) descriptor.
pub fn complexity(points: impl IntoIterator<Item = Vec2>) -> Complexity {
    let mut pts: Vec<Vec2> = Vec::new();
    for p in points {
        if pts.last().is_none_or(|last: &Vec2| last.distance_squared(p) > 0.0) {
            pts.push(p);
        }
    }
    if pts.len() > 1 && pts[0].distance_squared(pts[pts.len() - 1]) == 0.0 {
        pts.pop();
    }
    if pts.len() < 3 {
        return Complexity::default();
    }

    let n = pts.len();
    let segments: Vec<Vec2> = (0..n).map(|i| pts[(i + 1) % n] - pts[i]).collect();
    let length: f32 = segments.iter().map(|s| s.length()).sum();

    let turns: Vec<f32> = (0..n)
        .map(|i| {
            let a = segments[(i + n - 1) % n];
            let b = segments[i];
            normalize_angle(b.y.atan2(b.x) - a.y.atan2(a.x))
        })
        .collect();

    let total_turning: f32 = turns.iter().map(|t| t.abs()).sum();
    let max_turn = turns.iter().fold(0.0f32, |m, t| m.max(t.abs()));
    let net: f32 = turns.iter().sum();

    let signs: Vec<f32> = turns
        .iter()
        .filter(|t| t.abs() > INFLECTION_EPS)
        .map(|t| t.signum())
        .collect();
    let inflections = (0..signs.len())
        .filter(|&i| signs[i] != signs[(i + 1) % signs.len()])
        .count();

    Complexity {
        length,
        total_turning,
        mean_curvature: if length > 0.0 { total_turning / length } else { 0.0 },
        max_turn,
        inflections,
        turning_number: net / std::f32::consts::TAU,
    }
}
