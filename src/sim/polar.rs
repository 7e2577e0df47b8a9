//! Polar-mode track marching
//!
//! A cursor starts on the first checkpoint and walks forward in fixed steps,
//! steering toward the next checkpoint around the origin. After a few laps
//! the path settles into a loop; the last full lap between two crossings of
//! the start angle becomes the track.

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::track::TrackPoint;
use crate::consts::{MIN_TRACK_POINTS, SCALE, TRACK_DETAIL_STEP, TRACK_RAD, TRACK_TURN_RATE};
use crate::error::GenerationError;
use crate::{cartesian_to_polar, polar_to_cartesian};

/// Forward march iteration ceiling
pub const MARCH_WATCHDOG: usize = 2500;
/// March stops once the cursor has completed more laps than this
const MAX_LAPS: u32 = 4;
/// Pinned radius of the first and last checkpoint, as a multiple of TRACK_RAD
const PINNED_RADIUS: f32 = 1.5;
/// Scaled lateral error below which the cursor holds its heading
const STEER_DEADBAND: f32 = 0.3;
/// Heading correction per unit of scaled lateral error
const STEER_GAIN: f32 = 0.001;

/// Polar-mode waypoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Angle around the origin in [0, 2π)
    pub alpha: f32,
    pub x: f32,
    pub y: f32,
}

impl Checkpoint {
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Angle the closed-loop scan looks for: half a checkpoint gap before zero
pub fn start_alpha(count: usize) -> f32 {
    -PI / count as f32
}

/// Draw a ring of checkpoints with radii in `[min_rad, max_rad]`
///
/// The first and last checkpoints are pinned far out at angle 0 and
/// `2π(n-1)/n` so the loop closes strongly across the start line.
pub fn sample_checkpoints<R: Rng + ?Sized>(
    count: usize,
    min_rad: f32,
    max_rad: f32,
    rng: &mut R,
) -> Vec<Checkpoint> {
    let gap = TAU / count as f32;
    (0..count)
        .map(|c| {
            let noise = rng.random_range(0.0..gap);
            let mut alpha = gap * c as f32 + noise;
            let mut rad = rng.random_range(min_rad..=max_rad);

            if c == 0 {
                alpha = 0.0;
                rad = PINNED_RADIUS * TRACK_RAD;
            }
            if c == count - 1 {
                alpha = gap * c as f32;
                rad = PINNED_RADIUS * TRACK_RAD;
            }

            let p = polar_to_cartesian(rad, alpha);
            Checkpoint {
                alpha,
                x: p.x,
                y: p.y,
            }
        })
        .collect()
}

/// Turn externally supplied positions into checkpoints, keeping their order
pub fn checkpoints_from_points(points: &[Vec2]) -> Vec<Checkpoint> {
    points
        .iter()
        .map(|&p| {
            let (_, theta) = cartesian_to_polar(p);
            Checkpoint {
                alpha: if theta < 0.0 { theta + TAU } else { theta },
                x: p.x,
                y: p.y,
            }
        })
        .collect()
}

/// March the cursor around the checkpoints
///
/// Every sample records the cursor's polar angle (shifted down by 2π while
/// it is past the last checkpoint), the mean heading over the step, and the
/// position after the step.
pub fn march(checkpoints: &[Checkpoint]) -> Result<Vec<TrackPoint>, GenerationError> {
    if checkpoints.is_empty() {
        return Err(GenerationError::DegenerateCurve(
            "no checkpoints to march around".to_string(),
        ));
    }
    if checkpoints
        .iter()
        .any(|c| !(c.alpha.is_finite() && c.x.is_finite() && c.y.is_finite()))
    {
        return Err(GenerationError::DegenerateCurve(
            "non-finite checkpoint".to_string(),
        ));
    }

    let n = checkpoints.len();
    let mut pos = checkpoints[0].pos();
    let mut beta = 0.0f32;
    let mut dest_i = 0usize;
    let mut laps = 0u32;
    let mut visited_other_side = false;
    let mut samples = Vec::with_capacity(MARCH_WATCHDOG);

    for _ in 0..MARCH_WATCHDOG {
        let mut alpha = pos.y.atan2(pos.x);
        if visited_other_side && alpha > 0.0 {
            laps += 1;
            visited_other_side = false;
        }
        if alpha < 0.0 {
            visited_other_side = true;
            alpha += TAU;
        }

        // First checkpoint at or ahead of the cursor, wrapping once per pass
        let dest = loop {
            let mut found = None;
            loop {
                let cp = checkpoints[dest_i % n];
                if alpha <= cp.alpha {
                    found = Some(cp);
                    break;
                }
                dest_i += 1;
                if dest_i % n == 0 {
                    break;
                }
            }
            match found {
                Some(cp) => break cp,
                None => alpha -= TAU,
            }
        };

        let r1 = Vec2::new(beta.cos(), beta.sin());
        let p1 = Vec2::new(-r1.y, r1.x);
        // Lateral error toward the destination
        let proj = r1.dot(dest.pos() - pos) * SCALE;

        while beta - alpha > 1.5 * PI {
            beta -= TAU;
        }
        while beta - alpha < -1.5 * PI {
            beta += TAU;
        }
        let prev_beta = beta;

        if proj > STEER_DEADBAND {
            beta -= TRACK_TURN_RATE.min((STEER_GAIN * proj).abs());
        }
        if proj < -STEER_DEADBAND {
            beta += TRACK_TURN_RATE.min((STEER_GAIN * proj).abs());
        }

        pos += p1 * TRACK_DETAIL_STEP;
        samples.push(TrackPoint {
            alpha,
            beta: prev_beta * 0.5 + beta * 0.5,
            x: pos.x,
            y: pos.y,
        });

        if laps > MAX_LAPS {
            break;
        }
    }

    Ok(samples)
}

/// Cut one closed lap out of the marched samples
///
/// Scans backward for the two most recent upward crossings of
/// `start_alpha`; the samples between them form the loop. The scan visits
/// each sample at most once.
pub fn close_loop(
    samples: &[TrackPoint],
    start_alpha: f32,
) -> Result<Vec<TrackPoint>, GenerationError> {
    let mut end: Option<usize> = None;
    for i in (1..samples.len()).rev() {
        let crosses = samples[i].alpha > start_alpha && samples[i - 1].alpha <= start_alpha;
        if !crosses {
            continue;
        }
        match end {
            None => end = Some(i),
            Some(i2) => {
                let lap = &samples[i..i2 - 1];
                log::debug!(
                    "Track generation: {}..{} -> {}-tiles track",
                    i,
                    i2,
                    lap.len()
                );
                if lap.len() < MIN_TRACK_POINTS {
                    break;
                }
                return Ok(lap.to_vec());
            }
        }
    }
    Err(GenerationError::NoClosedLoopFound {
        samples: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn ring(count: usize) -> Vec<Checkpoint> {
        let mut rng = Pcg32::seed_from_u64(42);
        sample_checkpoints(count, TRACK_RAD / 3.0, TRACK_RAD, &mut rng)
    }

    #[test]
    fn test_checkpoints_are_pinned_and_ordered() {
        let cps = ring(12);
        assert_eq!(cps.len(), 12);
        assert_eq!(cps[0].alpha, 0.0);
        assert!((cps[0].pos().length() - 1.5 * TRACK_RAD).abs() < 1e-3);
        assert!((cps[11].pos().length() - 1.5 * TRACK_RAD).abs() < 1e-3);
        assert!(cps.windows(2).all(|w| w[0].alpha <= w[1].alpha));
        for cp in &cps[1..11] {
            let r = cp.pos().length();
            assert!(r >= TRACK_RAD / 3.0 - 1e-3 && r <= TRACK_RAD + 1e-3);
        }
    }

    #[test]
    fn test_march_is_bounded() {
        let samples = march(&ring(12)).unwrap();
        assert!(!samples.is_empty());
        assert!(samples.len() <= MARCH_WATCHDOG);
        for pair in samples.windows(2) {
            let step = Vec2::new(pair[1].x - pair[0].x, pair[1].y - pair[0].y).length();
            assert!((step - TRACK_DETAIL_STEP).abs() < 1e-3);
        }
    }

    #[test]
    fn test_close_loop_on_circle_samples() {
        // Three laps, each starting just below the start angle; the upward
        // crossings land on indices 1, 61 and 121
        let per_lap = 60;
        let start = start_alpha(12);
        let samples: Vec<TrackPoint> = (0..per_lap * 3)
            .map(|i| {
                let j = (i % per_lap) as f32;
                let alpha = start - 0.05 + j * TAU / per_lap as f32;
                TrackPoint {
                    alpha,
                    beta: 0.0,
                    x: alpha.cos(),
                    y: alpha.sin(),
                }
            })
            .collect();
        let lap = close_loop(&samples, start).unwrap();
        assert_eq!(lap.len(), per_lap - 1);
    }

    #[test]
    fn test_close_loop_fails_without_double_crossing() {
        let samples: Vec<TrackPoint> = (0..50)
            .map(|i| TrackPoint {
                alpha: i as f32 * 0.01,
                beta: 0.0,
                x: 0.0,
                y: 0.0,
            })
            .collect();
        assert!(matches!(
            close_loop(&samples, start_alpha(12)),
            Err(GenerationError::NoClosedLoopFound { samples: 50 })
        ));
        assert!(close_loop(&[], 0.0).is_err());
    }

    #[test]
    fn test_close_loop_needs_two_crossings() {
        // One lap from just below the start angle: a single upward crossing
        let start = start_alpha(12);
        let samples: Vec<TrackPoint> = (0..60)
            .map(|j| TrackPoint {
                alpha: start - 0.05 + j as f32 * TAU / 60.0,
                beta: 0.0,
                x: 0.0,
                y: 0.0,
            })
            .collect();
        assert!(matches!(
            close_loop(&samples, start),
            Err(GenerationError::NoClosedLoopFound { samples: 60 })
        ));
    }

    #[test]
    fn test_march_rejects_bad_checkpoints() {
        assert!(march(&[]).is_err());
        let bad = [Checkpoint {
            alpha: f32::NAN,
            x: 1.0,
            y: 0.0,
        }];
        assert!(matches!(march(&bad), Err(GenerationError::DegenerateCurve(_))));
    }

    #[test]
    fn test_checkpoints_from_points_wraps_angle() {
        let cps = checkpoints_from_points(&[Vec2::new(0.0, -5.0)]);
        assert!((cps[0].alpha - 1.5 * PI).abs() < 1e-5);
    }
}
