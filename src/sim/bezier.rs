//! Closed Bezier curves through a ring of anchor points
//!
//! Anchors are sorted clockwise around their centroid, each anchor
//! gets a tangent angle blended from its incoming and outgoing chords, and
//! consecutive anchors are joined by cubic segments whose inner control
//! points lie along those tangents.

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Corner roundedness used for generated tracks
pub const DEFAULT_ROUNDEDNESS: f32 = 0.2;
/// Edge sharpness used for generated tracks
pub const DEFAULT_EDGE_SHARPNESS: f32 = 0.2;
/// Samples per cubic segment
pub const DEFAULT_SAMPLES_PER_SEGMENT: usize = 40;

/// Redraws allowed while looking for well separated control points
const MAX_SAMPLE_DRAWS: usize = 200;

/// An anchor with its blended tangent angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub pos: Vec2,
    pub angle: f32,
}

/// Evaluated curve
#[derive(Debug, Clone)]
pub struct BezierCurve {
    /// Dense samples; segment joints appear twice
    pub points: Vec<Vec2>,
    /// Sorted, closed anchor ring (first anchor repeated last)
    pub anchors: Vec<Anchor>,
}

/// Sort points clockwise around their centroid, starting from the -x side
pub fn sort_around_centroid(points: &mut [Vec2]) {
    if points.is_empty() {
        return;
    }
    let centroid = points.iter().copied().sum::<Vec2>() / points.len() as f32;
    points.sort_by(|a, b| {
        let da = *a - centroid;
        let db = *b - centroid;
        da.x.atan2(da.y)
            .partial_cmp(&db.x.atan2(db.y))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Smallest distance between consecutive points of a closed ring
fn min_ring_gap(points: &[Vec2]) -> f32 {
    (0..points.len())
        .map(|i| points[i].distance(points[(i + 1) % points.len()]))
        .fold(f32::INFINITY, f32::min)
}

/// Draw `count` anchors inside a disc of diameter `scale` centered on the origin
///
/// Points come back sorted around their centroid. Draws repeat until consecutive
/// anchors are at least `0.7 / count * scale` apart; once the draw budget is
/// spent the last draw is kept as long as no two anchors coincide.
pub fn sample_random_control_points<R: Rng + ?Sized>(
    count: usize,
    scale: f32,
    rng: &mut R,
) -> Result<Vec<Vec2>, GenerationError> {
    if count < 3 {
        return Err(GenerationError::DegenerateCurve(format!(
            "need at least 3 control points, got {count}"
        )));
    }
    let radius = scale / 2.0;
    let min_gap = 0.7 / count as f32 * scale;

    let mut points = Vec::with_capacity(count);
    for _ in 0..MAX_SAMPLE_DRAWS {
        points.clear();
        for _ in 0..count {
            let r = radius * rng.random::<f32>().sqrt();
            let theta = rng.random_range(0.0..TAU);
            points.push(Vec2::new(r * theta.cos(), r * theta.sin()));
        }
        sort_around_centroid(&mut points);
        if min_ring_gap(&points) >= min_gap {
            return Ok(points);
        }
    }

    if min_ring_gap(&points) > f32::EPSILON {
        log::debug!("control point spacing below {min_gap} after {MAX_SAMPLE_DRAWS} draws");
        Ok(points)
    } else {
        Err(GenerationError::DegenerateCurve(
            "coincident control points".to_string(),
        ))
    }
}

/// Wrap an angle into [0, 2π)
#[inline]
fn positive_angle(angle: f32) -> f32 {
    if angle < 0.0 { angle + TAU } else { angle }
}

fn cubic(p: [Vec2; 4], t: f32) -> Vec2 {
    let u = 1.0 - t;
    p[0] * (u * u * u) + p[1] * (3.0 * u * u * t) + p[2] * (3.0 * u * t * t) + p[3] * (t * t * t)
}

/// Evaluate a closed curve through `control_points`
///
/// `roundedness` scales the tangent handles relative to each chord;
/// `edge_sharpness` biases each anchor tangent toward the outgoing chord.
pub fn evaluate_bezier(
    control_points: &[Vec2],
    roundedness: f32,
    edge_sharpness: f32,
    samples_per_segment: usize,
) -> Result<BezierCurve, GenerationError> {
    if control_points.len() < 3 {
        return Err(GenerationError::DegenerateCurve(format!(
            "need at least 3 control points, got {}",
            control_points.len()
        )));
    }
    if control_points.iter().any(|p| !p.is_finite()) {
        return Err(GenerationError::DegenerateCurve(
            "non-finite control point".to_string(),
        ));
    }
    if samples_per_segment < 2 {
        return Err(GenerationError::DegenerateCurve(format!(
            "need at least 2 samples per segment, got {samples_per_segment}"
        )));
    }

    let mut ring = control_points.to_vec();
    sort_around_centroid(&mut ring);
    ring.push(ring[0]);

    // Chord angle leaving each anchor
    let chord: Vec<f32> = ring
        .windows(2)
        .map(|w| {
            let d = w[1] - w[0];
            positive_angle(d.y.atan2(d.x))
        })
        .collect();

    let p = edge_sharpness.atan() / PI + 0.5;
    let n = chord.len();
    let mut angles: Vec<f32> = (0..n)
        .map(|i| {
            let outgoing = chord[i];
            let incoming = chord[(i + n - 1) % n];
            let flip = if (incoming - outgoing).abs() > PI { PI } else { 0.0 };
            p * outgoing + (1.0 - p) * incoming + flip
        })
        .collect();
    angles.push(angles[0]);

    let anchors: Vec<Anchor> = ring
        .iter()
        .zip(&angles)
        .map(|(&pos, &angle)| Anchor { pos, angle })
        .collect();

    let mut points = Vec::with_capacity(n * samples_per_segment);
    for pair in anchors.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let reach = roundedness * a.pos.distance(b.pos);
        let handles = [
            a.pos,
            a.pos + Vec2::new(a.angle.cos(), a.angle.sin()) * reach,
            b.pos + Vec2::new((b.angle + PI).cos(), (b.angle + PI).sin()) * reach,
            b.pos,
        ];
        let last = (samples_per_segment - 1) as f32;
        points.extend((0..samples_per_segment).map(|i| cubic(handles, i as f32 / last)));
    }

    Ok(BezierCurve { points, anchors })
}
