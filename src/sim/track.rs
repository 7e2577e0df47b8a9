//! Track generation
//!
//! Turns a Bezier curve or a polar march into an ordered ring of track
//! points, then builds one road tile per point (registered with the world as
//! a static sensor) plus decorative border stripes on hard turns.

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bezier::{
    DEFAULT_EDGE_SHARPNESS, DEFAULT_ROUNDEDNESS, DEFAULT_SAMPLES_PER_SEGMENT, evaluate_bezier,
    sample_random_control_points,
};
use super::complexity::{Complexity, complexity};
use super::polar;
use super::world::{BodyHandle, TileTag, World};
use crate::consts::{
    BORDER, BORDER_MIN_COUNT, MIN_TRACK_POINTS, PLAYFIELD, TRACK_RAD, TRACK_TURN_RATE, TRACK_WIDTH,
};
use crate::error::GenerationError;
use crate::palette::{Palette, Rgb};
use crate::racetracks::PreloadedTrack;
use crate::settings::{EnvSettings, TrackMode};
use crate::{normalize_angle, unit};

/// One sample of the track centerline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Segment angle (Bezier) or polar angle of the marching cursor
    pub alpha: f32,
    /// Edge direction; road edges sit at `±TRACK_WIDTH · (cos β, sin β)`
    pub beta: f32,
    pub x: f32,
    pub y: f32,
}

impl TrackPoint {
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Drivable road segment between a point and its predecessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadTile {
    /// Near-left, near-right, far-right, far-left
    pub vertices: [Vec2; 4],
    pub color: Rgb,
    pub visited: bool,
    pub friction: f32,
    pub index: usize,
    pub body: BodyHandle,
}

/// Red/white hazard stripe outside a hard turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderSegment {
    pub tile_index: usize,
    /// +1 or -1: which road edge the stripe extends from
    pub side: f32,
    pub vertices: [Vec2; 4],
    pub color: Rgb,
}

/// Polygon handed to a renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadPolygon {
    pub vertices: [Vec2; 4],
    pub color: Rgb,
}

/// Mean and standard deviation of consecutive |Δβ|
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TurnStats {
    pub mean: f32,
    pub std: f32,
}

impl TurnStats {
    pub fn of(points: &[TrackPoint]) -> Self {
        let deltas: Vec<f32> = points
            .windows(2)
            .map(|w| normalize_angle(w[1].beta - w[0].beta).abs())
            .collect();
        if deltas.is_empty() {
            return Self::default();
        }
        let n = deltas.len() as f32;
        let mean = deltas.iter().sum::<f32>() / n;
        let var = deltas.iter().map(|d| (d - mean) * (d - mean)).sum::<f32>() / n;
        Self {
            mean,
            std: var.sqrt(),
        }
    }
}

/// Track geometry before it is registered with a world
#[derive(Debug, Clone)]
pub struct TrackLayout {
    pub points: Vec<TrackPoint>,
    /// Per-point border flag, already dilated
    pub borders: Vec<bool>,
    /// Translation applied to center the curve (Bezier mode)
    pub offset: Vec2,
    pub control_points: Option<Vec<Vec2>>,
    pub complexity: Option<Complexity>,
}

/// A generated track with its tiles registered in a world
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    pub mode: TrackMode,
    pub points: Vec<TrackPoint>,
    pub tiles: Vec<RoadTile>,
    pub borders: Vec<BorderSegment>,
    /// Tiles and border stripes in draw order
    pub road_poly: Vec<RoadPolygon>,
    pub offset: Vec2,
    /// Bezier anchors the track was built from (random or supplied)
    pub control_points: Option<Vec<Vec2>>,
    /// Out-of-bounds half extent
    pub playfield: f32,
    pub(crate) complexity: Option<Complexity>,
}

impl Track {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Starting heading and position for the vehicle
    pub fn start_pose(&self) -> Option<(f32, Vec2)> {
        self.points.first().map(|p| (p.beta, p.pos()))
    }

    /// Cached descriptor when one was computed at generation, otherwise computed now
    pub fn complexity(&self) -> Complexity {
        self.complexity
            .unwrap_or_else(|| complexity(self.points.iter().map(TrackPoint::pos)))
    }

    /// Remove every tile body from the world and empty the track
    pub fn destroy<W: World + ?Sized>(&mut self, world: &mut W) {
        let old = std::mem::take(self);
        for tile in &old.tiles {
            world.destroy(tile.body);
        }
        self.mode = old.mode;
        self.playfield = old.playfield;
    }
}

/// Segment angles of a dense curve; zero-length segments are dropped
pub fn bezier_points(curve: &[Vec2]) -> Vec<TrackPoint> {
    curve
        .windows(2)
        .filter_map(|w| {
            let d = w[1] - w[0];
            if d.x == 0.0 && d.y == 0.0 {
                return None;
            }
            let alpha = d.y.atan2(d.x);
            Some(TrackPoint {
                alpha,
                beta: FRAC_PI_2 + alpha,
                x: w[0].x,
                y: w[0].y,
            })
        })
        .collect()
}

/// Translate points so their bounding box is centered on the origin
fn recentre(points: &mut [TrackPoint]) -> Vec2 {
    let (min, max) = points.iter().fold(
        (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
        |(lo, hi), p| (lo.min(p.pos()), hi.max(p.pos())),
    );
    let offset = min + (max - min) / 2.0;
    for p in points.iter_mut() {
        p.x -= offset.x;
        p.y -= offset.y;
    }
    offset
}

/// Wrapped heading change arriving at point `i` (indices wrap both ways)
fn turn_at(points: &[TrackPoint], i: isize) -> f32 {
    let n = points.len() as isize;
    let cur = points[i.rem_euclid(n) as usize].beta;
    let prev = points[(i - 1).rem_euclid(n) as usize].beta;
    normalize_angle(cur - prev)
}

/// Points ending a run of `window` same-direction turns sharper than `threshold`
pub fn qualifying_turns(points: &[TrackPoint], threshold: f32, window: usize) -> Vec<bool> {
    (0..points.len())
        .map(|i| {
            let turns: Vec<f32> = (0..window)
                .map(|k| turn_at(points, i as isize - k as isize))
                .collect();
            turns.iter().all(|&d| d > threshold) || turns.iter().all(|&d| d < -threshold)
        })
        .collect()
}

/// Border flags: qualifying points dilated backward over their window
pub fn detect_borders(points: &[TrackPoint], threshold: f32, window: usize) -> Vec<bool> {
    let qualifying = qualifying_turns(points, threshold, window);
    let n = points.len() as isize;
    let mut flags = qualifying.clone();
    for (i, _) in qualifying.iter().enumerate().filter(|(_, q)| **q) {
        for k in 0..window as isize {
            flags[(i as isize - k).rem_euclid(n) as usize] = true;
        }
    }
    flags
}

/// Run `attempt(true)` up to `attempts` times, then `attempt(false)` once
///
/// `true` asks for the requested checkpoints, `false` for fresh ones. With
/// supplied checkpoints the first failure goes straight to the fresh attempt.
fn with_retries<T, F>(attempts: u32, supplied: bool, mut attempt: F) -> Result<T, GenerationError>
where
    F: FnMut(bool) -> Result<T, GenerationError>,
{
    for n in 1..=attempts {
        match attempt(true) {
            Ok(value) => return Ok(value),
            Err(err) => {
                log::debug!("Polar attempt {n}/{attempts} failed: {err}");
                // Supplied checkpoints march identically on every attempt
                if supplied {
                    break;
                }
            }
        }
    }
    log::warn!("Polar generation retries exhausted, trying fresh checkpoints");
    attempt(false)
}

/// Road tile polygon for point `i`; the far edge comes from the previous point
pub fn tile_vertices(points: &[TrackPoint], i: usize) -> [Vec2; 4] {
    let n = points.len();
    let p1 = points[i];
    let p2 = points[(i + n - 1) % n];
    let e1 = unit(p1.beta) * TRACK_WIDTH;
    let e2 = unit(p2.beta) * TRACK_WIDTH;
    [p1.pos() - e1, p1.pos() + e1, p2.pos() + e2, p2.pos() - e2]
}

/// Hazard stripe for point `i`, on the outside of the turn
pub fn border_segment(points: &[TrackPoint], i: usize) -> BorderSegment {
    let n = points.len();
    let p1 = points[i];
    let p2 = points[(i + n - 1) % n];
    let side = if normalize_angle(p2.beta - p1.beta) < 0.0 {
        -1.0
    } else {
        1.0
    };
    let (u1, u2) = (unit(p1.beta) * side, unit(p2.beta) * side);
    BorderSegment {
        tile_index: i,
        side,
        vertices: [
            p1.pos() + u1 * TRACK_WIDTH,
            p1.pos() + u1 * (TRACK_WIDTH + BORDER),
            p2.pos() + u2 * (TRACK_WIDTH + BORDER),
            p2.pos() + u2 * TRACK_WIDTH,
        ],
        color: Palette::border_color(i),
    }
}

/// Track generator configured from environment settings
#[derive(Debug, Clone)]
pub struct TrackGenerator {
    pub mode: TrackMode,
    pub n_control_points: usize,
    pub show_borders: bool,
    pub min_rad: f32,
    pub max_rad: f32,
    pub polar_attempts: u32,
    pub border_turn_fraction: f32,
    /// Out-of-bounds half extent; also the diameter of the control point disc
    pub playfield: f32,
    /// Replaces Bezier curve evaluation when set
    pub preloaded: Option<PreloadedTrack>,
}

impl TrackGenerator {
    pub fn new(settings: &EnvSettings) -> Self {
        Self {
            mode: settings.mode,
            n_control_points: settings.n_control_points,
            show_borders: settings.show_borders,
            min_rad: TRACK_RAD * settings.min_rad_ratio,
            max_rad: TRACK_RAD * settings.max_rad_ratio,
            polar_attempts: settings.polar_attempts,
            border_turn_fraction: settings.border_turn_fraction,
            playfield: PLAYFIELD,
            preloaded: None,
        }
    }

    /// Use a preloaded point list and its playfield
    pub fn with_preloaded(mut self, track: PreloadedTrack) -> Self {
        self.playfield = track.playfield();
        self.preloaded = Some(track);
        self
    }

    /// Generate a track and register its tiles with `world`
    ///
    /// `control_points` are Bezier anchors or polar checkpoint positions,
    /// depending on the mode. On error nothing is registered.
    pub fn generate<W, R>(
        &self,
        control_points: Option<&[Vec2]>,
        world: &mut W,
        rng: &mut R,
        palette: &Palette,
    ) -> Result<Track, GenerationError>
    where
        W: World + ?Sized,
        R: Rng + ?Sized,
    {
        let layout = self.layout(control_points, rng)?;
        let track = self.build(layout, world, palette);
        log::info!(
            "Generated {} track: {} tiles, {} border stripes",
            self.mode.as_str(),
            track.tiles.len(),
            track.borders.len()
        );
        Ok(track)
    }

    /// Compute track geometry without touching a world
    pub fn layout<R: Rng + ?Sized>(
        &self,
        control_points: Option<&[Vec2]>,
        rng: &mut R,
    ) -> Result<TrackLayout, GenerationError> {
        match self.mode {
            TrackMode::Bezier => self.bezier_layout(control_points, rng),
            TrackMode::Polar => self.polar_layout(control_points, rng),
        }
    }

    fn bezier_layout<R: Rng + ?Sized>(
        &self,
        control_points: Option<&[Vec2]>,
        rng: &mut R,
    ) -> Result<TrackLayout, GenerationError> {
        let (curve, anchors) = match (&self.preloaded, control_points) {
            (Some(track), _) => (track.points(), None),
            (None, supplied) => {
                let anchors = match supplied {
                    Some(points) => points.to_vec(),
                    None => sample_random_control_points(self.n_control_points, self.playfield, rng)?,
                };
                let curve = evaluate_bezier(
                    &anchors,
                    DEFAULT_ROUNDEDNESS,
                    DEFAULT_EDGE_SHARPNESS,
                    DEFAULT_SAMPLES_PER_SEGMENT,
                )?;
                (curve.points, Some(anchors))
            }
        };

        let mut points = bezier_points(&curve);
        if points.len() < MIN_TRACK_POINTS {
            return Err(GenerationError::DegenerateCurve(format!(
                "{} distinct curve samples, need at least {MIN_TRACK_POINTS}",
                points.len()
            )));
        }

        let stats = TurnStats::of(&points);
        log::debug!(
            "Bezier turn stats: mean |dbeta| {:.4}, std {:.4}",
            stats.mean,
            stats.std
        );
        let offset = recentre(&mut points);
        let borders = self.borders(&points, stats.mean);
        let complexity = Some(complexity(points.iter().map(TrackPoint::pos)));

        Ok(TrackLayout {
            points,
            borders,
            offset,
            control_points: anchors,
            complexity,
        })
    }

    /// Retry with the requested checkpoints, then one last fresh attempt
    fn polar_layout<R: Rng + ?Sized>(
        &self,
        control_points: Option<&[Vec2]>,
        rng: &mut R,
    ) -> Result<TrackLayout, GenerationError> {
        with_retries(self.polar_attempts, control_points.is_some(), |requested| {
            self.polar_attempt(control_points.filter(|_| requested), rng)
        })
    }

    fn polar_attempt<R: Rng + ?Sized>(
        &self,
        control_points: Option<&[Vec2]>,
        rng: &mut R,
    ) -> Result<TrackLayout, GenerationError> {
        let checkpoints = match control_points {
            Some(points) => polar::checkpoints_from_points(points),
            None => polar::sample_checkpoints(self.n_control_points, self.min_rad, self.max_rad, rng),
        };
        let samples = polar::march(&checkpoints)?;
        let points = polar::close_loop(&samples, polar::start_alpha(checkpoints.len()))?;
        let borders = self.borders(&points, TRACK_TURN_RATE * self.border_turn_fraction);

        Ok(TrackLayout {
            points,
            borders,
            offset: Vec2::ZERO,
            control_points: None,
            complexity: None,
        })
    }

    fn borders(&self, points: &[TrackPoint], threshold: f32) -> Vec<bool> {
        if self.show_borders {
            detect_borders(points, threshold, BORDER_MIN_COUNT)
        } else {
            vec![false; points.len()]
        }
    }

    fn build<W: World + ?Sized>(&self, layout: TrackLayout, world: &mut W, palette: &Palette) -> Track {
        let n = layout.points.len();
        let mut tiles = Vec::with_capacity(n);
        let mut borders = Vec::new();
        let mut road_poly = Vec::with_capacity(n);

        for i in 0..n {
            let vertices = tile_vertices(&layout.points, i);
            let color = palette.tile_color(i);
            let body = world.create_static_polygon(vertices, TileTag::road(i));
            tiles.push(RoadTile {
                vertices,
                color,
                visited: false,
                friction: 1.0,
                index: i,
                body,
            });
            road_poly.push(RoadPolygon { vertices, color });

            if layout.borders[i] {
                let stripe = border_segment(&layout.points, i);
                road_poly.push(RoadPolygon {
                    vertices: stripe.vertices,
                    color: stripe.color,
                });
                borders.push(stripe);
            }
        }

        Track {
            mode: self.mode,
            points: layout.points,
            tiles,
            borders,
            road_poly,
            offset: layout.offset,
            control_points: layout.control_points,
            playfield: self.playfield,
            complexity: layout.complexity,
        }
    }
}
