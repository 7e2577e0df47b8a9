//! Minimal sensor-only world
//!
//! Holds static convex polygons and reports overlap changes against the
//! vehicle hull each step. There are no dynamics: tiles are sensors, so the
//! car drives through them and only begin/end events matter.

use std::collections::BTreeSet;

use glam::Vec2;

use super::world::{BodyHandle, BodyTag, ContactListener, TileTag, Vehicle, World};

#[derive(Debug, Clone)]
struct SensorBody {
    vertices: [Vec2; 4],
    tag: TileTag,
}

/// World of static sensor polygons
#[derive(Debug, Default)]
pub struct SensorWorld {
    /// Indexed by handle; destroyed slots are `None`
    bodies: Vec<Option<SensorBody>>,
    /// Bodies currently overlapping the vehicle (ordered for determinism)
    touching: BTreeSet<BodyHandle>,
}

impl SensorWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live body count
    pub fn body_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_some()).count()
    }

    pub fn touching(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.touching.iter().copied()
    }
}

impl World for SensorWorld {
    fn create_static_polygon(&mut self, vertices: [Vec2; 4], tag: TileTag) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(Some(SensorBody { vertices, tag }));
        handle
    }

    fn destroy(&mut self, body: BodyHandle) {
        if let Some(slot) = self.bodies.get_mut(body.0 as usize) {
            *slot = None;
        }
        self.touching.remove(&body);
    }

    fn step(&mut self, _dt: f32, vehicle: &dyn Vehicle, listener: &mut dyn ContactListener) {
        let hull = vehicle.hull();

        let now: BTreeSet<BodyHandle> = self
            .bodies
            .iter()
            .enumerate()
            .filter_map(|(i, body)| {
                let body = body.as_ref()?;
                convex_overlap(&hull, &body.vertices).then_some(BodyHandle(i as u32))
            })
            .collect();

        let tag_of = |bodies: &[Option<SensorBody>], h: BodyHandle| {
            bodies
                .get(h.0 as usize)
                .and_then(|b| b.as_ref())
                .map(|b| b.tag)
        };

        for &handle in self.touching.difference(&now) {
            if let Some(tag) = tag_of(&self.bodies, handle) {
                listener.on_contact_end(BodyTag::Tile(tag), BodyTag::Vehicle);
            }
        }
        for &handle in now.difference(&self.touching) {
            if let Some(tag) = tag_of(&self.bodies, handle) {
                listener.on_contact_begin(BodyTag::Tile(tag), BodyTag::Vehicle);
            }
        }

        self.touching = now;
    }
}

/// Project a polygon onto an axis
fn project(poly: &[Vec2], axis: Vec2) -> (f32, f32) {
    poly.iter()
        .map(|p| p.dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d), hi.max(d))
        })
}

/// Separating axis test for two convex polygons; touching counts as overlap
pub fn convex_overlap(a: &[Vec2], b: &[Vec2]) -> bool {
    for poly in [a, b] {
        for i in 0..poly.len() {
            let edge = poly[(i + 1) % poly.len()] - poly[i];
            let axis = Vec2::new(-edge.y, edge.x);
            if axis.length_squared() < 1e-12 {
                continue;
            }
            let (a_lo, a_hi) = project(a, axis);
            let (b_lo, b_hi) = project(b, axis);
            if a_hi < b_lo || b_hi < a_lo {
                return false;
            }
        }
    }
    true
}
