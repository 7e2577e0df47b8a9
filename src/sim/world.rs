//! Interfaces to the physics world and the vehicle
//!
//! The core never steps rigid bodies itself. It registers static road
//! polygons with a [`World`], advances a [`Vehicle`], and receives contact
//! events through a [`ContactListener`] while the world steps.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Opaque handle to a body created in a [`World`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// What a tile body represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Drivable road segment; counts for visitation
    Road,
}

/// Back-reference from a body to the tile it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileTag {
    pub tile_index: usize,
    pub kind: TileKind,
}

impl TileTag {
    pub fn road(tile_index: usize) -> Self {
        Self {
            tile_index,
            kind: TileKind::Road,
        }
    }
}

/// Tag attached to every body at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyTag {
    Tile(TileTag),
    Vehicle,
}

/// Receives contact events synchronously from [`World::step`]
pub trait ContactListener {
    fn on_contact_begin(&mut self, a: BodyTag, b: BodyTag);
    fn on_contact_end(&mut self, a: BodyTag, b: BodyTag);
}

/// Physics world holding static road polygons
pub trait World {
    /// Register a static sensor polygon and return its handle
    fn create_static_polygon(&mut self, vertices: [Vec2; 4], tag: TileTag) -> BodyHandle;

    /// Remove a body; unknown handles are ignored
    fn destroy(&mut self, body: BodyHandle);

    /// Advance by `dt`, delivering every begin/end contact between the
    /// vehicle hull and registered bodies before returning
    fn step(&mut self, dt: f32, vehicle: &dyn Vehicle, listener: &mut dyn ContactListener);
}

/// Half extents of the default vehicle hull (width, length)
pub const HULL_HALF_EXTENTS: Vec2 = Vec2::new(0.8, 2.0);

/// Drivable car
///
/// Heading `h` means the car faces `(-sin h, cos h)`, so a track point's
/// `beta` can be used directly as the starting heading.
pub trait Vehicle {
    /// Steering in [-1, 1]; positive turns left
    fn steer(&mut self, value: f32);
    fn gas(&mut self, value: f32);
    fn brake(&mut self, value: f32);

    fn position(&self) -> Vec2;
    fn heading(&self) -> f32;
    fn velocity(&self) -> Vec2;

    /// Advance one physics tick
    fn step(&mut self, dt: f32);

    /// Place the car at rest at a new pose
    fn reset_pose(&mut self, heading: f32, position: Vec2);

    fn forward(&self) -> Vec2 {
        let h = self.heading();
        Vec2::new(-h.sin(), h.cos())
    }

    /// Hull corners in world space
    fn hull(&self) -> [Vec2; 4] {
        let forward = self.forward();
        let right = Vec2::new(forward.y, -forward.x);
        let c = self.position();
        let w = right * HULL_HALF_EXTENTS.x;
        let l = forward * HULL_HALF_EXTENTS.y;
        [c - w - l, c + w - l, c + w + l, c - w + l]
    }
}
