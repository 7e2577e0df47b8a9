//! Deterministic simulation module
//!
//! Track generation, contact tracking and the reward tick. This module must
//! stay pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only, passed in by the caller
//! - Stable iteration order (by tile index and body handle)
//! - No rendering or platform dependencies

pub mod bezier;
pub mod car;
pub mod complexity;
pub mod contact;
pub mod polar;
pub mod sensor_world;
pub mod state;
pub mod tick;
pub mod track;
pub mod world;

pub use bezier::{Anchor, BezierCurve, evaluate_bezier, sample_random_control_points};
pub use car::KinematicCar;
pub use complexity::{Complexity, complexity};
pub use contact::ContactTracker;
pub use polar::Checkpoint;
pub use sensor_world::SensorWorld;
pub use state::{EpisodePhase, EpisodeState, GoalCondition, VisitationState};
pub use tick::{
    Action, Observation, RewardRules, StepInfo, StepOutcome, TerminationCause, tick,
};
pub use track::{BorderSegment, RoadPolygon, RoadTile, Track, TrackGenerator, TrackPoint};
pub use world::{BodyHandle, BodyTag, ContactListener, TileKind, TileTag, Vehicle, World};
