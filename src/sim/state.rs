//! Episode state
//!
//! Everything that changes during an episode lives here and is rebuilt from
//! scratch on reset. The environment owns one `EpisodeState` and lends it to
//! the contact tracker and the reward tick.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::track::Track;

/// Episode lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EpisodePhase {
    /// No track yet, or the last reset failed
    #[default]
    Idle,
    /// Accepting actions
    Active,
    /// Every tile visited or lap signal raised
    Completed,
    /// Car left the playfield
    Failed,
    /// Sparse-mode goal bin reached
    GoalReached,
}

impl EpisodePhase {
    /// Terminal phases need a reset before the next step
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EpisodePhase::Completed | EpisodePhase::Failed | EpisodePhase::GoalReached
        )
    }
}

/// Per-episode visitation and reward counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitationState {
    pub tile_visited_count: usize,
    /// Running reward total: tile rewards minus step penalties
    pub reward: f32,
    pub prev_reward: f32,
    /// Start tile re-entered after enough of the track was covered
    pub new_lap: bool,
    pub goal_reached: bool,
    /// Sparse mode: step rewards held back until the goal is reached
    pub accumulated_rewards: f32,
    /// Road tiles currently under the car
    pub car_tiles: BTreeSet<usize>,
}

/// Sparse-mode goal: one bucket of distance-to-finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalCondition {
    pub bin: u32,
    pub num_bins: u32,
    /// Tiles near the finish (bin 0) or the start (last bin) that never count
    pub guard: usize,
}

impl GoalCondition {
    /// Bucket of the tile at `index` on a track of `track_len` tiles
    pub fn bucket(&self, index: usize, track_len: usize) -> u32 {
        let distance = track_len.saturating_sub(index) as f32;
        let bin_size = track_len as f32 / self.num_bins as f32;
        (distance / bin_size).floor() as u32
    }

    /// Effect of touching tile `index`: `Some(reached)` overrides the flag,
    /// `None` leaves it as it was
    pub fn evaluate(&self, index: usize, track_len: usize) -> Option<bool> {
        let distance = track_len.saturating_sub(index);
        if self.bin == 0 && distance < self.guard {
            return Some(false);
        }
        if self.bin + 1 == self.num_bins && index < self.guard {
            return Some(false);
        }
        (self.bucket(index, track_len) == self.bin).then_some(true)
    }
}

/// Complete episode state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeState {
    pub track: Track,
    pub visitation: VisitationState,
    pub phase: EpisodePhase,
    /// Set in sparse mode only
    pub goal: Option<GoalCondition>,
    /// Ticks taken with an action
    pub steps: u64,
    /// Simulated seconds since reset
    pub time: f32,
}

impl EpisodeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh episode on `track`
    pub fn begin(&mut self, track: Track, goal: Option<GoalCondition>) {
        self.track = track;
        self.visitation = VisitationState::default();
        self.goal = goal;
        self.steps = 0;
        self.time = 0.0;
        self.phase = EpisodePhase::Active;
    }

    pub fn tile_visited_count(&self) -> usize {
        self.visitation.tile_visited_count
    }

    pub fn goal_bin(&self) -> Option<u32> {
        self.goal.map(|g| g.bin)
    }
}
