//! Fixed timestep episode tick
//!
//! Applies the action to the vehicle, steps the vehicle and the world (which
//! drains every contact event into the tracker), then settles reward and
//! termination for the tick.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::contact::ContactTracker;
use super::state::{EpisodePhase, EpisodeState};
use super::world::{Vehicle, World};
use crate::consts::{OUT_OF_BOUNDS_REWARD, SIM_DT, STEP_PENALTY};
use crate::error::EnvError;

/// Steering applied by the discrete left/right actions
const DISCRETE_STEER: f32 = 0.6;
/// Gas applied by the discrete accelerate action
const DISCRETE_GAS: f32 = 0.2;
/// Brake applied by the discrete brake action
const DISCRETE_BRAKE: f32 = 0.8;
/// Discrete actions: nothing, left, right, gas, brake
pub const DISCRETE_ACTIONS: u32 = 5;

/// One control input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Steer in [-1, 1] (positive steers right), gas and brake in [0, 1]
    Continuous { steer: f32, gas: f32, brake: f32 },
    /// 0 nothing, 1 left, 2 right, 3 gas, 4 brake
    Discrete(u32),
}

impl Action {
    pub fn continuous(steer: f32, gas: f32, brake: f32) -> Self {
        Action::Continuous { steer, gas, brake }
    }

    /// Check the action against the configured action space
    pub fn validate(&self, continuous: bool) -> Result<(), EnvError> {
        match (self, continuous) {
            (Action::Continuous { .. }, true) => Ok(()),
            (Action::Discrete(a), false) if *a < DISCRETE_ACTIONS => Ok(()),
            (action, true) => Err(EnvError::InvalidAction {
                action: format!("{action:?}"),
                expected: "continuous [steer, gas, brake]",
            }),
            (action, false) => Err(EnvError::InvalidAction {
                action: format!("{action:?}"),
                expected: "discrete action in 0..=4",
            }),
        }
    }

    /// Drive the vehicle controls
    pub fn apply(&self, vehicle: &mut dyn Vehicle) {
        match *self {
            Action::Continuous { steer, gas, brake } => {
                vehicle.steer(-steer);
                vehicle.gas(gas);
                vehicle.brake(brake);
            }
            Action::Discrete(a) => {
                let steer = match a {
                    1 => -DISCRETE_STEER,
                    2 => DISCRETE_STEER,
                    _ => 0.0,
                };
                vehicle.steer(steer);
                vehicle.gas(if a == 3 { DISCRETE_GAS } else { 0.0 });
                vehicle.brake(if a == 4 { DISCRETE_BRAKE } else { 0.0 });
            }
        }
    }
}

/// Reward and termination parameters for one episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardRules {
    pub lap_complete_percent: f32,
    pub continuous: bool,
    pub sparse: bool,
    /// Symmetric clamp on the revealed reward
    pub clip: Option<f32>,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self {
            lap_complete_percent: 0.95,
            continuous: true,
            sparse: false,
            clip: None,
        }
    }
}

/// Why an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationCause {
    /// Every tile visited or the lap signal raised
    LapComplete,
    OutOfBounds,
    GoalReached,
}

impl TerminationCause {
    pub fn phase(&self) -> EpisodePhase {
        match self {
            TerminationCause::LapComplete => EpisodePhase::Completed,
            TerminationCause::OutOfBounds => EpisodePhase::Failed,
            TerminationCause::GoalReached => EpisodePhase::GoalReached,
        }
    }
}

/// Vehicle state after the tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub position: Vec2,
    pub heading: f32,
    pub velocity: Vec2,
}

/// Diagnostics for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub termination: Option<TerminationCause>,
    pub tile_visited_count: usize,
    pub track_len: usize,
    pub goal_bin: Option<u32>,
    /// Reward before clipping
    pub raw_reward: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Advance the episode by one fixed timestep
///
/// `action` is `None` only for the settling tick right after reset, which
/// neither pays the step penalty nor checks termination. An invalid action
/// is rejected before anything moves.
pub fn tick<W, V>(
    state: &mut EpisodeState,
    world: &mut W,
    vehicle: &mut V,
    action: Option<&Action>,
    rules: &RewardRules,
) -> Result<StepOutcome, EnvError>
where
    W: World + ?Sized,
    V: Vehicle,
{
    if state.phase != EpisodePhase::Active {
        return Err(EnvError::EpisodeNotActive(state.phase));
    }
    if let Some(action) = action {
        action.validate(rules.continuous)?;
        action.apply(&mut *vehicle);
    }

    vehicle.step(SIM_DT);
    {
        let mut tracker = ContactTracker::new(
            &mut state.track.tiles,
            &mut state.visitation,
            rules.lap_complete_percent,
            state.goal,
        );
        world.step(SIM_DT, &*vehicle, &mut tracker);
    }
    state.time += SIM_DT;

    let track_len = state.track.len();
    let v = &mut state.visitation;
    let mut step_reward = 0.0;
    let mut termination = None;

    if action.is_some() {
        state.steps += 1;
        v.reward -= STEP_PENALTY;
        step_reward = v.reward - v.prev_reward;
        v.prev_reward = v.reward;

        if v.tile_visited_count == track_len || v.new_lap {
            termination = Some(TerminationCause::LapComplete);
        }
        let pos = vehicle.position();
        let playfield = state.track.playfield;
        if pos.x.abs() > playfield || pos.y.abs() > playfield {
            step_reward = OUT_OF_BOUNDS_REWARD;
            termination = Some(TerminationCause::OutOfBounds);
        }
    }

    let mut reward = step_reward;
    if rules.sparse {
        v.accumulated_rewards += step_reward;
        reward = 0.0;
        if v.goal_reached {
            reward = v.accumulated_rewards;
            v.accumulated_rewards = 0.0;
            if termination != Some(TerminationCause::OutOfBounds) {
                termination = Some(TerminationCause::GoalReached);
            }
        }
    }

    let raw_reward = reward;
    if let Some(bound) = rules.clip.filter(|b| *b > 0.0) {
        reward = reward.clamp(-bound, bound);
    }

    if let Some(cause) = termination {
        state.phase = cause.phase();
        log::info!(
            "Episode ended ({:?}) after {} steps: {}/{} tiles, total reward {:.1}",
            cause,
            state.steps,
            v.tile_visited_count,
            track_len,
            v.reward
        );
    }

    Ok(StepOutcome {
        observation: Observation {
            position: vehicle.position(),
            heading: vehicle.heading(),
            velocity: vehicle.velocity(),
        },
        reward,
        done: termination.is_some(),
        info: StepInfo {
            termination,
            tile_visited_count: v.tile_visited_count,
            track_len,
            goal_bin: state.goal.map(|g| g.bin),
            raw_reward,
        },
    })
}
