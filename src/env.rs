//! Environment facade
//!
//! Owns the settings, the RNG, the world, the vehicle and the episode state.
//! `reset` builds a fresh track and places the car on it; `step` applies one
//! action and returns the reward and termination for that tick.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::palette::Palette;
use crate::racetracks::PreloadedTrack;
use crate::settings::{EnvSettings, TrackMode};
use crate::sim::{
    Action, Complexity, EpisodePhase, EpisodeState, GoalCondition, RewardRules, StepOutcome,
    Track, TrackGenerator, Vehicle, World, tick,
};

/// Per-reset options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetOptions {
    /// Redraw colors on this reset (domain randomization only)
    pub randomize_colors: bool,
    /// Bezier anchors or polar checkpoint positions
    pub control_points: Option<Vec<Vec2>>,
    /// Sparse-mode goal bin override
    pub goal_bin: Option<u32>,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            randomize_colors: true,
            control_points: None,
            goal_bin: None,
        }
    }
}

impl From<&EnvSettings> for RewardRules {
    fn from(settings: &EnvSettings) -> Self {
        Self {
            lap_complete_percent: settings.lap_complete_percent,
            continuous: settings.continuous,
            sparse: settings.sparse_rewards,
            clip: settings.effective_clip(),
        }
    }
}

/// Car racing environment over a pluggable world and vehicle
pub struct CarRacing<W: World, V: Vehicle> {
    settings: EnvSettings,
    generator: TrackGenerator,
    rules: RewardRules,
    /// Seed the RNG started from; fixed environments return to it on reset
    level_seed: u64,
    rng: Pcg32,
    world: W,
    vehicle: V,
    state: EpisodeState,
    palette: Palette,
}

impl<W: World, V: Vehicle> CarRacing<W, V> {
    pub fn new(settings: EnvSettings, world: W, vehicle: V) -> Result<Self, EnvError> {
        settings.validate()?;

        let mut generator = TrackGenerator::new(&settings);
        if let Some(path) = &settings.track_file {
            match settings.mode {
                TrackMode::Bezier => {
                    generator = generator.with_preloaded(PreloadedTrack::load(path)?)
                }
                TrackMode::Polar => {
                    log::warn!("Ignoring track file {} in polar mode", path.display())
                }
            }
        }

        let level_seed = settings.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = Pcg32::seed_from_u64(level_seed);
        let palette = if settings.domain_randomize {
            Palette::randomized(&mut rng)
        } else {
            Palette::default()
        };

        log::info!(
            "Car racing environment: {} mode, seed {}, {} control points",
            settings.mode.as_str(),
            level_seed,
            settings.n_control_points
        );

        Ok(Self {
            rules: RewardRules::from(&settings),
            settings,
            generator,
            level_seed,
            rng,
            world,
            vehicle,
            state: EpisodeState::new(),
            palette,
        })
    }

    /// Start a new episode
    ///
    /// On error the previous track is already gone and the episode stays
    /// `Idle` until a reset succeeds.
    pub fn reset(&mut self, options: ResetOptions) -> Result<StepOutcome, EnvError> {
        if self.settings.fixed_environment {
            self.rng = Pcg32::seed_from_u64(self.level_seed);
        }
        self.state.track.destroy(&mut self.world);
        self.state.phase = EpisodePhase::Idle;

        if let Some(bin) = options.goal_bin {
            self.check_goal_bin(bin)?;
        }
        if self.settings.domain_randomize && options.randomize_colors {
            self.palette = Palette::randomized(&mut self.rng);
        }

        let track = self.generator.generate(
            options.control_points.as_deref(),
            &mut self.world,
            &mut self.rng,
            &self.palette,
        )?;
        if let Some((heading, pos)) = track.start_pose() {
            self.vehicle.reset_pose(heading, pos);
        }

        let goal = self.settings.sparse_rewards.then(|| GoalCondition {
            bin: options
                .goal_bin
                .unwrap_or_else(|| self.rng.random_range(1..self.settings.num_goal_bins)),
            num_bins: self.settings.num_goal_bins,
            guard: self.settings.goal_guard_distance,
        });
        if let Some(goal) = goal {
            log::debug!("Goal bin {} of {}", goal.bin, goal.num_bins);
        }
        self.state.begin(track, goal);

        tick(&mut self.state, &mut self.world, &mut self.vehicle, None, &self.rules)
    }

    /// Apply one action for one tick
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        tick(
            &mut self.state,
            &mut self.world,
            &mut self.vehicle,
            Some(&action),
            &self.rules,
        )
    }

    /// Choose a new sparse-mode goal bin mid-episode; `None` draws one
    pub fn set_goal(&mut self, bin: Option<u32>) -> Result<(), EnvError> {
        let num_bins = self.settings.num_goal_bins;
        let bin = match bin {
            Some(bin) => {
                self.check_goal_bin(bin)?;
                bin
            }
            None if num_bins > 1 => self.rng.random_range(1..num_bins),
            None => 0,
        };
        self.state.goal = Some(GoalCondition {
            bin,
            num_bins,
            guard: self.settings.goal_guard_distance,
        });
        self.state.visitation.goal_reached = false;
        Ok(())
    }

    fn check_goal_bin(&self, bin: u32) -> Result<(), EnvError> {
        if bin >= self.settings.num_goal_bins {
            return Err(EnvError::InvalidGoalBin {
                bin,
                num_bins: self.settings.num_goal_bins,
            });
        }
        Ok(())
    }

    pub fn complexity_info(&self) -> Complexity {
        self.state.track.complexity()
    }

    pub fn track(&self) -> &Track {
        &self.state.track
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn phase(&self) -> EpisodePhase {
        self.state.phase
    }

    pub fn settings(&self) -> &EnvSettings {
        &self.settings
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn seed(&self) -> u64 {
        self.level_seed
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut V {
        &mut self.vehicle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::LAP_REWARD;
    use crate::error::GenerationError;
    use crate::sim::{KinematicCar, SensorWorld, TerminationCause};

    /// Test vehicle that sits on track point `k` after its `k`-th step
    #[derive(Default)]
    struct RailCar {
        rail: Vec<(f32, Vec2)>,
        cursor: usize,
        heading: f32,
        pos: Vec2,
    }

    impl RailCar {
        fn lay(&mut self, track: &Track) {
            self.rail = track.points.iter().map(|p| (p.beta, p.pos())).collect();
            self.cursor = 0;
        }
    }

    impl Vehicle for RailCar {
        fn steer(&mut self, _value: f32) {}
        fn gas(&mut self, _value: f32) {}
        fn brake(&mut self, _value: f32) {}
        fn position(&self) -> Vec2 {
            self.pos
        }
        fn heading(&self) -> f32 {
            self.heading
        }
        fn velocity(&self) -> Vec2 {
            Vec2::ZERO
        }
        fn step(&mut self, _dt: f32) {
            if self.rail.is_empty() {
                return;
            }
            self.cursor += 1;
            (self.heading, self.pos) = self.rail[self.cursor % self.rail.len()];
        }
        fn reset_pose(&mut self, heading: f32, position: Vec2) {
            self.heading = heading;
            self.pos = position;
        }
    }

    fn polar_settings() -> EnvSettings {
        EnvSettings {
            mode: TrackMode::Polar,
            n_control_points: 12,
            lap_complete_percent: 0.95,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn rail_env(settings: EnvSettings) -> CarRacing<SensorWorld, RailCar> {
        CarRacing::new(settings, SensorWorld::new(), RailCar::default()).unwrap()
    }

    const COAST: Action = Action::Continuous {
        steer: 0.0,
        gas: 0.0,
        brake: 0.0,
    };

    #[test]
    fn test_centered_lap_on_polar_track() {
        let mut env = rail_env(polar_settings());
        env.reset(ResetOptions::default()).unwrap();
        let n = env.track().len();
        assert!(n > 0);

        let track = env.track().clone();
        env.vehicle_mut().lay(&track);

        let mut total = 0.0;
        let mut done = false;
        for _ in 0..n {
            let out = env.step(COAST).unwrap();
            total += out.reward;
            if out.done {
                done = true;
                assert_eq!(out.info.termination, Some(TerminationCause::LapComplete));
                break;
            }
        }
        assert!(done);
        assert!((900.0..=LAP_REWARD).contains(&total), "total {total}");
        assert_eq!(env.phase(), EpisodePhase::Completed);
    }

    #[test]
    fn test_invalid_discrete_action() {
        let mut settings = polar_settings();
        settings.continuous = false;
        let mut env = rail_env(settings);
        env.reset(ResetOptions::default()).unwrap();
        let visited = env.state().tile_visited_count();

        let err = env.step(Action::Discrete(7));
        assert!(matches!(err, Err(EnvError::InvalidAction { .. })));
        assert_eq!(env.state().tile_visited_count(), visited);
        assert_eq!(env.phase(), EpisodePhase::Active);

        assert!(env.step(Action::Discrete(3)).is_ok());
    }

    #[test]
    fn test_sparse_goal_fires_once_in_its_bin() {
        let mut settings = polar_settings();
        settings.sparse_rewards = true;
        let mut env = rail_env(settings);
        let options = ResetOptions {
            goal_bin: Some(12),
            ..Default::default()
        };
        env.reset(options).unwrap();
        let track = env.track().clone();
        let n = track.len();
        env.vehicle_mut().lay(&track);

        let mut revealed = Vec::new();
        let mut fired = None;
        for _ in 0..n {
            let out = env.step(COAST).unwrap();
            revealed.push(out.reward);
            if out.done {
                fired = Some(out);
                break;
            }
        }
        let fired = fired.unwrap();
        assert_eq!(fired.info.termination, Some(TerminationCause::GoalReached));
        assert_eq!(fired.info.goal_bin, Some(12));
        assert_eq!(revealed.iter().filter(|r| **r != 0.0).count(), 1);
        assert!(fired.reward > 0.0);

        let goal = env.state().goal.unwrap();
        let under_car = &env.state().visitation.car_tiles;
        assert!(under_car.iter().any(|&i| goal.bucket(i, n) == 12));
    }

    #[test]
    fn test_invalid_goal_bin() {
        let mut settings = polar_settings();
        settings.sparse_rewards = true;
        let mut env = rail_env(settings);
        let options = ResetOptions {
            goal_bin: Some(24),
            ..Default::default()
        };
        assert!(matches!(
            env.reset(options),
            Err(EnvError::InvalidGoalBin { bin: 24, num_bins: 24 })
        ));
        assert_eq!(env.phase(), EpisodePhase::Idle);
        assert!(matches!(
            env.step(COAST),
            Err(EnvError::EpisodeNotActive(EpisodePhase::Idle))
        ));
    }

    #[test]
    fn test_random_goal_avoids_bin_zero() {
        let mut settings = polar_settings();
        settings.sparse_rewards = true;
        settings.num_goal_bins = 4;
        let mut env = rail_env(settings);
        for _ in 0..5 {
            env.reset(ResetOptions::default()).unwrap();
            let bin = env.state().goal_bin().unwrap();
            assert!((1..4).contains(&bin));
        }
        env.set_goal(Some(0)).unwrap();
        assert_eq!(env.state().goal_bin(), Some(0));
        assert!(env.set_goal(Some(9)).is_err());
    }

    #[test]
    fn test_same_seed_same_track() {
        let settings = EnvSettings {
            seed: Some(7),
            ..Default::default()
        };
        let mut a = rail_env(settings.clone());
        let mut b = rail_env(settings);
        a.reset(ResetOptions::default()).unwrap();
        b.reset(ResetOptions::default()).unwrap();
        assert_eq!(a.track().points, b.track().points);
    }

    #[test]
    fn test_fixed_environment_repeats_track() {
        let settings = EnvSettings {
            seed: Some(9),
            fixed_environment: true,
            ..Default::default()
        };
        let mut env = rail_env(settings);
        env.reset(ResetOptions::default()).unwrap();
        let first = env.track().points.clone();
        env.reset(ResetOptions::default()).unwrap();
        assert_eq!(env.track().points, first);
        // Old tiles are released before the new ones are registered
        assert_eq!(env.world().body_count(), first.len());
    }

    #[test]
    fn test_failed_generation_leaves_env_idle() {
        let mut env = rail_env(EnvSettings {
            seed: Some(1),
            ..Default::default()
        });
        env.reset(ResetOptions::default()).unwrap();

        let options = ResetOptions {
            control_points: Some(vec![Vec2::ZERO; 3]),
            ..Default::default()
        };
        let err = env.reset(options);
        assert!(matches!(
            err,
            Err(EnvError::GenerationFailed(GenerationError::DegenerateCurve(_)))
        ));
        assert_eq!(env.phase(), EpisodePhase::Idle);
        assert!(env.track().is_empty());
        assert_eq!(env.world().body_count(), 0);
    }

    #[test]
    fn test_exhausted_polar_retries_surface_from_reset() {
        // Checkpoints far beyond what the march can cover in one run
        let mut env = rail_env(EnvSettings {
            min_rad_ratio: 1000.0,
            max_rad_ratio: 1000.0,
            polar_attempts: 3,
            ..polar_settings()
        });
        let err = env.reset(ResetOptions::default());
        assert!(matches!(
            err,
            Err(EnvError::GenerationFailed(
                GenerationError::NoClosedLoopFound { .. }
            ))
        ));
        assert_eq!(env.phase(), EpisodePhase::Idle);
        assert_eq!(env.world().body_count(), 0);
        assert!(matches!(
            env.step(COAST),
            Err(EnvError::EpisodeNotActive(EpisodePhase::Idle))
        ));
    }

    #[test]
    fn test_domain_randomized_colors() {
        let settings = EnvSettings {
            seed: Some(3),
            domain_randomize: true,
            ..Default::default()
        };
        let mut env = rail_env(settings);
        env.reset(ResetOptions::default()).unwrap();
        let first = env.palette().clone();
        assert_ne!(first, Palette::default());

        env.reset(ResetOptions {
            randomize_colors: false,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(*env.palette(), first);

        env.reset(ResetOptions::default()).unwrap();
        assert_ne!(*env.palette(), first);
    }

    #[test]
    fn test_kinematic_car_starts_on_track() {
        let mut env = CarRacing::new(
            EnvSettings {
                seed: Some(5),
                ..Default::default()
            },
            SensorWorld::new(),
            KinematicCar::default(),
        )
        .unwrap();
        let out = env.reset(ResetOptions::default()).unwrap();
        assert!(!out.done);
        assert!(out.info.tile_visited_count >= 1);
        assert_eq!(out.observation.position, env.track().points[0].pos());

        let out = env.step(Action::continuous(0.0, 1.0, 0.0)).unwrap();
        assert!(!out.done);
        assert!(env.complexity_info().length > 0.0);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = EnvSettings {
            n_control_points: 1,
            ..Default::default()
        };
        let result = CarRacing::new(settings, SensorWorld::new(), KinematicCar::default());
        assert!(matches!(result, Err(EnvError::Settings(_))));
    }
}
