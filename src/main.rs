//! Bezier Racing entry point
//!
//! Drives a few episodes with a pure-pursuit controller over the sensor world
//! and logs the outcome of each one. An optional argument names a JSON
//! settings file.

use bezier_racing::sim::{Action, KinematicCar, SensorWorld, Track, Vehicle};
use bezier_racing::{CarRacing, EnvError, EnvSettings, ResetOptions};

const EPISODES: usize = 3;
/// Ticks before an episode is abandoned
const MAX_STEPS: usize = 5000;
/// Track points ahead of the nearest one to aim at
const LOOKAHEAD: usize = 6;
/// Cruise speed (units/s)
const TARGET_SPEED: f32 = 25.0;
/// Heading error (radians) mapped to full steering lock
const FULL_LOCK: f32 = 0.5;

fn main() {
    env_logger::init();
    log::info!("Bezier Racing (native) starting...");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), EnvError> {
    let settings = match std::env::args().nth(1) {
        Some(path) => EnvSettings::load(path)?,
        None => EnvSettings::default(),
    };
    let continuous = settings.continuous;
    let mut env = CarRacing::new(settings, SensorWorld::new(), KinematicCar::default())?;

    for episode in 1..=EPISODES {
        let mut outcome = env.reset(ResetOptions::default())?;
        let mut total = 0.0;
        let mut steps = 0;
        while !outcome.done && steps < MAX_STEPS {
            let action = pursue(env.track(), env.vehicle(), continuous);
            outcome = env.step(action)?;
            total += outcome.reward;
            steps += 1;
        }
        log::info!(
            "Episode {episode}: {} tiles of {}, reward {total:.1} after {steps} steps ({:?})",
            outcome.info.tile_visited_count,
            outcome.info.track_len,
            outcome.info.termination
        );
    }
    Ok(())
}

/// Steer toward a point a few tiles ahead in the direction the car faces
fn pursue(track: &Track, car: &KinematicCar, continuous: bool) -> Action {
    let n = track.points.len();
    if n < 2 {
        return idle(continuous);
    }
    let pos = car.position();
    let forward = car.forward();
    let nearest = track
        .points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.pos()
                .distance_squared(pos)
                .total_cmp(&b.pos().distance_squared(pos))
        })
        .map_or(0, |(i, _)| i);

    let along = track.points[(nearest + 1) % n].pos() - track.points[nearest].pos();
    let target = if forward.dot(along) >= 0.0 {
        (nearest + LOOKAHEAD) % n
    } else {
        (nearest + n - LOOKAHEAD % n) % n
    };
    let to_target = track.points[target].pos() - pos;
    // Positive error: target on the left
    let error = forward.perp_dot(to_target).atan2(forward.dot(to_target));
    let steer = (-error / FULL_LOCK).clamp(-1.0, 1.0);

    let speed = car.velocity().dot(forward);
    let (gas, brake) = if speed < TARGET_SPEED * (1.0 - steer.abs() * 0.5) {
        (0.5, 0.0)
    } else if error.abs() > FULL_LOCK {
        (0.0, 0.3)
    } else {
        (0.0, 0.0)
    };

    if continuous {
        Action::continuous(steer, gas, brake)
    } else if steer < -0.3 {
        Action::Discrete(1)
    } else if steer > 0.3 {
        Action::Discrete(2)
    } else if gas > 0.0 {
        Action::Discrete(3)
    } else if brake > 0.0 {
        Action::Discrete(4)
    } else {
        Action::Discrete(0)
    }
}

fn idle(continuous: bool) -> Action {
    if continuous {
        Action::continuous(0.0, 0.0, 0.0)
    } else {
        Action::Discrete(0)
    }
}
