//! Kinematic bicycle car
//!
//! A stand-in for a full vehicle dynamics model: enough to drive the
//! environment end to end with steer/gas/brake inputs.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::world::Vehicle;

/// Forward acceleration at full gas (units/s²)
const ENGINE_ACCEL: f32 = 40.0;
/// Deceleration at full brake (units/s²)
const BRAKE_DECEL: f32 = 80.0;
/// Linear drag coefficient (1/s)
const DRAG: f32 = 0.3;
/// Distance between axles
const WHEELBASE: f32 = 3.2;
/// Maximum front wheel angle (radians)
const MAX_WHEEL_ANGLE: f32 = 0.4;
/// Wheel angle slew rate (radians/s)
const STEER_RATE: f32 = 3.0;
const MAX_SPEED: f32 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KinematicCar {
    pub pos: Vec2,
    /// Heading angle; the car faces (-sin, cos)
    pub angle: f32,
    /// Signed speed along the heading
    pub speed: f32,
    /// Current front wheel angle
    pub wheel_angle: f32,
    steer_target: f32,
    gas: f32,
    brake: f32,
}

impl Default for KinematicCar {
    fn default() -> Self {
        Self::new(0.0, Vec2::ZERO)
    }
}

impl KinematicCar {
    pub fn new(angle: f32, pos: Vec2) -> Self {
        Self {
            pos,
            angle,
            speed: 0.0,
            wheel_angle: 0.0,
            steer_target: 0.0,
            gas: 0.0,
            brake: 0.0,
        }
    }
}

impl Vehicle for KinematicCar {
    fn steer(&mut self, value: f32) {
        self.steer_target = value.clamp(-1.0, 1.0);
    }

    fn gas(&mut self, value: f32) {
        self.gas = value.clamp(0.0, 1.0);
    }

    fn brake(&mut self, value: f32) {
        self.brake = value.clamp(0.0, 1.0);
    }

    fn position(&self) -> Vec2 {
        self.pos
    }

    fn heading(&self) -> f32 {
        self.angle
    }

    fn velocity(&self) -> Vec2 {
        self.forward() * self.speed
    }

    fn step(&mut self, dt: f32) {
        // Wheels slew toward the requested angle
        let target = self.steer_target * MAX_WHEEL_ANGLE;
        let max_delta = STEER_RATE * dt;
        self.wheel_angle += (target - self.wheel_angle).clamp(-max_delta, max_delta);

        let mut accel = self.gas * ENGINE_ACCEL - DRAG * self.speed;
        if self.brake > 0.0 {
            // Brakes stop the car, they never reverse it
            let decel = (self.brake * BRAKE_DECEL * dt).min(self.speed.abs());
            self.speed -= decel * self.speed.signum();
        }
        if self.speed.abs() < 1e-6 && self.gas == 0.0 {
            accel = 0.0;
        }
        self.speed = (self.speed + accel * dt).clamp(-MAX_SPEED, MAX_SPEED);

        self.angle += self.speed / WHEELBASE * self.wheel_angle.tan() * dt;
        self.pos += self.forward() * self.speed * dt;
    }

    fn reset_pose(&mut self, heading: f32, position: Vec2) {
        *self = Self::new(heading, position);
    }
}
