//! Movement input seen by the balance simulator.
//!
//! The host's input layer (joystick, keyboard, gamepad) and character
//! controller are injected through [`MovementSource`]; nothing here polls
//! devices.

use glam::Vec3;

/// Magnitude below which stick noise is not treated as movement.
pub const MOVEMENT_DEADZONE: f32 = 0.025;

/// Per-frame movement state supplied by the host.
pub trait MovementSource {
    /// Desired movement direction, clamped to unit length (x/z plane).
    fn movement_input(&self) -> Vec3;
    /// Whether the input device reports any non-zero input this frame.
    fn is_input_non_zero(&self) -> bool;
    /// Current character velocity.
    fn velocity(&self) -> Vec3;

    /// Moving means flagged input above the deadzone.
    fn is_moving(&self) -> bool {
        self.is_input_non_zero() && self.movement_input().length() > MOVEMENT_DEADZONE
    }
}

/// One frame's movement values, copied out of a [`MovementSource`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementSample {
    pub input: Vec3,
    pub velocity: Vec3,
    pub moving: bool,
}

impl MovementSample {
    pub fn capture(source: &dyn MovementSource) -> Self {
        Self {
            input: source.movement_input(),
            velocity: source.velocity(),
            moving: source.is_moving(),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }
}

/// Input provider whose values are set directly by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScriptedInput {
    pub direction: Vec3,
    pub velocity: Vec3,
}

impl ScriptedInput {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Walk along `direction` at `speed` (direction is clamped to unit length).
    pub fn walking(direction: Vec3, speed: f32) -> Self {
        let direction = direction.clamp_length_max(1.0);
        Self {
            direction,
            velocity: direction.normalize_or_zero() * speed,
        }
    }
}

impl MovementSource for ScriptedInput {
    fn movement_input(&self) -> Vec3 {
        self.direction
    }

    fn is_input_non_zero(&self) -> bool {
        self.direction != Vec3::ZERO
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadzone_input_is_not_moving() {
        let input = ScriptedInput {
            direction: Vec3::new(0.01, 0.0, 0.01),
            velocity: Vec3::ZERO,
        };
        assert!(input.is_input_non_zero());
        assert!(!input.is_moving());
    }

    #[test]
    fn test_walking_is_clamped() {
        let input = ScriptedInput::walking(Vec3::new(3.0, 0.0, 4.0), 2.0);
        assert!((input.movement_input().length() - 1.0).abs() < 1e-5);
        assert!((input.velocity().length() - 2.0).abs() < 1e-5);
        assert!(input.is_moving());
    }

    #[test]
    fn test_capture_idle() {
        let sample = MovementSample::capture(&ScriptedInput::idle());
        assert_eq!(sample, MovementSample::idle());
    }
}
