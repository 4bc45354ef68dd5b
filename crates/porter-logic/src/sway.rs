//! Carry-anchor sway while walking under load.
//!
//! Walking with cargo rocks the anchor side to side; the amplitude grows
//! with carried weight and sway intensity. An empty porter eases the anchor
//! back to its rest position. Standing still leaves the anchor where it is.

use glam::Vec3;

const SWAY_AMPLITUDE: f32 = 0.05;
const SWAY_FREQUENCY: f32 = 1.2;
const FOLLOW_RATE: f32 = 2.0;
const RETURN_RATE: f32 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSway {
    rest: Vec3,
    timer: f32,
}

impl AnchorSway {
    pub fn new(rest: Vec3) -> Self {
        Self { rest, timer: 0.0 }
    }

    pub fn rest(&self) -> Vec3 {
        self.rest
    }

    /// New anchor local position, or `None` when it should not move.
    pub fn update(
        &mut self,
        moving: bool,
        weight_ratio: f32,
        sway_intensity: f32,
        current: Vec3,
        dt: f32,
    ) -> Option<Vec3> {
        if !moving {
            return None;
        }
        if weight_ratio <= 0.0 {
            return Some(current.lerp(self.rest, (dt * RETURN_RATE).min(1.0)));
        }
        let amount = weight_ratio * sway_intensity * SWAY_AMPLITUDE;
        self.timer += dt * (1.0 + weight_ratio);
        let offset = Vec3::new((self.timer * SWAY_FREQUENCY).sin() * amount, 0.0, 0.0);
        Some(current.lerp(self.rest + offset, (dt * FOLLOW_RATE).min(1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_does_not_move() {
        let mut sway = AnchorSway::new(Vec3::Y);
        assert_eq!(sway.update(false, 1.0, 2.0, Vec3::Y, 0.1), None);
    }

    #[test]
    fn test_empty_returns_to_rest() {
        let mut sway = AnchorSway::new(Vec3::Y);
        let next = sway.update(true, 0.0, 0.5, Vec3::new(0.1, 1.0, 0.0), 0.1).unwrap();
        assert!((next.x - 0.07).abs() < 1e-5);
    }

    #[test]
    fn test_sway_stays_lateral_and_bounded() {
        let mut sway = AnchorSway::new(Vec3::Y);
        let mut pos = Vec3::Y;
        let mut max_x: f32 = 0.0;
        for _ in 0..600 {
            pos = sway.update(true, 1.0, 2.0, pos, 1.0 / 60.0).unwrap();
            max_x = max_x.max(pos.x.abs());
            assert_eq!(pos.y, 1.0);
            assert_eq!(pos.z, 0.0);
        }
        assert!(max_x > 0.0);
        assert!(max_x <= 0.1 + 1e-5);
    }
}
