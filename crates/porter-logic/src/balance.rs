//! Balance simulation: a bounded scalar driven by load and movement.
//!
//! Balance starts full and is advanced once per tick. Negative drivers
//! (sway, speed, weight, stack height, off-centre mass, sudden turns)
//! pull it down; a recovery rate pushes it back up, strongly so when the
//! porter stands still. When it drops to the fall threshold the caller
//! runs the fall sequence and calls [`BalanceSimulator::restore_after_fall`].
//!
//! # Bands
//!
//! | Band | Balance ratio |
//! |------|---------------|
//! | `Stable` | > 0.7 |
//! | `Unstable` | > 0.4 |
//! | `Critical` | > 0.2 |
//! | `Falling` | <= 0.2 |
//!
//! Any band is "recovering" while the stationary bonus is active.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::PorterConfig;
use crate::input::MovementSample;

/// Carried weight is scaled by this before it drives balance.
const WEIGHT_RATIO_SCALE: f32 = 0.8;
const WEIGHT_IMPACT_EXPONENT: f32 = 2.2;
const WEIGHT_IMPACT_SCALE: f32 = 30.0;
const STACK_IMPACT_EXPONENT: f32 = 1.8;
const STACK_IMPACT_SCALE: f32 = 25.0;
const CENTER_OF_MASS_GAIN: f32 = 2.0;
const CENTER_OF_MASS_SCALE: f32 = 15.0;
/// Centre-of-mass impact multiplier once stationary recovery kicks in.
const CENTER_OF_MASS_STATIONARY: f32 = 0.5;
const SWAY_SCALE: f32 = 12.0;
const VELOCITY_SCALE: f32 = 0.5;
const DIRECTION_CHANGE_SCALE: f32 = 8.0;
/// Consecutive directions with a smaller dot product count as a sharp turn.
const DIRECTION_CHANGE_DOT: f32 = 0.5;
const DIRECTION_CHANGE_DECAY: f32 = 0.5;
/// Share of the load impact that still applies while standing still.
const STATIONARY_LOAD_SHARE: f32 = 0.1;
/// Recovery lost at full (scaled) weight ratio.
const RECOVERY_WEIGHT_PENALTY: f32 = 0.9;
/// Gain from recovery rate to balance per second.
const RECOVERY_GAIN: f32 = 8.0;
/// Flat recovery bonus after standing still this long.
const PATIENCE_DELAY: f32 = 2.0;
const PATIENCE_BONUS: f32 = 1.0;
const DANGER_WEIGHT_SHRINK: f32 = 0.3;
const FALL_WEIGHT_SHRINK: f32 = 0.2;
/// Below this balance ratio movement gets an extra penalty.
const LOW_BALANCE_SPEED_RATIO: f32 = 0.5;
const LOW_BALANCE_SPEED_PENALTY: f32 = 0.3;
const MIN_SPEED_MULTIPLIER: f32 = 0.1;

/// Named stability band derived from the balance ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceBand {
    Stable,
    Unstable,
    Critical,
    Falling,
}

impl BalanceBand {
    pub fn from_ratio(ratio: f32) -> Self {
        if ratio > 0.7 {
            Self::Stable
        } else if ratio > 0.4 {
            Self::Unstable
        } else if ratio > 0.2 {
            Self::Critical
        } else {
            Self::Falling
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Stable => "Stable",
            Self::Unstable => "Unstable",
            Self::Critical => "Critical",
            Self::Falling => "Falling",
        }
    }
}

/// Band plus whether stationary recovery is active, e.g. "Stable (Recovering)".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceState {
    pub band: BalanceBand,
    pub recovering: bool,
}

impl fmt::Display for BalanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.recovering {
            write!(f, "{} (Recovering)", self.band.label())
        } else {
            f.write_str(self.band.label())
        }
    }
}

/// Aggregate load figures read from the inventory once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadSnapshot {
    pub current_weight: f32,
    pub stack_height: f32,
    /// Horizontal distance of the weighted cargo centroid from the anchor.
    pub center_of_mass_offset: f32,
    pub sway_intensity: f32,
}

/// Per-tick breakdown of what moved the balance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BalanceDrivers {
    pub sway: f32,
    pub velocity: f32,
    pub weight: f32,
    pub stack: f32,
    pub center_of_mass: f32,
    pub direction_change: f32,
    /// Sum of negative drivers after depletion / stationary scaling.
    pub total_negative: f32,
    /// Recovery rate before the x8 gain.
    pub recovery: f32,
}

/// Outcome of one balance tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceTick {
    pub balance: f32,
    pub ratio: f32,
    pub ratio_changed: bool,
    pub critical: bool,
    pub critical_changed: bool,
    /// Balance reached the fall threshold; the caller must run the fall.
    pub fall_triggered: bool,
    pub drivers: BalanceDrivers,
}

/// Owns the balance scalar and the timers that feed it.
#[derive(Debug, Clone)]
pub struct BalanceSimulator {
    config: PorterConfig,
    current_balance: f32,
    is_stationary: bool,
    stationary_timer: f32,
    last_direction: Vec3,
    direction_change_timer: f32,
    fall_hold_timer: f32,
    critical: bool,
    last_ratio: f32,
}

impl BalanceSimulator {
    pub fn new(config: &PorterConfig) -> Self {
        Self {
            config: config.clone(),
            current_balance: config.max_balance,
            is_stationary: false,
            stationary_timer: 0.0,
            last_direction: Vec3::ZERO,
            direction_change_timer: 0.0,
            fall_hold_timer: 0.0,
            critical: false,
            last_ratio: 1.0,
        }
    }

    pub fn balance(&self) -> f32 {
        self.current_balance
    }

    pub fn max_balance(&self) -> f32 {
        self.config.max_balance
    }

    pub fn ratio(&self) -> f32 {
        self.current_balance / self.config.max_balance
    }

    pub fn is_stationary(&self) -> bool {
        self.is_stationary
    }

    pub fn stationary_time(&self) -> f32 {
        self.stationary_timer
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// False while the post-fall hold is running.
    pub fn movement_enabled(&self) -> bool {
        self.fall_hold_timer <= 0.0
    }

    fn stationary_bonus_active(&self) -> bool {
        self.is_stationary && self.stationary_timer > self.config.stationary_recovery_delay
    }

    pub fn state(&self) -> BalanceState {
        BalanceState {
            band: BalanceBand::from_ratio(self.ratio()),
            recovering: self.stationary_bonus_active(),
        }
    }

    /// Carried weight as a ratio of capacity, scaled for balance.
    fn scaled_weight_ratio(&self, current_weight: f32) -> f32 {
        (current_weight / self.config.max_carry_weight).clamp(0.0, 1.0) * WEIGHT_RATIO_SCALE
    }

    /// Critical threshold; heavier loads tip into critical sooner.
    pub fn danger_threshold(&self, current_weight: f32) -> f32 {
        let wr = self.scaled_weight_ratio(current_weight);
        self.config.balance_danger_threshold * (1.0 - wr * DANGER_WEIGHT_SHRINK)
    }

    pub fn fall_threshold(&self, current_weight: f32) -> f32 {
        let wr = self.scaled_weight_ratio(current_weight);
        self.config.balance_fall_threshold * (1.0 - wr * FALL_WEIGHT_SHRINK)
    }

    /// Recovery rate (before the x8 gain) at the current stationary time.
    ///
    /// This is the value the next [`update`](Self::update) applies: it uses
    /// the 0.8-scaled weight ratio and includes both the stationary bonus and
    /// the flat bonus after two seconds of standing still, so a gauge built
    /// on it matches what balance actually does.
    pub fn recovery_rate(&self, current_weight: f32) -> f32 {
        let wr = self.scaled_weight_ratio(current_weight);
        let mut rate = self.config.balance_recovery_rate * (1.0 - wr * RECOVERY_WEIGHT_PENALTY);
        if self.stationary_bonus_active() {
            let bonus = self.config.stationary_recovery_bonus;
            rate += (bonus * (self.stationary_timer / 2.0)).min(bonus * 2.0);
            if self.stationary_timer > PATIENCE_DELAY {
                rate += PATIENCE_BONUS;
            }
        }
        rate
    }

    /// Advance balance by `dt` seconds.
    pub fn update(&mut self, movement: &MovementSample, load: &LoadSnapshot, dt: f32) -> BalanceTick {
        if self.fall_hold_timer > 0.0 {
            self.fall_hold_timer = (self.fall_hold_timer - dt).max(0.0);
        }

        if movement.moving {
            self.stationary_timer = 0.0;
            self.is_stationary = false;
        } else {
            self.stationary_timer += dt;
            self.is_stationary = true;
        }

        let weight_ratio = self.scaled_weight_ratio(load.current_weight);
        let stack_ratio = (load.stack_height / self.config.max_stack_height).clamp(0.0, 1.0);

        let mut drivers = BalanceDrivers {
            weight: weight_ratio.powf(WEIGHT_IMPACT_EXPONENT) * WEIGHT_IMPACT_SCALE,
            stack: stack_ratio.powf(STACK_IMPACT_EXPONENT) * STACK_IMPACT_SCALE,
            ..Default::default()
        };
        let com_reduction = if self.stationary_bonus_active() {
            CENTER_OF_MASS_STATIONARY
        } else {
            1.0
        };
        drivers.center_of_mass =
            load.center_of_mass_offset * CENTER_OF_MASS_GAIN * com_reduction * CENTER_OF_MASS_SCALE;
        let load_impact = drivers.weight + drivers.stack + drivers.center_of_mass;

        drivers.total_negative = if movement.moving {
            drivers.sway = movement.input.length() * load.sway_intensity * SWAY_SCALE;
            drivers.velocity = movement.velocity.length() * VELOCITY_SCALE;
            drivers.direction_change =
                self.direction_change_impulse(movement.input, dt) * weight_ratio * DIRECTION_CHANGE_SCALE;
            (drivers.sway + drivers.velocity + load_impact + drivers.direction_change)
                * self.config.balance_depletion_rate
        } else {
            load_impact * STATIONARY_LOAD_SHARE
        };
        drivers.recovery = self.recovery_rate(load.current_weight);

        let change = (drivers.recovery * RECOVERY_GAIN - drivers.total_negative) * dt;
        self.current_balance = (self.current_balance + change).clamp(0.0, self.config.max_balance);

        let ratio = self.ratio();
        let ratio_changed = (ratio - self.last_ratio).abs() > f32::EPSILON;
        self.last_ratio = ratio;

        let critical = self.current_balance < self.danger_threshold(load.current_weight);
        let critical_changed = critical != self.critical;
        self.critical = critical;

        let fall_triggered = self.movement_enabled()
            && self.current_balance <= self.fall_threshold(load.current_weight);
        if fall_triggered {
            // Falling interrupts any stationary recovery
            self.stationary_timer = 0.0;
            self.is_stationary = false;
        }

        BalanceTick {
            balance: self.current_balance,
            ratio,
            ratio_changed,
            critical,
            critical_changed,
            fall_triggered,
            drivers,
        }
    }

    /// Impulse in `[0, 1]` after a sharp turn, decaying over half a second.
    fn direction_change_impulse(&mut self, input: Vec3, dt: f32) -> f32 {
        let direction = input.normalize_or_zero();
        if self.last_direction != Vec3::ZERO
            && direction != Vec3::ZERO
            && self.last_direction.dot(direction) < DIRECTION_CHANGE_DOT
        {
            self.direction_change_timer = DIRECTION_CHANGE_DECAY;
        }
        self.last_direction = direction;

        if self.direction_change_timer > 0.0 {
            self.direction_change_timer -= dt;
            (self.direction_change_timer / DIRECTION_CHANGE_DECAY).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Partial recovery after a fall, then a hold before control resumes.
    pub fn restore_after_fall(&mut self) {
        self.current_balance = self.config.max_balance * self.config.fall_restore_fraction;
        self.fall_hold_timer = self.config.fall_hold_duration;
        self.stationary_timer = 0.0;
        self.is_stationary = false;
    }

    /// External balance damage. Interrupts stationary recovery.
    pub fn reduce_balance(&mut self, amount: f32) {
        self.current_balance = (self.current_balance - amount.max(0.0)).max(0.0);
        self.stationary_timer = 0.0;
    }

    /// Locomotion speed multiplier in `[0.1, 1.0]`.
    pub fn movement_multiplier(&self, current_weight: f32) -> f32 {
        let speed = 1.0 - current_weight * self.config.weight_speed_modifier;
        let ratio = self.ratio();
        let balance_penalty = if ratio < LOW_BALANCE_SPEED_RATIO {
            (1.0 - ratio) * LOW_BALANCE_SPEED_PENALTY
        } else {
            0.0
        };
        (speed - balance_penalty).clamp(MIN_SPEED_MULTIPLIER, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn walking(direction: Vec3) -> MovementSample {
        MovementSample {
            input: direction,
            velocity: direction * 3.0,
            moving: true,
        }
    }

    fn loaded(weight: f32, stack_height: f32) -> LoadSnapshot {
        LoadSnapshot {
            current_weight: weight,
            stack_height,
            center_of_mass_offset: 0.0,
            sway_intensity: 1.0,
        }
    }

    #[test]
    fn test_recovery_rate_matches_tick_driver() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        let load = loaded(60.0, 2.0);
        sim.reduce_balance(50.0);
        // Past the delay and the flat bonus so every term is in play
        for _ in 0..180 {
            let tick = sim.update(&MovementSample::idle(), &load, DT);
            assert_eq!(tick.drivers.recovery, sim.recovery_rate(load.current_weight));
        }
        // 1.5 * (1 - 0.4 * 0.9) + min(2 * 3 / 2, 4) + 1
        assert!((sim.recovery_rate(60.0) - 4.96).abs() < 1e-2);
    }

    #[test]
    fn test_starts_full_and_stable() {
        let sim = BalanceSimulator::new(&PorterConfig::default());
        assert_eq!(sim.balance(), 100.0);
        assert_eq!(sim.state().band, BalanceBand::Stable);
        assert!(!sim.state().recovering);
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(BalanceBand::from_ratio(0.71), BalanceBand::Stable);
        assert_eq!(BalanceBand::from_ratio(0.7), BalanceBand::Unstable);
        assert_eq!(BalanceBand::from_ratio(0.41), BalanceBand::Unstable);
        assert_eq!(BalanceBand::from_ratio(0.4), BalanceBand::Critical);
        assert_eq!(BalanceBand::from_ratio(0.21), BalanceBand::Critical);
        assert_eq!(BalanceBand::from_ratio(0.2), BalanceBand::Falling);
        assert_eq!(BalanceBand::from_ratio(0.0), BalanceBand::Falling);
    }

    #[test]
    fn test_state_label_with_recovering() {
        let state = BalanceState {
            band: BalanceBand::Unstable,
            recovering: true,
        };
        assert_eq!(state.to_string(), "Unstable (Recovering)");
        let state = BalanceState {
            band: BalanceBand::Falling,
            recovering: false,
        };
        assert_eq!(state.to_string(), "Falling");
    }

    #[test]
    fn test_stationary_recovery_rises_to_max() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        sim.reduce_balance(50.0);
        let mut previous = sim.balance();
        for _ in 0..180 {
            let tick = sim.update(&MovementSample::idle(), &LoadSnapshot::default(), DT);
            assert!(tick.balance <= sim.max_balance());
            if previous < sim.max_balance() {
                assert!(tick.balance > previous, "{} !> {}", tick.balance, previous);
            }
            previous = tick.balance;
        }
        assert_eq!(sim.balance(), 100.0);
        assert!(sim.state().recovering);
    }

    #[test]
    fn test_recovery_bonus_waits_for_delay() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        sim.update(&MovementSample::idle(), &LoadSnapshot::default(), 0.4);
        assert_eq!(sim.recovery_rate(0.0), 1.5);
        sim.update(&MovementSample::idle(), &LoadSnapshot::default(), 0.2);
        // 0.6s still: bonus = 2 * 0.6 / 2
        assert!((sim.recovery_rate(0.0) - 2.1).abs() < 1e-5);
        sim.update(&MovementSample::idle(), &LoadSnapshot::default(), 5.0);
        // Capped at 2x bonus plus the patience bonus
        assert!((sim.recovery_rate(0.0) - (1.5 + 4.0 + 1.0)).abs() < 1e-5);
    }

    #[test]
    fn test_moving_with_full_load_drains() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        let tick = sim.update(&walking(Vec3::X), &loaded(120.0, 10.0), DT);
        assert!(tick.balance < 100.0);
        assert!(tick.drivers.weight > 0.0);
        assert!(tick.drivers.stack > 0.0);
        assert!(tick.drivers.total_negative > tick.drivers.recovery * 8.0);
        assert!(!sim.is_stationary());
    }

    #[test]
    fn test_stationary_only_tenth_of_load() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        let tick = sim.update(&MovementSample::idle(), &loaded(120.0, 15.0), DT);
        let d = tick.drivers;
        assert_eq!(d.sway, 0.0);
        assert_eq!(d.direction_change, 0.0);
        assert!((d.total_negative - (d.weight + d.stack + d.center_of_mass) * 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_sharp_turn_adds_impulse() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        let load = loaded(60.0, 0.0);
        sim.update(&walking(Vec3::X), &load, DT);
        let steady = sim.update(&walking(Vec3::X), &load, DT);
        assert_eq!(steady.drivers.direction_change, 0.0);
        let turn = sim.update(&walking(Vec3::NEG_X), &load, DT);
        assert!(turn.drivers.direction_change > 0.0);
        assert!(turn.drivers.total_negative > steady.drivers.total_negative);

        // Decays to nothing after half a second of straight walking
        let mut last = turn;
        for _ in 0..40 {
            last = sim.update(&walking(Vec3::NEG_X), &load, DT);
        }
        assert_eq!(last.drivers.direction_change, 0.0);
    }

    #[test]
    fn test_gentle_turn_has_no_impulse() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        let load = loaded(60.0, 0.0);
        sim.update(&walking(Vec3::X), &load, DT);
        let tick = sim.update(&walking(Vec3::new(1.0, 0.0, 0.5).normalize()), &load, DT);
        assert_eq!(tick.drivers.direction_change, 0.0);
    }

    #[test]
    fn test_center_of_mass_offset_drives_loss() {
        let mut centred = BalanceSimulator::new(&PorterConfig::default());
        let mut offset = BalanceSimulator::new(&PorterConfig::default());
        let mut load = loaded(40.0, 2.0);
        let a = centred.update(&walking(Vec3::Z), &load, DT);
        load.center_of_mass_offset = 0.5;
        let b = offset.update(&walking(Vec3::Z), &load, DT);
        assert!((b.drivers.center_of_mass - 15.0).abs() < 1e-5);
        assert!(b.balance < a.balance);
    }

    #[test]
    fn test_thresholds_shrink_with_weight() {
        let sim = BalanceSimulator::new(&PorterConfig::default());
        assert_eq!(sim.danger_threshold(0.0), 30.0);
        assert!((sim.danger_threshold(120.0) - 30.0 * (1.0 - 0.8 * 0.3)).abs() < 1e-4);
        assert_eq!(sim.fall_threshold(0.0), 10.0);
        assert!(sim.fall_threshold(120.0) < 10.0);
    }

    #[test]
    fn test_critical_reported_on_transition() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        sim.reduce_balance(75.0);
        let first = sim.update(&walking(Vec3::X), &LoadSnapshot::default(), DT);
        assert!(first.critical);
        assert!(first.critical_changed);
        let second = sim.update(&walking(Vec3::X), &LoadSnapshot::default(), DT);
        assert!(second.critical);
        assert!(!second.critical_changed);
    }

    #[test]
    fn test_fall_triggers_and_restore_holds() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        sim.reduce_balance(95.0);
        let tick = sim.update(&MovementSample::idle(), &LoadSnapshot::default(), DT);
        assert!(tick.fall_triggered);
        assert!(!sim.is_stationary());

        sim.restore_after_fall();
        assert_eq!(sim.balance(), 100.0 * 0.6);
        assert!(!sim.movement_enabled());

        // No re-trigger during the hold even when knocked down again
        sim.reduce_balance(58.0);
        let held = sim.update(&MovementSample::idle(), &LoadSnapshot::default(), DT);
        assert!(!held.fall_triggered);

        for _ in 0..70 {
            sim.update(&MovementSample::idle(), &LoadSnapshot::default(), DT);
        }
        assert!(sim.movement_enabled());
    }

    #[test]
    fn test_reduce_balance_clamps_and_resets_stationary() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        sim.update(&MovementSample::idle(), &LoadSnapshot::default(), 1.0);
        assert!(sim.stationary_time() > 0.0);
        sim.reduce_balance(500.0);
        assert_eq!(sim.balance(), 0.0);
        assert_eq!(sim.stationary_time(), 0.0);
        sim.reduce_balance(-20.0);
        assert_eq!(sim.balance(), 0.0);
    }

    #[test]
    fn test_balance_stays_in_bounds() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        let directions = [Vec3::X, Vec3::NEG_Z, Vec3::NEG_X, Vec3::Z];
        for i in 0..2000 {
            let movement = if i % 7 < 5 {
                walking(directions[i % 4])
            } else {
                MovementSample::idle()
            };
            let load = LoadSnapshot {
                current_weight: (i % 121) as f32,
                stack_height: (i % 16) as f32,
                center_of_mass_offset: (i % 3) as f32 * 0.4,
                sway_intensity: 2.0,
            };
            let tick = sim.update(&movement, &load, DT * ((i % 5) as f32 + 1.0));
            if tick.fall_triggered {
                sim.restore_after_fall();
            }
            assert!((0.0..=100.0).contains(&sim.balance()));
        }
    }

    #[test]
    fn test_movement_multiplier() {
        let mut sim = BalanceSimulator::new(&PorterConfig::default());
        assert_eq!(sim.movement_multiplier(0.0), 1.0);
        assert!((sim.movement_multiplier(120.0) - 0.4).abs() < 1e-5);
        sim.reduce_balance(80.0);
        // ratio 0.2: 0.4 - 0.8 * 0.3
        assert!((sim.movement_multiplier(120.0) - 0.16).abs() < 1e-5);
        sim.reduce_balance(20.0);
        assert_eq!(sim.movement_multiplier(120.0), 0.1);
    }
}
