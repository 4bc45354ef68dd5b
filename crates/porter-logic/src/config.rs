//! Porter tuning: carry capacity, stacking, balance and transition timing.
//!
//! Every tunable the simulation reads lives in [`PorterConfig`]. The
//! defaults are the values the game ships with; a host can override any
//! subset from JSON because every field falls back to its default.
//!
//! ```
//! use porter_logic::config::{validate_config, PorterConfig};
//!
//! let mut config = PorterConfig::default();
//! config.max_carry_weight = 80.0;
//! assert!(validate_config(&config).is_empty());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunable parameters for one porter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PorterConfig {
    // ── Carrying ──
    /// Total weight the porter may carry (kg).
    pub max_carry_weight: f32,
    /// Linear speed penalty per carried kg.
    pub weight_speed_modifier: f32,

    // ── Stacking ──
    /// Vertical gap between stacked items.
    pub stack_spacing: f32,
    /// Highest slot the placement scan will try above the anchor.
    pub max_stack_height: f32,
    /// Layer mask passed to overlap queries.
    pub cargo_layer_mask: u32,
    /// Rotate mounted items to match the anchor.
    pub auto_rotate_items: bool,

    // ── Balance ──
    pub max_balance: f32,
    /// Base recovery per second before the x8 balance gain.
    pub balance_recovery_rate: f32,
    /// Scale applied to all negative drivers while moving (0–1).
    pub balance_depletion_rate: f32,
    /// Balance below which the porter is "critical" (shrinks with load).
    pub balance_danger_threshold: f32,
    /// Balance at or below which the porter falls (shrinks with load).
    pub balance_fall_threshold: f32,
    /// Bonus recovery when standing still, grows to 2x over time.
    pub stationary_recovery_bonus: f32,
    /// Seconds of standing still before the bonus applies.
    pub stationary_recovery_delay: f32,

    // ── Fall sequence ──
    /// Fraction of carried items lost in a fall (rounded up).
    pub fall_drop_fraction: f32,
    /// Fraction of max balance restored after a fall.
    pub fall_restore_fraction: f32,
    /// Seconds the porter is held after a fall.
    pub fall_hold_duration: f32,
    /// Durability lost by each fragile item dropped in a fall.
    pub fragile_fall_damage: f32,

    // ── Transitions ──
    pub mount_duration: f32,
    /// Peak height of the hop a mounting item makes.
    pub mount_arc_height: f32,
    pub reorganize_duration: f32,
    /// Delay after a drop before the stack is re-laid out.
    pub reorganize_settle_delay: f32,
}

impl Default for PorterConfig {
    fn default() -> Self {
        Self {
            max_carry_weight: 120.0,
            weight_speed_modifier: 0.005,
            stack_spacing: 0.1,
            max_stack_height: 15.0,
            cargo_layer_mask: u32::MAX,
            auto_rotate_items: true,
            max_balance: 100.0,
            balance_recovery_rate: 1.5,
            balance_depletion_rate: 0.25,
            balance_danger_threshold: 30.0,
            balance_fall_threshold: 10.0,
            stationary_recovery_bonus: 2.0,
            stationary_recovery_delay: 0.5,
            fall_drop_fraction: 0.3,
            fall_restore_fraction: 0.6,
            fall_hold_duration: 1.0,
            fragile_fall_damage: 25.0,
            mount_duration: 0.5,
            mount_arc_height: 2.0,
            reorganize_duration: 0.3,
            reorganize_settle_delay: 0.1,
        }
    }
}

/// A single configuration problem.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigIssue {
    #[error("{0} must be positive, got {1}")]
    NotPositive(&'static str, f32),
    #[error("{0} must be non-negative, got {1}")]
    Negative(&'static str, f32),
    #[error("{0} must lie in [0, 1], got {1}")]
    OutOfUnitRange(&'static str, f32),
    #[error("fall threshold {fall} must be below danger threshold {danger}")]
    ThresholdOrder { fall: f32, danger: f32 },
    #[error("thresholds must not exceed max_balance {0}")]
    ThresholdAboveMax(f32),
}

/// Validate a porter configuration, returning all problems found.
pub fn validate_config(config: &PorterConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    let positive = [
        ("max_carry_weight", config.max_carry_weight),
        ("max_stack_height", config.max_stack_height),
        ("max_balance", config.max_balance),
        ("mount_duration", config.mount_duration),
        ("reorganize_duration", config.reorganize_duration),
    ];
    for (name, value) in positive {
        if !(value > 0.0) {
            issues.push(ConfigIssue::NotPositive(name, value));
        }
    }

    let non_negative = [
        ("stack_spacing", config.stack_spacing),
        ("weight_speed_modifier", config.weight_speed_modifier),
        ("balance_recovery_rate", config.balance_recovery_rate),
        ("stationary_recovery_bonus", config.stationary_recovery_bonus),
        ("stationary_recovery_delay", config.stationary_recovery_delay),
        ("fall_hold_duration", config.fall_hold_duration),
        ("fragile_fall_damage", config.fragile_fall_damage),
        ("mount_arc_height", config.mount_arc_height),
        ("reorganize_settle_delay", config.reorganize_settle_delay),
    ];
    for (name, value) in non_negative {
        if !(value >= 0.0) {
            issues.push(ConfigIssue::Negative(name, value));
        }
    }

    let unit = [
        ("balance_depletion_rate", config.balance_depletion_rate),
        ("fall_drop_fraction", config.fall_drop_fraction),
        ("fall_restore_fraction", config.fall_restore_fraction),
    ];
    for (name, value) in unit {
        if !(0.0..=1.0).contains(&value) {
            issues.push(ConfigIssue::OutOfUnitRange(name, value));
        }
    }

    if config.balance_fall_threshold >= config.balance_danger_threshold {
        issues.push(ConfigIssue::ThresholdOrder {
            fall: config.balance_fall_threshold,
            danger: config.balance_danger_threshold,
        });
    }
    if config.balance_danger_threshold > config.max_balance {
        issues.push(ConfigIssue::ThresholdAboveMax(config.max_balance));
    }

    issues
}
