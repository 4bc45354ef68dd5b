//! Fragile cargo lifecycle and durability.
//!
//! A fragile item runs its own logic (pickup detection, highlight, loader)
//! while it sits on the ground. Once mounted that logic is switched off;
//! when it is dropped it is switched back on. Damage reduces durability,
//! scaled by the item's protection, and a fully worn item is `Damaged`
//! for good.

use serde::{Deserialize, Serialize};

pub const DEFAULT_DURABILITY: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CargoState {
    Grounded,
    Mounting,
    Mounted,
    Transferring,
    Damaged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragileCargo {
    pub id: String,
    pub state: CargoState,
    pub durability: f32,
    /// Fraction of incoming damage absorbed, `[0, 1]`.
    pub damage_protection: f32,
}

impl FragileCargo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: CargoState::Grounded,
            durability: DEFAULT_DURABILITY,
            damage_protection: 0.0,
        }
    }

    pub fn with_protection(mut self, protection: f32) -> Self {
        self.damage_protection = protection.clamp(0.0, 1.0);
        self
    }

    pub fn is_damaged(&self) -> bool {
        self.state == CargoState::Damaged
    }

    /// Independent logic is active only while the item is on the ground.
    pub fn is_active(&self) -> bool {
        self.state == CargoState::Grounded
    }

    pub fn begin_mount(&mut self) {
        if !self.is_damaged() {
            self.state = CargoState::Mounting;
        }
    }

    /// Mount finished: stop the item's own update logic.
    pub fn disable(&mut self) {
        if !self.is_damaged() {
            self.state = CargoState::Mounted;
        }
    }

    /// Dropped: resume the item's own update logic.
    pub fn reset(&mut self) {
        if !self.is_damaged() {
            self.state = CargoState::Grounded;
        }
    }

    /// Apply raw damage; returns the durability actually lost.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        if self.is_damaged() || amount <= 0.0 {
            return 0.0;
        }
        let lost = (amount * (1.0 - self.damage_protection)).min(self.durability);
        self.durability -= lost;
        if self.durability <= 0.0 {
            self.durability = 0.0;
            self.state = CargoState::Damaged;
        }
        lost
    }
}
