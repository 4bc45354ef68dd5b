//! Cargo records: one carried load and the stack layers derived from them.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{CargoError, PorterResult};
use crate::scene::{NodeId, SceneGraph};

/// Sway contribution given to items built by the cargo detector.
pub const DEFAULT_BALANCE_IMPACT: f32 = 2.0;

/// A single carried load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoItem {
    pub id: String,
    pub name: String,
    /// Physical node in the host scene. `None` is an invalid item.
    pub node: Option<NodeId>,
    /// Assigned slot relative to the carry anchor.
    pub local_mount_position: Vec3,
    pub mount_offset: Vec3,
    pub weight: f32,
    pub size: f32,
    pub fragile: bool,
    /// Per-item contribution to sway intensity.
    pub balance_impact: f32,
    pub is_mounted: bool,
}

impl CargoItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, node: NodeId, weight: f32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node: Some(node),
            local_mount_position: Vec3::ZERO,
            mount_offset: Vec3::ZERO,
            weight,
            size: 1.0,
            fragile: false,
            balance_impact: DEFAULT_BALANCE_IMPACT,
            is_mounted: false,
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_fragile(mut self, fragile: bool) -> Self {
        self.fragile = fragile;
        self
    }

    pub fn with_balance_impact(mut self, impact: f32) -> Self {
        self.balance_impact = impact;
        self
    }

    /// The item's node, if it exists in `scene`.
    pub fn resolve_node<S: SceneGraph + ?Sized>(&self, scene: &S) -> PorterResult<NodeId> {
        match self.node {
            Some(node) if scene.contains(node) => Ok(node),
            _ => Err(CargoError::InvalidCargo {
                id: self.id.clone(),
                reason: "no physical node in the scene",
            }),
        }
    }

    /// Weight must be finite and not negative.
    pub fn validate_weight(&self) -> PorterResult<()> {
        let reason = if !self.weight.is_finite() {
            "weight is not finite"
        } else if self.weight < 0.0 {
            "negative weight"
        } else {
            return Ok(());
        };
        Err(CargoError::InvalidCargo {
            id: self.id.clone(),
            reason,
        })
    }
}

/// A height band of the stack and the items mounted in it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StackLayer {
    /// Bottom of the band relative to the anchor.
    pub height: f32,
    /// Ids of the items mounted in this band.
    pub items: Vec<String>,
    /// Tallest item in the band.
    pub max_item_height: f32,
}

/// Sum of item weights.
pub fn total_weight(items: &[CargoItem]) -> f32 {
    items.iter().map(|i| i.weight).sum()
}

/// Aggregate sway intensity: `clamp(sum(balance_impact) * 0.2, 0.5, 2.0)`.
pub fn sway_intensity(items: &[CargoItem]) -> f32 {
    let impact: f32 = items.iter().map(|i| i.balance_impact).sum();
    (impact * 0.2).clamp(0.5, 2.0)
}
