//! Host scene interface: physical nodes, attachment, overlap queries.
//!
//! The simulation never owns physical objects. It talks to the host
//! through two traits: [`SceneGraph`] for node transforms, parenting and
//! the kinematic flag, and [`SpatialQuery`] for box overlap tests. A game
//! engine implements them over its own scene; [`SimScene`] is a small
//! in-memory host used by tests and the headless harness.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque handle to a physical node owned by the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// World-space axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Strict overlap: boxes that only touch faces do not overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }
}

/// Transform and attachment services for physical nodes.
///
/// Positions and rotations are world-space unless the method says local.
/// Local values are relative to the node's parent.
pub trait SceneGraph {
    fn contains(&self, node: NodeId) -> bool;

    fn world_position(&self, node: NodeId) -> Vec3;
    fn set_world_position(&mut self, node: NodeId, position: Vec3);
    fn world_rotation(&self, node: NodeId) -> Quat;
    fn set_world_rotation(&mut self, node: NodeId, rotation: Quat);

    fn local_position(&self, node: NodeId) -> Vec3;
    fn set_local_position(&mut self, node: NodeId, position: Vec3);
    fn set_local_rotation(&mut self, node: NodeId, rotation: Quat);

    /// Re-parent `node`, keeping its world pose. `None` detaches it.
    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>);
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Kinematic nodes are not moved by the host's physics.
    fn set_kinematic(&mut self, node: NodeId, kinematic: bool);
    fn is_kinematic(&self, node: NodeId) -> bool;

    /// World bounds of the node's collider (or a unit box if it has none).
    fn bounds(&self, node: NodeId) -> Aabb;

    /// Map a world point into `node`'s local frame.
    fn inverse_transform_point(&self, node: NodeId, point: Vec3) -> Vec3 {
        self.world_rotation(node).inverse() * (point - self.world_position(node))
    }

    /// Map a point in `node`'s local frame into world space.
    fn transform_point(&self, node: NodeId, point: Vec3) -> Vec3 {
        self.world_position(node) + self.world_rotation(node) * point
    }
}

/// Solid-volume overlap queries.
pub trait SpatialQuery {
    /// Every node on `layer_mask` whose collider overlaps the oriented box.
    fn query_overlap(
        &self,
        center: Vec3,
        half_extents: Vec3,
        orientation: Quat,
        layer_mask: u32,
    ) -> Vec<NodeId>;
}

#[derive(Debug, Clone)]
struct SimNode {
    parent: Option<NodeId>,
    local_position: Vec3,
    local_rotation: Quat,
    half_extents: Vec3,
    layer: u32,
    kinematic: bool,
}

/// In-memory scene: a node hierarchy with box colliders.
///
/// Colliders are treated as axis-aligned boxes around each node's world
/// position; query orientation is ignored. Unknown node ids read as the
/// origin and writes to them are dropped.
#[derive(Debug, Clone, Default)]
pub struct SimScene {
    nodes: HashMap<NodeId, SimNode>,
    next_id: u64,
}

impl SimScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a root node with a box collider of `size` on `layer`.
    pub fn spawn(&mut self, position: Vec3, size: Vec3, layer: u32) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            SimNode {
                parent: None,
                local_position: position,
                local_rotation: Quat::IDENTITY,
                half_extents: size * 0.5,
                layer,
                kinematic: false,
            },
        );
        id
    }

    /// Spawn a collider-less marker node (used for carry anchors).
    pub fn spawn_marker(&mut self, position: Vec3) -> NodeId {
        self.spawn(position, Vec3::ZERO, 0)
    }

    pub fn despawn(&mut self, node: NodeId) {
        self.nodes.remove(&node);
        for n in self.nodes.values_mut() {
            if n.parent == Some(node) {
                n.parent = None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if `node` is `root` or somewhere below it.
    fn is_within(&self, node: NodeId, root: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn parent_pose(&self, node: NodeId) -> (Vec3, Quat) {
        match self.nodes.get(&node).and_then(|n| n.parent) {
            Some(p) => (self.world_position(p), self.world_rotation(p)),
            None => (Vec3::ZERO, Quat::IDENTITY),
        }
    }
}

impl SceneGraph for SimScene {
    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn world_position(&self, node: NodeId) -> Vec3 {
        let Some(n) = self.nodes.get(&node) else {
            return Vec3::ZERO;
        };
        let (parent_pos, parent_rot) = self.parent_pose(node);
        parent_pos + parent_rot * n.local_position
    }

    fn set_world_position(&mut self, node: NodeId, position: Vec3) {
        let (parent_pos, parent_rot) = self.parent_pose(node);
        if let Some(n) = self.nodes.get_mut(&node) {
            n.local_position = parent_rot.inverse() * (position - parent_pos);
        }
    }

    fn world_rotation(&self, node: NodeId) -> Quat {
        let Some(n) = self.nodes.get(&node) else {
            return Quat::IDENTITY;
        };
        let (_, parent_rot) = self.parent_pose(node);
        parent_rot * n.local_rotation
    }

    fn set_world_rotation(&mut self, node: NodeId, rotation: Quat) {
        let (_, parent_rot) = self.parent_pose(node);
        if let Some(n) = self.nodes.get_mut(&node) {
            n.local_rotation = (parent_rot.inverse() * rotation).normalize();
        }
    }

    fn local_position(&self, node: NodeId) -> Vec3 {
        self.nodes
            .get(&node)
            .map(|n| n.local_position)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_local_position(&mut self, node: NodeId, position: Vec3) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.local_position = position;
        }
    }

    fn set_local_rotation(&mut self, node: NodeId, rotation: Quat) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.local_rotation = rotation;
        }
    }

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) {
        // Refuse parents that would close a cycle
        let invalid_parent =
            parent.is_some_and(|p| !self.contains(p) || self.is_within(p, node));
        if !self.contains(node) || invalid_parent {
            return;
        }
        let position = self.world_position(node);
        let rotation = self.world_rotation(node);
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = parent;
        }
        self.set_world_position(node, position);
        self.set_world_rotation(node, rotation);
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn set_kinematic(&mut self, node: NodeId, kinematic: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.kinematic = kinematic;
        }
    }

    fn is_kinematic(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.kinematic)
    }

    fn bounds(&self, node: NodeId) -> Aabb {
        let half = self
            .nodes
            .get(&node)
            .map(|n| n.half_extents)
            .filter(|h| *h != Vec3::ZERO)
            .unwrap_or(Vec3::splat(0.5));
        Aabb::from_center_half_extents(self.world_position(node), half)
    }
}

impl SpatialQuery for SimScene {
    fn query_overlap(
        &self,
        center: Vec3,
        half_extents: Vec3,
        _orientation: Quat,
        layer_mask: u32,
    ) -> Vec<NodeId> {
        let query = Aabb::from_center_half_extents(center, half_extents);
        let mut hits: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.layer & layer_mask != 0 && n.half_extents != Vec3::ZERO)
            .filter(|(id, _)| self.bounds(**id).overlaps(&query))
            .map(|(id, _)| *id)
            .collect();
        hits.sort();
        hits
    }
}
