//! Cargo inventory: the list of carried items and every change to it.
//!
//! Only the inventory mutates the cargo list and the items' mount fields.
//! Pickup validates, places and launches a mount transition; drop detaches
//! and arms a delayed re-layout of the remaining stack.
//!
//! Reorganize policy: heaviest item at the base, each item sitting at the
//! running sum of `height + stack_spacing` of the items below it. The list
//! is snapshotted, sorted (stable on equal weights) and swapped in whole.
//! An item whose running height reaches `max_stack_height` goes to the
//! anchor base, the same degraded placement the slot scan uses.

use glam::{Vec2, Vec3};

use crate::balance::LoadSnapshot;
use crate::cargo::{sway_intensity, total_weight, CargoItem, StackLayer};
use crate::config::PorterConfig;
use crate::error::PorterResult;
use crate::placement::{build_stack_layers, find_slot, recompute_stack_height};
use crate::scene::{Aabb, NodeId, SceneGraph, SpatialQuery};
use crate::transition::{TransitionScheduler, TransitionTask};

#[derive(Debug, Clone)]
pub struct CargoInventory {
    config: PorterConfig,
    anchor: NodeId,
    items: Vec<CargoItem>,
    current_weight: f32,
    sway_intensity: f32,
    stack_height: f32,
    stack_layers: Vec<StackLayer>,
    /// Seconds until the pending reorganize runs.
    reorganize_timer: Option<f32>,
}

impl CargoInventory {
    pub fn new(config: &PorterConfig, anchor: NodeId) -> Self {
        Self {
            config: config.clone(),
            anchor,
            items: Vec::new(),
            current_weight: 0.0,
            sway_intensity: sway_intensity(&[]),
            stack_height: 0.0,
            stack_layers: Vec::new(),
            reorganize_timer: None,
        }
    }

    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    pub fn items(&self) -> &[CargoItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&CargoItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_weight(&self) -> f32 {
        self.current_weight
    }

    pub fn max_weight(&self) -> f32 {
        self.config.max_carry_weight
    }

    pub fn weight_ratio(&self) -> f32 {
        self.current_weight / self.config.max_carry_weight
    }

    pub fn sway_intensity(&self) -> f32 {
        self.sway_intensity
    }

    pub fn stack_height(&self) -> f32 {
        self.stack_height
    }

    pub fn stack_layers(&self) -> &[StackLayer] {
        &self.stack_layers
    }

    pub fn reorganize_pending(&self) -> bool {
        self.reorganize_timer.is_some()
    }

    pub fn can_admit(&self, item: &CargoItem) -> bool {
        item.validate_weight().is_ok()
            && self.current_weight + item.weight <= self.config.max_carry_weight
    }

    /// Heaviest carried item; the earliest one wins ties.
    pub fn heaviest_item(&self) -> Option<&CargoItem> {
        let mut heaviest: Option<&CargoItem> = None;
        for item in &self.items {
            if heaviest.map_or(true, |h| item.weight > h.weight) {
                heaviest = Some(item);
            }
        }
        heaviest
    }

    fn refresh_totals(&mut self) {
        self.current_weight = total_weight(&self.items);
        self.sway_intensity = sway_intensity(&self.items);
    }

    /// Pick up `item` and start mounting it.
    ///
    /// Returns `Ok(false)` with no state change when the item would exceed
    /// capacity or is already carried. An item without a live physical
    /// node, or with a negative or non-finite weight, is rejected with
    /// [`crate::error::CargoError::InvalidCargo`].
    pub fn pickup<S: SceneGraph + SpatialQuery>(
        &mut self,
        mut item: CargoItem,
        scene: &mut S,
        scheduler: &mut TransitionScheduler,
    ) -> PorterResult<bool> {
        let node = item
            .resolve_node(&*scene)
            .and_then(|node| item.validate_weight().map(|()| node))
            .inspect_err(|e| log::warn!("pickup refused: {}", e))?;

        if !self.can_admit(&item) {
            log::debug!(
                "'{}' ({:.1}kg) exceeds capacity: {:.1}/{:.1}kg",
                item.id,
                item.weight,
                self.current_weight,
                self.config.max_carry_weight
            );
            return Ok(false);
        }
        if self.items.iter().any(|i| i.id == item.id || i.node == Some(node)) {
            log::warn!("'{}' is already carried", item.id);
            return Ok(false);
        }

        let carried: Vec<NodeId> = self.items.iter().filter_map(|i| i.node).collect();
        // Slots still being flown to count as taken
        let reserved: Vec<Aabb> = self
            .items
            .iter()
            .filter_map(|i| i.node.and_then(|n| scheduler.task(n)))
            .map(|task| {
                Aabb::from_center_half_extents(
                    scene.transform_point(self.anchor, task.target_local_position),
                    scene.bounds(task.node).size() * 0.5,
                )
            })
            .collect();
        let slot = find_slot(
            &*scene,
            self.anchor,
            node,
            &carried,
            &reserved,
            &self.config,
        );
        item.local_mount_position =
            scene.inverse_transform_point(self.anchor, slot.position) + item.mount_offset;
        item.is_mounted = true;

        scene.set_kinematic(node, true);
        scene.set_parent(node, Some(self.anchor));
        scheduler.schedule(TransitionTask::mount(
            &*scene,
            self.anchor,
            &item.id,
            node,
            item.local_mount_position,
            self.config.mount_duration,
            self.config.mount_arc_height,
            self.config.auto_rotate_items,
        ));

        log::info!(
            "picked up '{}' ({:.1}kg) at stack height {:.2}",
            item.id,
            item.weight,
            slot.height
        );
        self.items.push(item);
        self.refresh_totals();
        Ok(true)
    }

    /// Drop the item with `id`, returning it detached from the anchor.
    ///
    /// Unknown ids are a no-op (`Ok(None)`). The remaining stack is
    /// re-laid out after the settle delay; further drops inside that
    /// window share the same pass.
    pub fn drop<S: SceneGraph>(
        &mut self,
        id: &str,
        scene: &mut S,
        scheduler: &mut TransitionScheduler,
    ) -> PorterResult<Option<CargoItem>> {
        let Some(index) = self.items.iter().position(|i| i.id == id) else {
            return Ok(None);
        };
        let node = self.items[index]
            .resolve_node(&*scene)
            .inspect_err(|e| log::warn!("drop refused: {}", e))?;

        let mut item = self.items.remove(index);
        scheduler.cancel(node);
        scene.set_kinematic(node, false);
        scene.set_parent(node, None);
        item.is_mounted = false;

        self.refresh_totals();
        self.refresh_stack(&*scene);
        self.reorganize_timer = Some(self.config.reorganize_settle_delay);

        log::info!(
            "dropped '{}', carrying {:.1}/{:.1}kg",
            item.id,
            self.current_weight,
            self.config.max_carry_weight
        );
        Ok(Some(item))
    }

    /// Count down the pending reorganize; runs it when the delay elapses.
    /// Returns the ids of items given a new slot.
    pub fn tick_reorganize<S: SceneGraph>(
        &mut self,
        dt: f32,
        scene: &S,
        scheduler: &mut TransitionScheduler,
    ) -> Vec<String> {
        let Some(remaining) = self.reorganize_timer else {
            return Vec::new();
        };
        let remaining = remaining - dt;
        if remaining > 0.0 {
            self.reorganize_timer = Some(remaining);
            return Vec::new();
        }
        self.reorganize_timer = None;
        self.reorganize(scene, scheduler)
    }

    /// Re-lay the whole stack heaviest-first and animate every item there.
    pub fn reorganize<S: SceneGraph>(
        &mut self,
        scene: &S,
        scheduler: &mut TransitionScheduler,
    ) -> Vec<String> {
        let mut snapshot = self.items.clone();
        snapshot.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let base = scene.world_position(self.anchor);
        let mut accumulated = 0.0;
        let mut moved = Vec::new();
        for item in snapshot.iter_mut().filter(|i| i.is_mounted) {
            let Some(node) = item.node.filter(|n| scene.contains(*n)) else {
                continue;
            };
            let height = if accumulated < self.config.max_stack_height {
                accumulated
            } else {
                log::warn!(
                    "'{}' does not fit below {:.1}, stacking at anchor base",
                    item.id,
                    self.config.max_stack_height
                );
                0.0
            };
            let target = base + Vec3::Y * height;
            item.local_mount_position =
                scene.inverse_transform_point(self.anchor, target) + item.mount_offset;
            accumulated += scene.bounds(node).height() + self.config.stack_spacing;

            scheduler.schedule(TransitionTask::reorganize(
                scene,
                self.anchor,
                &item.id,
                node,
                item.local_mount_position,
                self.config.reorganize_duration,
            ));
            moved.push(item.id.clone());
        }

        self.items = snapshot;
        log::info!("reorganized {} items, stack {:.2} tall", moved.len(), accumulated);
        moved
    }

    /// Recompute stack height and layers from the scene.
    pub fn refresh_stack<S: SceneGraph>(&mut self, scene: &S) {
        self.stack_height = recompute_stack_height(scene, self.anchor, &self.items);
        self.stack_layers = build_stack_layers(scene, &self.items);
    }

    /// Horizontal distance of the weight-weighted slot centroid from the anchor.
    pub fn center_of_mass_offset<S: SceneGraph>(&self, scene: &S) -> f32 {
        let mut weighted = Vec3::ZERO;
        let mut total = 0.0;
        for item in self.items.iter().filter(|i| i.is_mounted) {
            weighted += scene.transform_point(self.anchor, item.local_mount_position) * item.weight;
            total += item.weight;
        }
        if total <= 0.0 {
            return 0.0;
        }
        let offset = weighted / total - scene.world_position(self.anchor);
        Vec2::new(offset.x, offset.z).length()
    }

    /// Aggregate figures the balance simulator reads each tick.
    pub fn load_snapshot<S: SceneGraph>(&self, scene: &S) -> LoadSnapshot {
        LoadSnapshot {
            current_weight: self.current_weight,
            stack_height: self.stack_height,
            center_of_mass_offset: self.center_of_mass_offset(scene),
            sway_intensity: self.sway_intensity,
        }
    }
}
