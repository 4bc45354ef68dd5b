//! Stacking placement: finds a free vertical slot above the carry anchor.
//!
//! Algorithm: bottom-up scan
//! 1. Start at the anchor's world position (height 0)
//! 2. Box-query the candidate position with a box half the item's size
//! 3. Only hits on *other carried cargo* block a slot; scenery is ignored.
//!    Slots that in-flight cargo is still moving to block it too
//! 4. Step up by `item height + stack_spacing` until `max_stack_height`
//! 5. No free slot → fall back to the anchor base (items may interpenetrate)

use glam::{Quat, Vec3};

use crate::cargo::{CargoItem, StackLayer};
use crate::config::PorterConfig;
use crate::scene::{Aabb, NodeId, SceneGraph, SpatialQuery};

/// Fraction of the item's size used as overlap-query half-extents.
const QUERY_EXTENT_FRACTION: f32 = 0.25;

/// Result of a slot search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    /// World-space position for the item.
    pub position: Vec3,
    /// Height above the anchor.
    pub height: f32,
    /// False when the scan found nothing and fell back to the base.
    pub found: bool,
}

/// Find the lowest collision-free slot for `item` above `anchor`.
///
/// `carried` lists the physical nodes of cargo already on the porter;
/// `item` itself is never treated as an obstacle. `reserved` holds the
/// world boxes of slots that carried cargo has not reached yet.
pub fn find_slot<S: SceneGraph + SpatialQuery>(
    scene: &S,
    anchor: NodeId,
    item: NodeId,
    carried: &[NodeId],
    reserved: &[Aabb],
    config: &PorterConfig,
) -> Slot {
    let base = scene.world_position(anchor);
    let bounds = scene.bounds(item);
    let half_extents = bounds.size() * QUERY_EXTENT_FRACTION;
    let step = bounds.height() + config.stack_spacing;

    let mut height = 0.0;
    while height < config.max_stack_height {
        let candidate = base + Vec3::Y * height;
        let query = Aabb::from_center_half_extents(candidate, half_extents);
        if !reserved.iter().any(|r| r.overlaps(&query))
            && is_position_clear(scene, candidate, half_extents, item, carried, config)
        {
            log::debug!("slot for {:?} at height {:.2}", item, height);
            return Slot {
                position: candidate,
                height,
                found: true,
            };
        }
        if step <= 0.0 {
            break;
        }
        height += step;
    }

    log::warn!(
        "no free slot for {:?} below {:.1}, stacking at anchor base",
        item,
        config.max_stack_height
    );
    Slot {
        position: base,
        height: 0.0,
        found: false,
    }
}

fn is_position_clear<S: SpatialQuery>(
    scene: &S,
    position: Vec3,
    half_extents: Vec3,
    item: NodeId,
    carried: &[NodeId],
    config: &PorterConfig,
) -> bool {
    !scene
        .query_overlap(position, half_extents, Quat::IDENTITY, config.cargo_layer_mask)
        .iter()
        .any(|hit| *hit != item && carried.contains(hit))
}

/// Height of the stack: highest mounted item top above the anchor.
pub fn recompute_stack_height<S: SceneGraph>(
    scene: &S,
    anchor: NodeId,
    items: &[CargoItem],
) -> f32 {
    let anchor_y = scene.world_position(anchor).y;
    items
        .iter()
        .filter(|i| i.is_mounted)
        .filter_map(|i| i.node)
        .filter(|n| scene.contains(*n))
        .map(|n| scene.bounds(n).max.y - anchor_y)
        .fold(0.0, f32::max)
}

/// Group mounted items into height bands by their assigned slot.
///
/// An item joins the current band when its slot starts below the band's
/// top; otherwise it opens a new band.
pub fn build_stack_layers<S: SceneGraph>(scene: &S, items: &[CargoItem]) -> Vec<StackLayer> {
    let mut mounted: Vec<(f32, f32, &str)> = items
        .iter()
        .filter(|i| i.is_mounted)
        .filter_map(|i| {
            let node = i.node.filter(|n| scene.contains(*n))?;
            Some((
                i.local_mount_position.y,
                scene.bounds(node).height(),
                i.id.as_str(),
            ))
        })
        .collect();
    mounted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut layers: Vec<StackLayer> = Vec::new();
    for (y, item_height, id) in mounted {
        match layers.last_mut() {
            Some(layer) if y < layer.height + layer.max_item_height => {
                layer.items.push(id.to_string());
                layer.max_item_height = layer.max_item_height.max(item_height);
            }
            _ => layers.push(StackLayer {
                height: y,
                items: vec![id.to_string()],
                max_item_height: item_height,
            }),
        }
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SimScene;

    const CARGO: u32 = 1;

    fn setup() -> (SimScene, NodeId) {
        let mut scene = SimScene::new();
        let anchor = scene.spawn_marker(Vec3::new(0.0, 1.0, 0.0));
        (scene, anchor)
    }

    fn mounted_item(scene: &mut SimScene, anchor: NodeId, height: f32, id: &str) -> CargoItem {
        let base = scene.world_position(anchor);
        let node = scene.spawn(base + Vec3::Y * height, Vec3::ONE, CARGO);
        let mut item = CargoItem::new(id, id, node, 10.0);
        item.is_mounted = true;
        item.local_mount_position = Vec3::Y * height;
        item
    }

    #[test]
    fn test_empty_stack_uses_base() {
        let (mut scene, anchor) = setup();
        let item = scene.spawn(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE, CARGO);
        let slot = find_slot(&scene, anchor, item, &[], &[], &PorterConfig::default());
        assert!(slot.found);
        assert_eq!(slot.height, 0.0);
        assert_eq!(slot.position, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_second_item_stacks_above_first() {
        let (mut scene, anchor) = setup();
        let first = mounted_item(&mut scene, anchor, 0.0, "a");
        let item = scene.spawn(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE, CARGO);
        let carried = [first.node.unwrap()];
        let slot = find_slot(&scene, anchor, item, &carried, &[], &PorterConfig::default());
        assert!(slot.found);
        assert!((slot.height - 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_accepted_slot_is_clear_of_carried_cargo() {
        let (mut scene, anchor) = setup();
        let config = PorterConfig::default();
        let mut carried = Vec::new();
        for (i, h) in [0.0, 1.1, 2.2].iter().enumerate() {
            carried.push(mounted_item(&mut scene, anchor, *h, &i.to_string()).node.unwrap());
        }
        let item = scene.spawn(Vec3::new(5.0, 0.0, 0.0), Vec3::new(1.0, 0.8, 1.0), CARGO);
        let slot = find_slot(&scene, anchor, item, &carried, &[], &config);
        assert!(slot.found);
        let half = scene.bounds(item).size() * QUERY_EXTENT_FRACTION;
        let hits = scene.query_overlap(slot.position, half, Quat::IDENTITY, config.cargo_layer_mask);
        assert!(hits.iter().all(|h| !carried.contains(h)));
    }

    #[test]
    fn test_scenery_does_not_block() {
        let (mut scene, anchor) = setup();
        // Non-carried cargo-layer object sitting on the anchor
        let _scenery = scene.spawn(Vec3::new(0.0, 1.0, 0.0), Vec3::ONE, CARGO);
        let item = scene.spawn(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE, CARGO);
        let slot = find_slot(&scene, anchor, item, &[], &[], &PorterConfig::default());
        assert_eq!(slot.height, 0.0);
    }

    #[test]
    fn test_lowest_gap_is_preferred() {
        let (mut scene, anchor) = setup();
        // Slot 0 is free, slot 1 is taken
        let upper = mounted_item(&mut scene, anchor, 1.1, "upper");
        let item = scene.spawn(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE, CARGO);
        let carried = [upper.node.unwrap()];
        let slot = find_slot(&scene, anchor, item, &carried, &[], &PorterConfig::default());
        assert_eq!(slot.height, 0.0);
    }

    #[test]
    fn test_reserved_slot_is_skipped() {
        let (mut scene, anchor) = setup();
        // Base slot promised to cargo still in the air
        let reserved = [Aabb::from_center_half_extents(
            scene.world_position(anchor),
            Vec3::splat(0.5),
        )];
        let item = scene.spawn(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE, CARGO);
        let slot = find_slot(&scene, anchor, item, &[], &reserved, &PorterConfig::default());
        assert!(slot.found);
        assert!((slot.height - 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_full_stack_degrades_to_base() {
        let (mut scene, anchor) = setup();
        let config = PorterConfig {
            max_stack_height: 2.0,
            ..Default::default()
        };
        let a = mounted_item(&mut scene, anchor, 0.0, "a");
        let b = mounted_item(&mut scene, anchor, 1.1, "b");
        let item = scene.spawn(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE, CARGO);
        let slot = find_slot(
            &scene,
            anchor,
            item,
            &[a.node.unwrap(), b.node.unwrap()],
            &[],
            &config,
        );
        assert!(!slot.found);
        assert_eq!(slot.position, scene.world_position(anchor));
    }

    #[test]
    fn test_stack_height_is_highest_top() {
        let (mut scene, anchor) = setup();
        let items = vec![
            mounted_item(&mut scene, anchor, 0.0, "a"),
            mounted_item(&mut scene, anchor, 1.1, "b"),
        ];
        // b spans 1.1 ± 0.5 above the anchor
        let h = recompute_stack_height(&scene, anchor, &items);
        assert!((h - 1.6).abs() < 1e-5);
        assert_eq!(recompute_stack_height(&scene, anchor, &[]), 0.0);
    }

    #[test]
    fn test_stack_layers_group_by_band() {
        let (mut scene, anchor) = setup();
        let items = vec![
            mounted_item(&mut scene, anchor, 1.1, "top"),
            mounted_item(&mut scene, anchor, 0.0, "left"),
            mounted_item(&mut scene, anchor, 0.2, "right"),
        ];
        let layers = build_stack_layers(&scene, &items);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].items, vec!["left".to_string(), "right".to_string()]);
        assert_eq!(layers[1].items, vec!["top".to_string()]);
        assert_eq!(layers[1].max_item_height, 1.0);
    }
}
