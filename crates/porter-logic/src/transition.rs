//! Time-bounded mount and reorganize animations.
//!
//! Each transition is a plain task record polled once per tick; there is
//! no suspension. A task moves one cargo node from where it was when the
//! task started to its slot on the carry anchor, then snaps the node's
//! local pose to the slot exactly.
//!
//! | Kind | Duration | Position | Arc | Rotation |
//! |------|----------|----------|-----|----------|
//! | `Mount` | 0.5s | smoothstep | `sin(t·π)·arc_height` | blends to anchor when auto-rotate |
//! | `Reorganize` | 0.3s | smoothstep | none | unchanged |

use glam::{Quat, Vec3};

use crate::scene::{NodeId, SceneGraph};

/// Ease-in-out curve on `[0, 1]`.
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionKind {
    /// Fresh pickup: hops onto the stack.
    Mount { arc_height: f32, auto_rotate: bool },
    /// Re-layout after a drop: flat slide.
    Reorganize,
}

/// One in-flight transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionTask {
    pub cargo_id: String,
    pub node: NodeId,
    pub anchor: NodeId,
    pub kind: TransitionKind,
    /// Slot relative to the anchor.
    pub target_local_position: Vec3,
    start_position: Vec3,
    start_rotation: Quat,
    /// Local rotation applied on completion (mounts only).
    final_local_rotation: Option<Quat>,
    elapsed: f32,
    duration: f32,
}

impl TransitionTask {
    #[allow(clippy::too_many_arguments)]
    pub fn mount<S: SceneGraph>(
        scene: &S,
        anchor: NodeId,
        cargo_id: &str,
        node: NodeId,
        slot: Vec3,
        duration: f32,
        arc_height: f32,
        auto_rotate: bool,
    ) -> Self {
        let start_rotation = scene.world_rotation(node);
        let final_local_rotation = if auto_rotate {
            Quat::IDENTITY
        } else {
            // Keep the world orientation the item had when picked up
            scene.world_rotation(anchor).inverse() * start_rotation
        };
        Self {
            cargo_id: cargo_id.to_string(),
            node,
            anchor,
            kind: TransitionKind::Mount {
                arc_height,
                auto_rotate,
            },
            target_local_position: slot,
            start_position: scene.world_position(node),
            start_rotation,
            final_local_rotation: Some(final_local_rotation),
            elapsed: 0.0,
            duration,
        }
    }

    pub fn reorganize<S: SceneGraph>(
        scene: &S,
        anchor: NodeId,
        cargo_id: &str,
        node: NodeId,
        slot: Vec3,
        duration: f32,
    ) -> Self {
        Self {
            cargo_id: cargo_id.to_string(),
            node,
            anchor,
            kind: TransitionKind::Reorganize,
            target_local_position: slot,
            start_position: scene.world_position(node),
            start_rotation: scene.world_rotation(node),
            final_local_rotation: None,
            elapsed: 0.0,
            duration,
        }
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    fn apply_interpolated<S: SceneGraph>(&self, scene: &mut S) {
        let progress = self.progress();
        let eased = smoothstep(progress);
        let target = scene.transform_point(self.anchor, self.target_local_position);
        let mut position = self.start_position.lerp(target, eased);

        if let TransitionKind::Mount {
            arc_height,
            auto_rotate,
        } = self.kind
        {
            position.y += (progress * std::f32::consts::PI).sin() * arc_height;
            let target_rotation = if auto_rotate {
                scene.world_rotation(self.anchor)
            } else {
                self.start_rotation
            };
            scene.set_world_rotation(self.node, self.start_rotation.slerp(target_rotation, eased));
        }
        scene.set_world_position(self.node, position);
    }

    fn snap<S: SceneGraph>(&self, scene: &mut S) {
        scene.set_local_position(self.node, self.target_local_position);
        if let Some(rotation) = self.final_local_rotation {
            scene.set_local_rotation(self.node, rotation);
        }
    }
}

/// A transition that reached its slot this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTransition {
    pub cargo_id: String,
    pub node: NodeId,
    pub kind: TransitionKind,
}

/// Active transition tasks, at most one per node.
#[derive(Debug, Clone, Default)]
pub struct TransitionScheduler {
    tasks: Vec<TransitionTask>,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `task`, replacing any in-flight task for the same node.
    /// Returns true if a task was superseded.
    pub fn schedule(&mut self, task: TransitionTask) -> bool {
        let superseded = self.cancel(task.node).is_some();
        self.tasks.push(task);
        superseded
    }

    /// Remove the task for `node` without snapping it.
    pub fn cancel(&mut self, node: NodeId) -> Option<TransitionTask> {
        let index = self.tasks.iter().position(|t| t.node == node)?;
        Some(self.tasks.remove(index))
    }

    pub fn is_active(&self, node: NodeId) -> bool {
        self.tasks.iter().any(|t| t.node == node)
    }

    pub fn task(&self, node: NodeId) -> Option<&TransitionTask> {
        self.tasks.iter().find(|t| t.node == node)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance every task by `dt`, writing poses into `scene`.
    /// Tasks whose node has left the scene are discarded.
    pub fn advance<S: SceneGraph>(&mut self, dt: f32, scene: &mut S) -> Vec<CompletedTransition> {
        let mut completed = Vec::new();
        self.tasks.retain_mut(|task| {
            if !scene.contains(task.node) {
                return false;
            }
            task.elapsed += dt.max(0.0);
            if task.is_finished() {
                task.snap(scene);
                log::debug!("transition for '{}' settled", task.cargo_id);
                completed.push(CompletedTransition {
                    cargo_id: task.cargo_id.clone(),
                    node: task.node,
                    kind: task.kind,
                });
                false
            } else {
                task.apply_interpolated(scene);
                true
            }
        });
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SimScene;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    fn setup() -> (SimScene, NodeId, NodeId) {
        let mut scene = SimScene::new();
        let anchor = scene.spawn_marker(Vec3::new(0.0, 1.0, 0.0));
        let node = scene.spawn(Vec3::new(4.0, 0.0, 0.0), Vec3::ONE, 1);
        scene.set_parent(node, Some(anchor));
        (scene, anchor, node)
    }

    #[test]
    fn test_smoothstep_endpoints() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(0.5), 0.5);
        assert_eq!(smoothstep(2.0), 1.0);
        assert!(smoothstep(0.25) < 0.25);
    }

    #[test]
    fn test_mount_arcs_above_straight_line() {
        let (mut scene, anchor, node) = setup();
        let mut sched = TransitionScheduler::new();
        let task = TransitionTask::mount(&scene, anchor, "a", node, Vec3::ZERO, 0.5, 2.0, true);
        sched.schedule(task);

        sched.advance(0.25, &mut scene);
        let mid = scene.world_position(node);
        // Halfway: eased lerp gives y = 0.5, arc adds the full 2.0
        assert!((mid.y - 2.5).abs() < 1e-4, "mid y = {}", mid.y);
        assert!(sched.is_active(node));
    }

    #[test]
    fn test_mount_snaps_exactly_on_completion() {
        let (mut scene, anchor, node) = setup();
        let mut sched = TransitionScheduler::new();
        let slot = Vec3::new(0.0, 1.1, 0.0);
        sched.schedule(TransitionTask::mount(&scene, anchor, "a", node, slot, 0.5, 2.0, true));

        let mut done = Vec::new();
        for _ in 0..40 {
            done.extend(sched.advance(1.0 / 60.0, &mut scene));
        }
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].cargo_id, "a");
        assert_eq!(scene.local_position(node), slot);
        assert!(sched.is_empty());
    }

    #[test]
    fn test_mount_without_auto_rotate_keeps_world_orientation() {
        let (mut scene, anchor, node) = setup();
        let item_rotation = Quat::from_rotation_y(0.7);
        scene.set_world_rotation(node, item_rotation);
        scene.set_world_rotation(anchor, Quat::from_rotation_y(-0.3));
        let mut sched = TransitionScheduler::new();
        sched.schedule(TransitionTask::mount(&scene, anchor, "a", node, Vec3::ZERO, 0.5, 2.0, false));
        sched.advance(1.0, &mut scene);
        assert!(scene.world_rotation(node).angle_between(item_rotation) < 1e-3);
    }

    #[test]
    fn test_mount_with_auto_rotate_matches_anchor() {
        let (mut scene, anchor, node) = setup();
        scene.set_world_rotation(node, Quat::from_rotation_y(0.7));
        let mut sched = TransitionScheduler::new();
        sched.schedule(TransitionTask::mount(&scene, anchor, "a", node, Vec3::ZERO, 0.5, 2.0, true));
        sched.advance(1.0, &mut scene);
        assert!(scene.world_rotation(node).angle_between(scene.world_rotation(anchor)) < 1e-3);
    }

    #[test]
    fn test_reorganize_is_flat() {
        let (mut scene, anchor, node) = setup();
        scene.set_world_position(node, Vec3::new(0.0, 3.0, 0.0));
        let mut sched = TransitionScheduler::new();
        sched.schedule(TransitionTask::reorganize(&scene, anchor, "a", node, Vec3::ZERO, 0.3));
        sched.advance(0.15, &mut scene);
        // Halfway between y=3 and y=1, no arc
        assert!(approx(scene.world_position(node), Vec3::new(0.0, 2.0, 0.0)));
    }

    #[test]
    fn test_new_task_supersedes_old() {
        let (mut scene, anchor, node) = setup();
        let mut sched = TransitionScheduler::new();
        sched.schedule(TransitionTask::mount(&scene, anchor, "a", node, Vec3::ZERO, 0.5, 2.0, true));
        let superseded = sched.schedule(TransitionTask::reorganize(
            &scene,
            anchor,
            "a",
            node,
            Vec3::new(0.0, 2.0, 0.0),
            0.3,
        ));
        assert!(superseded);
        assert_eq!(sched.len(), 1);
        sched.advance(0.3, &mut scene);
        assert_eq!(scene.local_position(node), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_cancel_leaves_node_in_place() {
        let (mut scene, anchor, node) = setup();
        let mut sched = TransitionScheduler::new();
        sched.schedule(TransitionTask::mount(&scene, anchor, "a", node, Vec3::ZERO, 0.5, 2.0, true));
        sched.advance(0.1, &mut scene);
        let before = scene.world_position(node);
        assert!(sched.cancel(node).is_some());
        assert!(sched.advance(1.0, &mut scene).is_empty());
        assert_eq!(scene.world_position(node), before);
    }

    #[test]
    fn test_despawned_node_is_dropped() {
        let (mut scene, anchor, node) = setup();
        let mut sched = TransitionScheduler::new();
        sched.schedule(TransitionTask::mount(&scene, anchor, "a", node, Vec3::ZERO, 0.5, 2.0, true));
        scene.despawn(node);
        assert!(sched.advance(1.0, &mut scene).is_empty());
        assert!(sched.is_empty());
    }
}
