//! The porter: one character carrying a stack of cargo.
//!
//! [`Porter`] owns the inventory, balance simulator, transition scheduler
//! and event bus, plus the injected scene host and movement provider. The
//! host calls [`Porter::tick`] once per frame. Within a tick the order is
//! fixed:
//!
//! 1. balance update from the current load,
//! 2. fall sequence if balance hit the threshold,
//! 3. pending stack reorganize,
//! 4. mount/reorganize transitions,
//! 5. carry-anchor sway.
//!
//! ```
//! use glam::Vec3;
//! use porter_logic::cargo::CargoItem;
//! use porter_logic::config::PorterConfig;
//! use porter_logic::input::ScriptedInput;
//! use porter_logic::porter::Porter;
//! use porter_logic::scene::SimScene;
//!
//! let mut scene = SimScene::new();
//! let anchor = scene.spawn_marker(Vec3::new(0.0, 1.5, 0.0));
//! let crate_node = scene.spawn(Vec3::new(2.0, 0.5, 0.0), Vec3::ONE, 1);
//!
//! let mut porter =
//!     Porter::new(PorterConfig::default(), scene, ScriptedInput::idle(), anchor).unwrap();
//! assert!(porter.pickup(CargoItem::new("crate", "Crate", crate_node, 40.0)).unwrap());
//! for _ in 0..60 {
//!     porter.tick(1.0 / 60.0);
//! }
//! assert_eq!(porter.inventory().current_weight(), 40.0);
//! ```

use std::collections::HashMap;

use crate::balance::{BalanceSimulator, BalanceState, BalanceTick};
use crate::cargo::CargoItem;
use crate::config::{validate_config, PorterConfig};
use crate::error::{CargoError, PorterResult};
use crate::events::{DropCause, EventBus, PorterEvent, SubscriptionId};
use crate::fragile::{CargoState, FragileCargo};
use crate::input::{MovementSample, MovementSource};
use crate::inventory::CargoInventory;
use crate::scene::{NodeId, SceneGraph, SpatialQuery};
use crate::sway::AnchorSway;
use crate::transition::{CompletedTransition, TransitionScheduler};

/// Number of items shed by a fall: `ceil(count * fraction)`.
///
/// A small tolerance keeps `10 * 0.3` at 3 despite f32 rounding.
pub fn fall_drop_count(count: usize, fraction: f32) -> usize {
    let raw = count as f64 * fraction as f64;
    (raw - 1e-6).ceil().max(0.0) as usize
}

pub struct Porter<S, M> {
    config: PorterConfig,
    scene: S,
    input: M,
    inventory: CargoInventory,
    balance: BalanceSimulator,
    transitions: TransitionScheduler,
    sway: AnchorSway,
    events: EventBus,
    fragile: HashMap<String, FragileCargo>,
}

impl<S: SceneGraph + SpatialQuery, M: MovementSource> Porter<S, M> {
    /// Build a porter carrying from `anchor`.
    ///
    /// Fails with [`CargoError::InvalidConfig`] if the config does not
    /// validate or the anchor is not in the scene.
    pub fn new(config: PorterConfig, scene: S, input: M, anchor: NodeId) -> PorterResult<Self> {
        let issues = validate_config(&config);
        if !issues.is_empty() {
            let joined = issues
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CargoError::InvalidConfig(joined));
        }
        if !scene.contains(anchor) {
            return Err(CargoError::InvalidConfig(format!(
                "carry anchor {:?} is not in the scene",
                anchor
            )));
        }

        let rest = scene.local_position(anchor);
        log::debug!(
            "porter ready: capacity {:.1}kg, max balance {:.1}",
            config.max_carry_weight,
            config.max_balance
        );
        Ok(Self {
            inventory: CargoInventory::new(&config, anchor),
            balance: BalanceSimulator::new(&config),
            transitions: TransitionScheduler::new(),
            sway: AnchorSway::new(rest),
            events: EventBus::new(),
            fragile: HashMap::new(),
            config,
            scene,
            input,
        })
    }

    pub fn config(&self) -> &PorterConfig {
        &self.config
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn input(&self) -> &M {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut M {
        &mut self.input
    }

    pub fn inventory(&self) -> &CargoInventory {
        &self.inventory
    }

    pub fn balance(&self) -> &BalanceSimulator {
        &self.balance
    }

    pub fn transitions(&self) -> &TransitionScheduler {
        &self.transitions
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PorterEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Track durability and lifecycle for a fragile item.
    pub fn register_fragile(&mut self, cargo: FragileCargo) {
        self.fragile.insert(cargo.id.clone(), cargo);
    }

    pub fn fragile_cargo(&self, id: &str) -> Option<&FragileCargo> {
        self.fragile.get(id)
    }

    pub fn can_admit(&self, item: &CargoItem) -> bool {
        self.inventory.can_admit(item)
    }

    pub fn weight_ratio(&self) -> f32 {
        self.inventory.weight_ratio()
    }

    pub fn is_stationary(&self) -> bool {
        self.balance.is_stationary()
    }

    pub fn balance_state(&self) -> BalanceState {
        self.balance.state()
    }

    pub fn reduce_balance(&mut self, amount: f32) {
        self.balance.reduce_balance(amount);
    }

    /// Locomotion speed multiplier for the current load and balance.
    pub fn apply_movement_modifiers(&self) -> f32 {
        self.balance
            .movement_multiplier(self.inventory.current_weight())
    }

    /// Pick up `item`; see [`CargoInventory::pickup`].
    pub fn pickup(&mut self, item: CargoItem) -> PorterResult<bool> {
        let id = item.id.clone();
        let fragile = item.fragile;
        let picked = self
            .inventory
            .pickup(item, &mut self.scene, &mut self.transitions)?;
        if !picked {
            return Ok(false);
        }

        if fragile {
            self.fragile
                .entry(id)
                .or_insert_with_key(|k| FragileCargo::new(k.clone()))
                .begin_mount();
        }
        self.events.publish(PorterEvent::WeightChanged {
            ratio: self.inventory.weight_ratio(),
        });
        Ok(true)
    }

    /// Voluntarily drop the item with `id`.
    pub fn drop(&mut self, id: &str) -> PorterResult<Option<CargoItem>> {
        self.drop_with_cause(id, DropCause::Voluntary)
    }

    fn drop_with_cause(&mut self, id: &str, cause: DropCause) -> PorterResult<Option<CargoItem>> {
        let Some(item) = self
            .inventory
            .drop(id, &mut self.scene, &mut self.transitions)?
        else {
            return Ok(None);
        };

        self.events.publish(PorterEvent::WeightChanged {
            ratio: self.inventory.weight_ratio(),
        });
        self.events.publish(PorterEvent::CargoDropped {
            cargo_id: item.id.clone(),
            cause,
        });
        if item.fragile {
            if let Some(cargo) = self.fragile.get_mut(&item.id) {
                cargo.reset();
            }
            self.events.publish(PorterEvent::FragileReleased {
                cargo_id: item.id.clone(),
            });
        }
        Ok(Some(item))
    }

    /// Advance the porter by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> BalanceTick {
        let movement = MovementSample::capture(&self.input);
        let load = self.inventory.load_snapshot(&self.scene);
        let tick = self.balance.update(&movement, &load, dt);

        if tick.ratio_changed {
            self.events
                .publish(PorterEvent::BalanceChanged { ratio: tick.ratio });
        }
        if tick.critical_changed {
            self.events.publish(PorterEvent::CriticalChanged {
                critical: tick.critical,
            });
        }
        if tick.fall_triggered {
            self.run_fall();
        }

        let moved = self
            .inventory
            .tick_reorganize(dt, &self.scene, &mut self.transitions);
        for id in &moved {
            if let Some(cargo) = self.fragile.get_mut(id) {
                if cargo.state == CargoState::Mounted {
                    cargo.state = CargoState::Transferring;
                }
            }
        }

        let completed = self.transitions.advance(dt, &mut self.scene);
        if !completed.is_empty() {
            self.inventory.refresh_stack(&self.scene);
            for done in &completed {
                self.on_transition_complete(done);
            }
        }

        self.update_anchor_sway(&movement, dt);
        tick
    }

    /// Shed the heaviest items, restore partial balance and start the hold.
    fn run_fall(&mut self) {
        let count = fall_drop_count(self.inventory.len(), self.config.fall_drop_fraction);
        log::info!(
            "fall: dropping {} of {} items at balance {:.1}",
            count,
            self.inventory.len(),
            self.balance.balance()
        );
        self.events
            .publish(PorterEvent::FallStarted { items_to_drop: count });

        for _ in 0..count {
            let Some(id) = self.inventory.heaviest_item().map(|i| i.id.clone()) else {
                break;
            };
            match self.drop_with_cause(&id, DropCause::Fall) {
                Ok(Some(item)) if item.fragile => self.damage_fragile(&item.id),
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    log::warn!("fall could not shed '{}': {}", id, e);
                    break;
                }
            }
        }

        self.balance.restore_after_fall();
        self.events.publish(PorterEvent::FallRecovered {
            balance: self.balance.balance(),
        });
    }

    fn damage_fragile(&mut self, id: &str) {
        let amount = self.config.fragile_fall_damage;
        let cargo = self
            .fragile
            .entry(id.to_string())
            .or_insert_with_key(|k| FragileCargo::new(k.clone()));
        if cargo.apply_damage(amount) > 0.0 {
            let durability = cargo.durability;
            if cargo.is_damaged() {
                log::warn!("'{}' broke in the fall", id);
            }
            self.events.publish(PorterEvent::CargoDamaged {
                cargo_id: id.to_string(),
                durability,
            });
        }
    }

    fn on_transition_complete(&mut self, done: &CompletedTransition) {
        let fragile = self
            .inventory
            .get(&done.cargo_id)
            .is_some_and(|item| item.fragile);
        if !fragile {
            return;
        }
        let cargo = self
            .fragile
            .entry(done.cargo_id.clone())
            .or_insert_with_key(|k| FragileCargo::new(k.clone()));
        match cargo.state {
            CargoState::Grounded | CargoState::Mounting => {
                cargo.disable();
                self.events.publish(PorterEvent::FragileSecured {
                    cargo_id: done.cargo_id.clone(),
                });
            }
            CargoState::Transferring => cargo.disable(),
            CargoState::Mounted | CargoState::Damaged => {}
        }
    }

    fn update_anchor_sway(&mut self, movement: &MovementSample, dt: f32) {
        let anchor = self.inventory.anchor();
        let current = self.scene.local_position(anchor);
        if let Some(next) = self.sway.update(
            movement.moving,
            self.inventory.weight_ratio(),
            self.inventory.sway_intensity(),
            current,
            dt,
        ) {
            self.scene.set_local_position(anchor, next);
        }
    }
}

impl<S, M> std::fmt::Debug for Porter<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Porter")
            .field("items", &self.inventory.len())
            .field("weight", &self.inventory.current_weight())
            .field("balance", &self.balance.balance())
            .field("transitions", &self.transitions.len())
            .finish()
    }
}
