//! Porter notifications and the observer list that fans them out.
//!
//! UI, audio and VFX collaborators subscribe explicitly and receive every
//! event the porter publishes, in publish order. Unsubscribing with the
//! returned [`SubscriptionId`] stops delivery immediately.

use serde::{Deserialize, Serialize};

/// Why an item left the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropCause {
    /// Requested by the player or a collaborator.
    Voluntary,
    /// Shed during a fall sequence.
    Fall,
}

/// Something observers may care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PorterEvent {
    /// Balance ratio in `[0, 1]` changed this tick.
    BalanceChanged { ratio: f32 },
    /// Carried weight changed; ratio of capacity.
    WeightChanged { ratio: f32 },
    /// Entered (`true`) or left (`false`) the critical band.
    CriticalChanged { critical: bool },
    /// A fragile item lost durability.
    CargoDamaged { cargo_id: String, durability: f32 },
    CargoDropped { cargo_id: String, cause: DropCause },
    /// A fragile item finished mounting; its own logic should stop.
    FragileSecured { cargo_id: String },
    /// A fragile item left the porter; its own logic should resume.
    FragileReleased { cargo_id: String },
    /// Balance hit the fall threshold.
    FallStarted { items_to_drop: usize },
    /// Fall sequence done; balance restored to `balance`.
    FallRecovered { balance: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&PorterEvent)>;

/// Ordered list of subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
    published: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PorterEvent) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, event: PorterEvent) {
        self.published += 1;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Total events published since creation.
    pub fn published_count(&self) -> u64 {
        self.published
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("published", &self.published)
            .finish()
    }
}
