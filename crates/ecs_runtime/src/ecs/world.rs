//! ECS World implementation
//!
//! The world is the facade simulation code talks to. It owns the entity
//! registry, the component store, the event bus and the system scheduler,
//! wraps every structural mutation with the matching [`WorldEvent`], and
//! drives the fixed per-frame sequence:
//!
//! 1. run every enabled system (`update`)
//! 2. purge the entities that were pending when the flush began, emitting
//!    `entity:destroyed` for each
//! 3. re-validate the query cache
//!
//! Entities destroyed while the frame runs therefore keep their components
//! readable until step 2, whichever system asked for the removal.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use super::component::{Component, ComponentBundle, ComponentType};
use super::entity::{Entity, EntityId};
use super::registry::{EntityRegistry, RegistryStats};
use super::scheduler::{SchedulerError, SystemScheduler, SystemStats};
use super::storage::{ComponentStats, ComponentStore};
use super::system::System;
use crate::core::config::RuntimeConfig;
use crate::events::{EventBus, EventBusStats, EventContext, EventKind, ListenerId, WorldEvent};

/// World lifecycle; `Destroyed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorldState {
    /// Constructed, systems not yet initialised
    Uninitialized,
    /// Initialised and running frames
    Ready,
    /// Torn down; frames are no-ops
    Destroyed,
}

impl fmt::Display for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Aggregated statistics of the world and its collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldStats {
    /// Lifecycle state
    pub state: WorldState,
    /// Completed frames
    pub frame_count: u64,
    /// Simulated seconds
    pub total_time: f64,
    /// Entity registry statistics
    pub entities: RegistryStats,
    /// Component store statistics
    pub components: ComponentStats,
    /// Event bus statistics
    pub events: EventBusStats,
    /// Per-system statistics in execution order
    pub systems: Vec<SystemStats>,
}

/// ECS World containing all entities, components, systems and events
pub struct World {
    pub(crate) registry: EntityRegistry,
    pub(crate) components: ComponentStore,
    pub(crate) events: EventBus<WorldEvent, World>,
    pub(crate) scheduler: SystemScheduler,
    state: WorldState,
    frame_count: u64,
    total_time: f64,
}

impl World {
    /// Create a new world with default limits
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    /// Create a new world using the event limits of `config`
    pub fn with_config(config: &RuntimeConfig) -> Self {
        if let Err(error) = config.validate() {
            log::warn!("Creating world with questionable configuration: {}", error);
        }
        Self {
            registry: EntityRegistry::new(),
            components: ComponentStore::new(),
            events: EventBus::with_config(config.events.clone()),
            scheduler: SystemScheduler::new(),
            state: WorldState::Uninitialized,
            frame_count: 0,
            total_time: 0.0,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bind the scheduler, initialise every system and announce readiness
    ///
    /// Calling it again, or after destruction, only logs a warning.
    pub fn init(&mut self) {
        match self.state {
            WorldState::Ready => {
                log::warn!("World already initialized");
                return;
            }
            WorldState::Destroyed => {
                log::warn!("Cannot initialize a destroyed world");
                return;
            }
            WorldState::Uninitialized => {}
        }

        self.scheduler.bind();
        if let Err(error) = SystemScheduler::init_all(self) {
            log::error!("System initialization failed: {}", error);
        }
        self.state = WorldState::Ready;

        self.emit(WorldEvent::WorldInitialized);
        log::info!("World initialized with {} systems", self.scheduler.len());
    }

    /// Run one simulation frame
    pub fn update(&mut self, delta_time: f32) {
        if self.state == WorldState::Destroyed {
            return;
        }

        SystemScheduler::update(self, delta_time);
        self.flush_removals();
        self.components.validate_cache();

        self.frame_count += 1;
        self.total_time += f64::from(delta_time);
    }

    /// Let every enabled system produce output for this frame
    pub fn render(&mut self, interpolation: f32) {
        if self.state == WorldState::Destroyed {
            return;
        }
        SystemScheduler::render(self, interpolation);
    }

    /// Tear the world down; idempotent
    ///
    /// Listeners see `world:destroying` while everything is still intact.
    pub fn destroy(&mut self) {
        if self.state == WorldState::Destroyed {
            return;
        }

        self.emit(WorldEvent::WorldDestroying);

        SystemScheduler::destroy_all(self);
        self.scheduler.unbind();
        self.registry.clear();
        self.components.clear();
        self.events.clear();

        self.state = WorldState::Destroyed;
        log::info!("World destroyed after {} frames", self.frame_count);
    }

    fn flush_removals(&mut self) {
        let batch = self.registry.pending_removals().to_vec();
        if batch.is_empty() {
            return;
        }

        for &entity in &batch {
            let purged = self.components.remove_all_from_entity(entity);
            log::trace!("Purging entity {} ({} components)", entity, purged);
            self.emit(WorldEvent::EntityDestroyed { entity });
        }
        self.registry.flush_batch(&batch);

        // Listeners of `entity:destroyed` may still have attached components
        for &entity in &batch {
            let stray = self.components.remove_all_from_entity(entity);
            if stray > 0 {
                log::warn!(
                    "Dropped {} components attached to entity {} while it was destroyed",
                    stray,
                    entity
                );
            }
        }
    }

    /// Current lifecycle state
    pub const fn state(&self) -> WorldState {
        self.state
    }

    /// Completed frames
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Simulated seconds accumulated over all frames
    pub const fn total_time(&self) -> f64 {
        self.total_time
    }

    // ========================================================================
    // Entities
    // ========================================================================

    /// Create an entity and emit `entity:created`
    pub fn create_entity(&mut self, tag: Option<&str>) -> EntityId {
        let entity = self.registry.create(tag);
        let (id, tag) = (entity.id(), entity.tag().map(str::to_owned));
        log::debug!("Created entity {}", id);

        self.emit(WorldEvent::EntityCreated { entity: id, tag });
        id
    }

    /// Create an entity and attach every component of `bundle` to it
    ///
    /// Each component is added individually and emits its own
    /// `component:added`, after `entity:created`.
    pub fn create_entity_with(&mut self, tag: Option<&str>, bundle: ComponentBundle) -> EntityId {
        let id = self.create_entity(tag);
        for (component_type, data) in bundle.into_items() {
            self.components.add_boxed(id, component_type.clone(), data);
            self.emit(WorldEvent::ComponentAdded {
                entity: id,
                component_type,
            });
        }
        id
    }

    /// Request deferred destruction and emit `entity:destroying` right away
    ///
    /// Components stay readable until the end of the current frame. Returns
    /// `false` for an unknown entity.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        if !self.registry.mark_for_removal(id) {
            return false;
        }
        self.emit(WorldEvent::EntityDestroying { entity: id });
        true
    }

    /// Entity record, including one pending removal
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.registry.get(id)
    }

    /// Whether the entity exists and is not pending removal
    pub fn entity_exists(&self, id: EntityId) -> bool {
        self.registry.exists(id)
    }

    /// Active entities carrying `tag`, in id order
    pub fn entities_by_tag(&self, tag: &str) -> Vec<EntityId> {
        self.registry.get_by_tag(tag).into_iter().map(Entity::id).collect()
    }

    /// Every active entity, in id order
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.registry.get_all_ids()
    }

    /// Number of active entities
    pub fn entity_count(&self) -> usize {
        self.registry.count()
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Attach (or replace) a component and emit `component:added`
    ///
    /// Returns the stored component as left by the listeners, or `None` if a
    /// listener removed it again. Entities without a registry record (never
    /// created, or already flushed) get nothing attached and return `None`.
    /// Entities pending removal still accept components; the flush purges
    /// them with the rest.
    pub fn add_component<T: Any>(
        &mut self,
        entity: EntityId,
        component_type: impl Into<ComponentType>,
        data: T,
    ) -> Option<&mut T> {
        let component_type = component_type.into();
        if self.registry.get(entity).is_none() {
            log::warn!(
                "Ignoring component '{}' for unknown entity {}",
                component_type,
                entity
            );
            return None;
        }
        self.components.add(entity, component_type.clone(), data);
        self.emit(WorldEvent::ComponentAdded {
            entity,
            component_type: component_type.clone(),
        });
        self.components.get_mut::<T>(entity, component_type.as_str())
    }

    /// Attach a typed component under its own key
    pub fn insert_component<C: Component>(&mut self, entity: EntityId, component: C) -> Option<&mut C> {
        self.add_component(entity, C::TYPE, component)
    }

    /// Borrow a component; `None` if absent or not a `T`
    pub fn get_component<T: Any>(&self, entity: EntityId, component_type: &str) -> Option<&T> {
        self.components.get(entity, component_type)
    }

    /// Mutably borrow a component; `None` if absent or not a `T`
    pub fn get_component_mut<T: Any>(&mut self, entity: EntityId, component_type: &str) -> Option<&mut T> {
        self.components.get_mut(entity, component_type)
    }

    /// Borrow a typed component
    pub fn component<C: Component>(&self, entity: EntityId) -> Option<&C> {
        self.get_component(entity, C::TYPE.as_str())
    }

    /// Mutably borrow a typed component
    pub fn component_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        self.get_component_mut(entity, C::TYPE.as_str())
    }

    /// Whether the entity holds a component of this type
    pub fn has_component(&self, entity: EntityId, component_type: &str) -> bool {
        self.components.has(entity, component_type)
    }

    /// Detach a component; emits `component:removed` only if one was removed
    pub fn remove_component(&mut self, entity: EntityId, component_type: &str) -> bool {
        if !self.components.remove(entity, component_type) {
            return false;
        }
        self.emit(WorldEvent::ComponentRemoved {
            entity,
            component_type: ComponentType::from(component_type.to_string()),
        });
        true
    }

    /// Entities holding every listed type, in id order
    ///
    /// The result is a snapshot. An empty type list yields no entities.
    pub fn query<S: AsRef<str>>(&mut self, component_types: &[S]) -> Vec<EntityId> {
        self.components.query(component_types)
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Dispatch an event to its listeners before returning
    pub fn emit(&mut self, event: WorldEvent) {
        EventBus::emit(self, event);
    }

    /// Emit an application-defined event carrying `payload`
    pub fn emit_custom<T: Any>(&mut self, name: impl Into<Cow<'static, str>>, payload: T) {
        self.emit(WorldEvent::custom(name, payload));
    }

    /// Subscribe to one event kind
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&mut Self, &WorldEvent) + 'static,
    {
        self.events.on(kind, callback)
    }

    /// Subscribe for a single delivery
    pub fn once<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&mut Self, &WorldEvent) + 'static,
    {
        self.events.once(kind, callback)
    }

    /// Subscribe to every event
    pub fn on_any<F>(&mut self, callback: F) -> ListenerId
    where
        F: Fn(&mut Self, &WorldEvent) + 'static,
    {
        self.events.on_any(callback)
    }

    /// Remove one listener registration
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Defer an event until the next [`Self::flush_events`]
    pub fn queue_event(&mut self, event: WorldEvent) {
        self.events.queue(event);
    }

    /// Deliver queued events; returns the number processed
    pub fn flush_events(&mut self) -> usize {
        EventBus::flush(self)
    }

    /// Read-only view of the event bus
    pub const fn events(&self) -> &EventBus<WorldEvent, Self> {
        &self.events
    }

    /// Mutable access to the event bus, e.g. to toggle history
    pub fn events_mut(&mut self) -> &mut EventBus<WorldEvent, Self> {
        &mut self.events
    }

    // ========================================================================
    // Systems
    // ========================================================================

    /// Register a system; initialised immediately if the world is ready
    pub fn register_system(&mut self, system: Box<dyn System>) -> Result<(), SchedulerError> {
        SystemScheduler::register(self, system)
    }

    /// Destroy and remove a system; `false` for an unknown name
    pub fn unregister_system(&mut self, name: &str) -> bool {
        SystemScheduler::unregister(self, name)
    }

    /// Look up a registered system by name
    pub fn system(&self, name: &str) -> Option<&dyn System> {
        self.scheduler.get(name)
    }

    /// Mutably look up a registered system by name
    pub fn system_mut(&mut self, name: &str) -> Option<&mut dyn System> {
        self.scheduler.get_mut(name)
    }

    /// Read-only view of the scheduler
    pub const fn scheduler(&self) -> &SystemScheduler {
        &self.scheduler
    }

    /// Scheduler access for enabling, disabling and re-prioritising systems
    pub fn scheduler_mut(&mut self) -> &mut SystemScheduler {
        &mut self.scheduler
    }

    // ========================================================================
    // Collaborators and statistics
    // ========================================================================

    /// Read-only view of the entity registry
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Read-only view of the component store
    pub const fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// Snapshot of world statistics
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            state: self.state,
            frame_count: self.frame_count,
            total_time: self.total_time,
            entities: self.registry.stats(),
            components: self.components.stats(),
            events: self.events.stats(),
            systems: self.scheduler.stats(),
        }
    }
}

impl EventContext<WorldEvent> for World {
    fn event_bus(&mut self) -> &mut EventBus<WorldEvent, Self> {
        &mut self.events
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("state", &self.state)
            .field("entities", &self.registry.count())
            .field("systems", &self.scheduler.len())
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}
