//! System scheduling and lifecycle dispatch
//!
//! Systems run one at a time in descending priority; equal priorities keep
//! registration order. Because every hook receives `&mut World` and the
//! scheduler itself lives inside the world, a system is checked out of its
//! slot while its hook runs and checked back in afterwards. A system that
//! unregisters itself (or is unregistered by another participant) during its
//! own hook is destroyed on check-in.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::system::{System, SystemError};
use super::world::World;
use crate::foundation::fault;
use crate::foundation::time::{Stopwatch, Timing};

/// Wiring errors raised to the caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// A system with this name is already registered
    #[error("system '{0}' is already registered")]
    DuplicateRegistration(String),

    /// `init_all` was called before a world was bound
    #[error("scheduler is not bound to a world")]
    NotBound,
}

/// Per-system profiling and custom counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStats {
    /// Registration name
    pub name: String,
    /// Whether the system currently runs
    pub enabled: bool,
    /// Execution priority
    pub priority: i32,
    /// Completed `update` calls
    pub update_count: u64,
    /// Accumulated `update` time in milliseconds
    pub total_time_ms: f64,
    /// Mean `update` time in milliseconds
    pub average_time_ms: f64,
    /// Duration of the most recent `update` in milliseconds
    pub last_update_time_ms: f64,
    /// Counters reported by the system itself
    pub custom: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    Init,
    Update(f32),
    Render(f32),
    Destroy,
}

impl Hook {
    const fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Update(_) => "update",
            Self::Render(_) => "render",
            Self::Destroy => "destroy",
        }
    }
}

struct SystemSlot {
    priority: i32,
    enabled: bool,
    sequence: u64,
    system: Option<Box<dyn System>>,
    profile: Timing,
}

/// Priority-ordered registry of systems
pub struct SystemScheduler {
    slots: HashMap<Rc<str>, SystemSlot>,
    order: Vec<Rc<str>>,
    dirty: bool,
    bound: bool,
    next_sequence: u64,
}

impl SystemScheduler {
    /// Create an empty, unbound scheduler
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            order: Vec::new(),
            dirty: false,
            bound: false,
            next_sequence: 0,
        }
    }

    /// Register a system with `world`'s scheduler
    ///
    /// If the world is already initialised the system's `init` runs before
    /// this returns; otherwise it runs with the next [`Self::init_all`].
    pub fn register(world: &mut World, system: Box<dyn System>) -> Result<(), SchedulerError> {
        let name: Rc<str> = Rc::from(system.name());
        let scheduler = &mut world.scheduler;
        if scheduler.slots.contains_key(&name) {
            return Err(SchedulerError::DuplicateRegistration(name.to_string()));
        }

        let priority = system.priority();
        let sequence = scheduler.next_sequence;
        scheduler.next_sequence += 1;
        scheduler.slots.insert(
            Rc::clone(&name),
            SystemSlot {
                priority,
                enabled: true,
                sequence,
                system: Some(system),
                profile: Timing::default(),
            },
        );
        scheduler.order.push(Rc::clone(&name));
        scheduler.dirty = true;
        log::info!("Registered system '{}' (priority {})", name, priority);

        if scheduler.bound {
            Self::run_hook(world, &name, Hook::Init);
        }
        Ok(())
    }

    /// Destroy and remove a system; `false` for an unknown name
    pub fn unregister(world: &mut World, name: &str) -> bool {
        let Some(slot) = world.scheduler.remove_slot(name) else {
            return false;
        };

        // A system that is running right now is destroyed when it checks in
        if let Some(mut system) = slot.system {
            Self::destroy_detached(world, name, system.as_mut());
        }
        log::info!("Unregistered system '{}'", name);
        true
    }

    /// Run `init` on every registered system, including initialised ones
    pub fn init_all(world: &mut World) -> Result<(), SchedulerError> {
        if !world.scheduler.bound {
            return Err(SchedulerError::NotBound);
        }

        let names = world.scheduler.execution_order();
        for name in &names {
            Self::run_hook(world, name, Hook::Init);
        }
        log::info!("Initialized {} systems", names.len());
        Ok(())
    }

    /// Run `update` on every enabled system in priority order
    pub fn update(world: &mut World, delta_time: f32) {
        for name in world.scheduler.execution_order() {
            if world.scheduler.is_enabled(&name) {
                Self::run_hook(world, &name, Hook::Update(delta_time));
            }
        }
    }

    /// Run `render` on every enabled system in priority order
    pub fn render(world: &mut World, interpolation: f32) {
        for name in world.scheduler.execution_order() {
            if world.scheduler.is_enabled(&name) {
                Self::run_hook(world, &name, Hook::Render(interpolation));
            }
        }
    }

    /// Run `destroy` on every system, then drop all scheduler state
    pub fn destroy_all(world: &mut World) {
        for name in world.scheduler.execution_order() {
            Self::run_hook(world, &name, Hook::Destroy);
        }

        let scheduler = &mut world.scheduler;
        scheduler.slots.clear();
        scheduler.order.clear();
        scheduler.dirty = false;
        log::info!("All systems destroyed");
    }

    fn run_hook(world: &mut World, name: &str, hook: Hook) {
        let Some((sequence, mut system)) = world.scheduler.checkout(name) else {
            return;
        };

        let stopwatch = Stopwatch::start_new();
        let outcome = fault::contain(|| match hook {
            Hook::Init => system.init(world),
            Hook::Update(delta_time) => system.update(world, delta_time),
            Hook::Render(interpolation) => system.render(world, interpolation),
            Hook::Destroy => system.destroy(world),
        });
        let elapsed = stopwatch.elapsed();

        if let Err(error) = outcome.unwrap_or_else(|message| Err(SystemError::Panicked(message))) {
            log::error!("System '{}' failed in {}: {}", name, hook.label(), error);
        }

        let profile = matches!(hook, Hook::Update(_)).then_some(elapsed);
        if let Some(mut orphan) = world.scheduler.checkin(name, sequence, system, profile) {
            if !matches!(hook, Hook::Destroy) {
                Self::destroy_detached(world, name, orphan.as_mut());
            }
        }
    }

    fn destroy_detached(world: &mut World, name: &str, system: &mut dyn System) {
        let outcome = fault::contain(|| system.destroy(world));
        if let Err(error) = outcome.unwrap_or_else(|message| Err(SystemError::Panicked(message))) {
            log::error!("System '{}' failed in destroy: {}", name, error);
        }
    }

    fn checkout(&mut self, name: &str) -> Option<(u64, Box<dyn System>)> {
        let slot = self.slots.get_mut(name)?;
        slot.system.take().map(|system| (slot.sequence, system))
    }

    /// Put a system back; returns it if its slot no longer exists
    fn checkin(
        &mut self,
        name: &str,
        sequence: u64,
        system: Box<dyn System>,
        elapsed: Option<Duration>,
    ) -> Option<Box<dyn System>> {
        match self.slots.get_mut(name) {
            Some(slot) if slot.sequence == sequence && slot.system.is_none() => {
                if let Some(elapsed) = elapsed {
                    slot.profile.record(elapsed);
                }
                slot.system = Some(system);
                None
            }
            _ => Some(system),
        }
    }

    fn remove_slot(&mut self, name: &str) -> Option<SystemSlot> {
        let slot = self.slots.remove(name)?;
        self.order.retain(|other| &**other != name);
        Some(slot)
    }

    /// Names in execution order, re-sorting only when registration changed
    fn execution_order(&mut self) -> Vec<Rc<str>> {
        if self.dirty {
            let slots = &self.slots;
            self.order.sort_by_key(|name| {
                slots
                    .get(name)
                    .map_or((Reverse(i32::MIN), u64::MAX), |slot| (Reverse(slot.priority), slot.sequence))
            });
            self.dirty = false;
        }
        self.order.clone()
    }

    pub(crate) fn bind(&mut self) {
        self.bound = true;
    }

    pub(crate) fn unbind(&mut self) {
        self.bound = false;
    }

    /// Whether a world has been bound by initialisation
    pub const fn is_bound(&self) -> bool {
        self.bound
    }

    /// Enable or disable a system; `false` for an unknown name
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let Some(slot) = self.slots.get_mut(name) else {
            return false;
        };
        slot.enabled = enabled;
        true
    }

    /// Whether the named system exists and is enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.slots.get(name).is_some_and(|slot| slot.enabled)
    }

    /// Change a system's priority; takes effect on the next run
    pub fn set_priority(&mut self, name: &str, priority: i32) -> bool {
        let Some(slot) = self.slots.get_mut(name) else {
            return false;
        };
        slot.priority = priority;
        self.dirty = true;
        true
    }

    /// Whether a system with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Borrow a registered system
    ///
    /// `None` for an unknown name and while the system's own hook is running.
    pub fn get(&self, name: &str) -> Option<&dyn System> {
        self.slots.get(name)?.system.as_deref()
    }

    /// Mutably borrow a registered system
    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn System> {
        self.slots
            .get_mut(name)?
            .system
            .as_mut()
            .map(|system| system.as_mut() as &mut dyn System)
    }

    /// Registered names in execution order
    pub fn names(&self) -> Vec<String> {
        self.sorted_slots().into_iter().map(|(name, _)| name.to_string()).collect()
    }

    /// Number of registered systems
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no system is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Statistics of every system in execution order
    pub fn stats(&self) -> Vec<SystemStats> {
        self.sorted_slots()
            .into_iter()
            .map(|(name, slot)| SystemStats {
                name: name.to_string(),
                enabled: slot.enabled,
                priority: slot.priority,
                update_count: slot.profile.count,
                total_time_ms: slot.profile.total_ms,
                average_time_ms: slot.profile.average_ms(),
                last_update_time_ms: slot.profile.last_ms,
                custom: slot.system.as_ref().map(|system| system.stats()).unwrap_or_default(),
            })
            .collect()
    }

    fn sorted_slots(&self) -> Vec<(&Rc<str>, &SystemSlot)> {
        let mut slots: Vec<_> = self.slots.iter().collect();
        slots.sort_by_key(|(_, slot)| (Reverse(slot.priority), slot.sequence));
        slots
    }
}

impl Default for SystemScheduler {
    fn default() -> Self {
        Self::new()
    }
}
