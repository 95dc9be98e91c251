//! Depth-bounded, fault-isolated publish/subscribe channel
//!
//! Listeners receive the context that owns the bus (for the runtime this is
//! the [`World`](crate::ecs::World)), so a listener may mutate the world and
//! emit further events. Re-entrant emission shares a single depth counter;
//! once it exceeds the configured maximum the innermost emit is dropped
//! before any listener runs.
//!
//! Dispatch works on a snapshot of the registrations taken when the emit
//! starts, for wildcard and type-specific listeners alike: a listener removed
//! mid-dispatch still runs for the current event, one added mid-dispatch
//! does not. `once` registrations are the exception; they are claimed right
//! before running, which keeps them to exactly one invocation even under
//! re-entrant emission.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use std::time::Instant;

use serde::Serialize;
use slotmap::{new_key_type, SlotMap};

use crate::core::config::EventBusConfig;
use crate::foundation::fault;

new_key_type! {
    /// Handle to exactly one listener registration
    pub struct ListenerId;
}

/// Event type carried by an [`EventBus`]
pub trait BusEvent: Clone + fmt::Debug + 'static {
    /// Routing key for type-specific listeners
    type Kind: Clone + Eq + Hash + fmt::Debug + fmt::Display;

    /// Routing key of this event
    fn kind(&self) -> Self::Kind;
}

/// Owner of an event bus whose listeners receive the owner itself
pub trait EventContext<E: BusEvent>: Sized + 'static {
    /// The bus owned by this context
    fn event_bus(&mut self) -> &mut EventBus<E, Self>;
}

/// Shared listener callback
pub type Callback<E, C> = Rc<dyn Fn(&mut C, &E)>;

struct Registration<E: BusEvent, C> {
    kind: Option<E::Kind>,
    callback: Callback<E, C>,
    once: bool,
}

struct Scheduled<E, C> {
    id: ListenerId,
    callback: Callback<E, C>,
    once: bool,
    wildcard: bool,
}

/// One entry of the diagnostic history
#[derive(Debug, Clone)]
pub struct EventRecord<E> {
    /// The emitted event
    pub event: E,
    /// When it was emitted
    pub timestamp: Instant,
}

/// Event bus statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventBusStats {
    /// Emits that reached dispatch
    pub emit_count: u64,
    /// Events ever queued for deferred delivery
    pub queued_count: u64,
    /// Events currently waiting in the queue
    pub current_queue_size: usize,
    /// Registered wildcard listeners
    pub wildcard_listener_count: usize,
    /// Registered listeners per event kind
    pub listener_counts: BTreeMap<String, usize>,
    /// Whether history recording is on
    pub history_enabled: bool,
    /// Records currently held in history
    pub history_size: usize,
    /// Emits dropped by the recursion bound
    pub dropped_by_depth: u64,
    /// Queued events discarded by the flush cap
    pub dropped_from_queue: u64,
    /// Listener invocations that panicked
    pub listener_failures: u64,
}

/// Publish/subscribe channel with an optional deferred queue
pub struct EventBus<E: BusEvent, C: 'static> {
    registrations: SlotMap<ListenerId, Registration<E, C>>,
    by_kind: HashMap<E::Kind, Vec<ListenerId>>,
    wildcard: Vec<ListenerId>,
    queue: VecDeque<E>,
    depth: usize,
    config: EventBusConfig,
    history: Vec<EventRecord<E>>,
    emit_count: u64,
    queued_count: u64,
    dropped_by_depth: u64,
    dropped_from_queue: u64,
    listener_failures: u64,
}

impl<E: BusEvent, C: 'static> EventBus<E, C> {
    /// Create a bus with default limits
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a bus with explicit limits
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            registrations: SlotMap::with_key(),
            by_kind: HashMap::new(),
            wildcard: Vec::new(),
            queue: VecDeque::new(),
            depth: 0,
            config,
            history: Vec::new(),
            emit_count: 0,
            queued_count: 0,
            dropped_by_depth: 0,
            dropped_from_queue: 0,
            listener_failures: 0,
        }
    }

    /// Active limits
    pub const fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Subscribe to one event kind
    ///
    /// The returned id removes exactly this registration via [`Self::off`].
    pub fn on<F>(&mut self, kind: E::Kind, callback: F) -> ListenerId
    where
        F: Fn(&mut C, &E) + 'static,
    {
        self.register(Some(kind), Rc::new(callback), false)
    }

    /// Subscribe for a single delivery; the registration removes itself
    pub fn once<F>(&mut self, kind: E::Kind, callback: F) -> ListenerId
    where
        F: Fn(&mut C, &E) + 'static,
    {
        self.register(Some(kind), Rc::new(callback), true)
    }

    /// Subscribe to every event; wildcard listeners run before typed ones
    pub fn on_any<F>(&mut self, callback: F) -> ListenerId
    where
        F: Fn(&mut C, &E) + 'static,
    {
        self.register(None, Rc::new(callback), false)
    }

    fn register(&mut self, kind: Option<E::Kind>, callback: Callback<E, C>, once: bool) -> ListenerId {
        let id = self.registrations.insert(Registration {
            kind: kind.clone(),
            callback,
            once,
        });
        match kind {
            Some(kind) => self.by_kind.entry(kind).or_default().push(id),
            None => self.wildcard.push(id),
        }
        id
    }

    /// Remove one registration; `false` if it was already gone
    pub fn off(&mut self, id: ListenerId) -> bool {
        let Some(registration) = self.registrations.remove(id) else {
            return false;
        };

        match registration.kind {
            Some(kind) => {
                if let Some(ids) = self.by_kind.get_mut(&kind) {
                    ids.retain(|other| *other != id);
                    if ids.is_empty() {
                        self.by_kind.remove(&kind);
                    }
                }
            }
            None => self.wildcard.retain(|other| *other != id),
        }
        true
    }

    /// Remove every type-specific listener for `kind`
    pub fn off_all(&mut self, kind: &E::Kind) {
        if let Some(ids) = self.by_kind.remove(kind) {
            for id in ids {
                self.registrations.remove(id);
            }
        }
    }

    /// Whether any type-specific listener is registered for `kind`
    pub fn has_listeners(&self, kind: &E::Kind) -> bool {
        self.listener_count(kind) > 0
    }

    /// Number of type-specific listeners registered for `kind`
    pub fn listener_count(&self, kind: &E::Kind) -> usize {
        self.by_kind.get(kind).map_or(0, Vec::len)
    }

    /// Current nesting depth of `emit`
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Append an event to the deferred queue
    pub fn queue(&mut self, event: E) {
        self.queue.push_back(event);
        self.queued_count += 1;
    }

    /// Events waiting for the next flush
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Toggle history recording; disabling discards recorded history
    pub fn set_history_enabled(&mut self, enabled: bool) {
        self.config.history_enabled = enabled;
        if !enabled {
            self.history.clear();
        }
    }

    /// The most recent `limit` history records, oldest first
    pub fn history(&self, limit: usize) -> &[EventRecord<E>] {
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }

    /// Snapshot of bus statistics
    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            emit_count: self.emit_count,
            queued_count: self.queued_count,
            current_queue_size: self.queue.len(),
            wildcard_listener_count: self.wildcard.len(),
            listener_counts: self
                .by_kind
                .iter()
                .map(|(kind, ids)| (kind.to_string(), ids.len()))
                .collect(),
            history_enabled: self.config.history_enabled,
            history_size: self.history.len(),
            dropped_by_depth: self.dropped_by_depth,
            dropped_from_queue: self.dropped_from_queue,
            listener_failures: self.listener_failures,
        }
    }

    /// Drop every listener, queued event, history record and counter
    pub fn clear(&mut self) {
        self.registrations.clear();
        self.by_kind.clear();
        self.wildcard.clear();
        self.queue.clear();
        self.history.clear();
        self.depth = 0;
        self.emit_count = 0;
        self.queued_count = 0;
        self.dropped_by_depth = 0;
        self.dropped_from_queue = 0;
        self.listener_failures = 0;
    }

    /// Enter one level of dispatch and snapshot the listeners to run
    ///
    /// `None` when the depth bound is exceeded; the level is released again.
    fn begin_emit(&mut self, event: &E) -> Option<Vec<Scheduled<E, C>>> {
        self.depth += 1;
        if self.depth > self.config.max_emit_depth {
            log::error!(
                "Recursive emit depth {} exceeds {}, dropping '{}' (possible event loop)",
                self.depth,
                self.config.max_emit_depth,
                event.kind()
            );
            self.depth -= 1;
            self.dropped_by_depth += 1;
            return None;
        }

        self.emit_count += 1;
        if self.config.history_enabled {
            self.record(event);
        }

        let kind = event.kind();
        let typed = self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or_default();
        let snapshot = self
            .wildcard
            .iter()
            .map(|id| (*id, true))
            .chain(typed.iter().map(|id| (*id, false)))
            .filter_map(|(id, wildcard)| {
                self.registrations.get(id).map(|registration| Scheduled {
                    id,
                    callback: Rc::clone(&registration.callback),
                    once: registration.once,
                    wildcard,
                })
            })
            .collect();
        Some(snapshot)
    }

    fn end_emit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn record(&mut self, event: &E) {
        self.history.push(EventRecord {
            event: event.clone(),
            timestamp: Instant::now(),
        });

        let max = self.config.max_history_size;
        if self.history.len() > max {
            let keep = max / 2;
            let excess = self.history.len() - keep;
            self.history.drain(..excess);
        }
    }
}

impl<E: BusEvent, C: EventContext<E>> EventBus<E, C> {
    /// Dispatch `event` synchronously to the listeners of `ctx`'s bus
    ///
    /// Every listener runs in isolation: a panic is logged and counted, and
    /// the remaining listeners still run.
    pub fn emit(ctx: &mut C, event: E) {
        let Some(listeners) = ctx.event_bus().begin_emit(&event) else {
            return;
        };

        for listener in listeners {
            if listener.once && !ctx.event_bus().off(listener.id) {
                continue;
            }

            let callback = listener.callback;
            if let Err(message) = fault::contain(|| callback(ctx, &event)) {
                let bus = ctx.event_bus();
                bus.listener_failures += 1;
                if listener.wildcard {
                    log::error!("Wildcard listener failed on '{}': {}", event.kind(), message);
                } else {
                    log::error!("Listener for '{}' failed: {}", event.kind(), message);
                }
            }
        }

        ctx.event_bus().end_emit();
    }

    /// Emit queued events in FIFO order, including ones queued meanwhile
    ///
    /// Processes at most `max_flush_events` events; anything left after the
    /// cap is discarded and logged. Returns the number processed.
    pub fn flush(ctx: &mut C) -> usize {
        let max = ctx.event_bus().config.max_flush_events;
        let mut processed = 0;

        while let Some(event) = ctx.event_bus().queue.pop_front() {
            Self::emit(ctx, event);
            processed += 1;

            if processed >= max {
                let bus = ctx.event_bus();
                let remaining = bus.queue.len();
                if remaining > 0 {
                    log::error!(
                        "Event queue flush hit the cap of {} events, dropping {} (possible feedback loop)",
                        max,
                        remaining
                    );
                    bus.dropped_from_queue += remaining as u64;
                    bus.queue.clear();
                }
                break;
            }
        }

        processed
    }
}

impl<E: BusEvent, C: 'static> Default for EventBus<E, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent, C: 'static> fmt::Debug for EventBus<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.registrations.len())
            .field("queued", &self.queue.len())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
