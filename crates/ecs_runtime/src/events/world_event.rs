//! Lifecycle and custom events published by the [`World`](crate::ecs::World)

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use super::bus::BusEvent;
use crate::ecs::{ComponentType, EntityId};

/// Event kind used to route events to type-specific listeners
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An entity was created
    EntityCreated,
    /// An entity was marked for removal
    EntityDestroying,
    /// A marked entity was flushed at the end of a frame
    EntityDestroyed,
    /// A component was attached (or replaced)
    ComponentAdded,
    /// A component was detached
    ComponentRemoved,
    /// The world finished initialising its systems
    WorldInitialized,
    /// The world is tearing down
    WorldDestroying,
    /// Application-defined event name
    Custom(Cow<'static, str>),
}

impl EventKind {
    /// Kind for an application-defined event name
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Custom(name.into())
    }

    /// Resolve a wire name, mapping built-in names to their variants
    pub fn from_name(name: &str) -> Self {
        match name {
            "entity:created" => Self::EntityCreated,
            "entity:destroying" => Self::EntityDestroying,
            "entity:destroyed" => Self::EntityDestroyed,
            "component:added" => Self::ComponentAdded,
            "component:removed" => Self::ComponentRemoved,
            "world:initialized" => Self::WorldInitialized,
            "world:destroying" => Self::WorldDestroying,
            other => Self::Custom(Cow::Owned(other.to_string())),
        }
    }

    /// The event name, e.g. `entity:created`
    pub fn name(&self) -> &str {
        match self {
            Self::EntityCreated => "entity:created",
            Self::EntityDestroying => "entity:destroying",
            Self::EntityDestroyed => "entity:destroyed",
            Self::ComponentAdded => "component:added",
            Self::ComponentRemoved => "component:removed",
            Self::WorldInitialized => "world:initialized",
            Self::WorldDestroying => "world:destroying",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Application-defined event with an optional opaque payload
#[derive(Clone)]
pub struct CustomEvent {
    name: Cow<'static, str>,
    payload: Rc<dyn Any>,
}

impl CustomEvent {
    /// Create an event carrying `payload`
    pub fn new<T: Any>(name: impl Into<Cow<'static, str>>, payload: T) -> Self {
        Self {
            name: name.into(),
            payload: Rc::new(payload),
        }
    }

    /// Create an event without payload
    pub fn signal(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, ())
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload, if it is a `T`
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEvent")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Everything the world publishes on its event bus
///
/// Component events carry the key only; listeners receive the world and can
/// read the component data from there.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    /// An entity was created
    EntityCreated {
        /// The new entity
        entity: EntityId,
        /// Its tag, if any
        tag: Option<String>,
    },
    /// An entity was marked for removal; its components are still readable
    EntityDestroying {
        /// The marked entity
        entity: EntityId,
    },
    /// A marked entity and its components were removed
    EntityDestroyed {
        /// The removed entity
        entity: EntityId,
    },
    /// A component was attached (or replaced)
    ComponentAdded {
        /// Owner of the component
        entity: EntityId,
        /// Component key
        component_type: ComponentType,
    },
    /// A component was detached
    ComponentRemoved {
        /// Former owner of the component
        entity: EntityId,
        /// Component key
        component_type: ComponentType,
    },
    /// The world finished initialising its systems
    WorldInitialized,
    /// The world is tearing down
    WorldDestroying,
    /// Application-defined event
    Custom(CustomEvent),
}

impl WorldEvent {
    /// Application-defined event carrying `payload`
    pub fn custom<T: Any>(name: impl Into<Cow<'static, str>>, payload: T) -> Self {
        Self::Custom(CustomEvent::new(name, payload))
    }

    /// Entity the event concerns, if any
    pub const fn entity(&self) -> Option<EntityId> {
        match self {
            Self::EntityCreated { entity, .. }
            | Self::EntityDestroying { entity }
            | Self::EntityDestroyed { entity }
            | Self::ComponentAdded { entity, .. }
            | Self::ComponentRemoved { entity, .. } => Some(*entity),
            Self::WorldInitialized | Self::WorldDestroying | Self::Custom(_) => None,
        }
    }

    /// Component key the event concerns, if any
    pub const fn component_type(&self) -> Option<&ComponentType> {
        match self {
            Self::ComponentAdded { component_type, .. } | Self::ComponentRemoved { component_type, .. } => {
                Some(component_type)
            }
            _ => None,
        }
    }

    /// Custom event body, if this is one
    pub const fn as_custom(&self) -> Option<&CustomEvent> {
        match self {
            Self::Custom(custom) => Some(custom),
            _ => None,
        }
    }
}

impl BusEvent for WorldEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::EntityCreated { .. } => EventKind::EntityCreated,
            Self::EntityDestroying { .. } => EventKind::EntityDestroying,
            Self::EntityDestroyed { .. } => EventKind::EntityDestroyed,
            Self::ComponentAdded { .. } => EventKind::ComponentAdded,
            Self::ComponentRemoved { .. } => EventKind::ComponentRemoved,
            Self::WorldInitialized => EventKind::WorldInitialized,
            Self::WorldDestroying => EventKind::WorldDestroying,
            Self::Custom(custom) => EventKind::Custom(custom.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [
            EventKind::EntityCreated,
            EventKind::EntityDestroying,
            EventKind::EntityDestroyed,
            EventKind::ComponentAdded,
            EventKind::ComponentRemoved,
            EventKind::WorldInitialized,
            EventKind::WorldDestroying,
            EventKind::custom("ship:fired"),
        ] {
            assert_eq!(EventKind::from_name(kind.name()), kind);
        }
        assert_eq!(EventKind::ComponentAdded.to_string(), "component:added");
    }

    #[test]
    fn test_custom_event_kind_and_payload() {
        let event = WorldEvent::custom("entity:teleport", (EntityId::new(4), 1.5_f32));
        assert_eq!(event.kind(), EventKind::custom("entity:teleport"));
        assert_eq!(event.entity(), None);

        let custom = event.as_custom().expect("custom event");
        assert_eq!(custom.payload::<(EntityId, f32)>(), Some(&(EntityId::new(4), 1.5)));
        assert!(custom.payload::<String>().is_none());
    }

    #[test]
    fn test_entity_accessor() {
        let event = WorldEvent::ComponentAdded {
            entity: EntityId::new(9),
            component_type: ComponentType::from_static("Position"),
        };
        assert_eq!(event.entity(), Some(EntityId::new(9)));
        assert_eq!(event.component_type().map(ComponentType::as_str), Some("Position"));
    }
}
