//! Entity implementation

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Entity identifier
///
/// Allocated by an [`EntityRegistry`](super::EntityRegistry) in strictly
/// increasing order and never reused for the lifetime of that registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw id value
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity record owned by the registry
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    tag: Option<String>,
    created_at: Instant,
    pub(super) pending_removal: bool,
}

impl Entity {
    pub(super) fn new(id: EntityId, tag: Option<String>) -> Self {
        Self {
            id,
            tag,
            created_at: Instant::now(),
            pending_removal: false,
        }
    }

    /// Get the entity ID
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Optional categorization label
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// When the record was created
    pub const fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether destruction was requested and the record awaits the next flush
    pub const fn is_pending_removal(&self) -> bool {
        self.pending_removal
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "Entity[{}:{}]", self.id, tag),
            None => write!(f, "Entity[{}]", self.id),
        }
    }
}
