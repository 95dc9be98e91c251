//! Entity registry with deferred removal
//!
//! The registry owns every entity record, a tag index and the queue of
//! entities whose destruction was requested. Pending entities stay fully
//! readable until the owning [`World`](super::World) flushes them at the end
//! of a frame; they are merely hidden from the "active" views.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use super::entity::{Entity, EntityId};

/// First id handed out by a fresh registry
const FIRST_ENTITY_ID: u64 = 1;

/// Registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Active (not pending) entities
    pub active: usize,
    /// Entities awaiting the next flush
    pub pending_removal: usize,
    /// Entities created since the last clear
    pub total_created: u64,
    /// Entities erased since the last clear
    pub total_destroyed: u64,
    /// Indexed entity count per tag (pending entities included)
    pub tag_counts: BTreeMap<String, usize>,
}

/// Owner of entity records and their lifecycle state
#[derive(Debug)]
pub struct EntityRegistry {
    next_id: u64,
    entities: BTreeMap<EntityId, Entity>,
    by_tag: HashMap<String, BTreeSet<EntityId>>,
    pending: Vec<EntityId>,
    total_created: u64,
    total_destroyed: u64,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_id: FIRST_ENTITY_ID,
            entities: BTreeMap::new(),
            by_tag: HashMap::new(),
            pending: Vec::new(),
            total_created: 0,
            total_destroyed: 0,
        }
    }

    /// Allocate the next id and store a new record
    ///
    /// An empty tag is treated as no tag.
    pub fn create(&mut self, tag: Option<&str>) -> &Entity {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;

        let tag = tag.filter(|t| !t.is_empty()).map(str::to_owned);
        if let Some(tag) = &tag {
            self.by_tag.entry(tag.clone()).or_default().insert(id);
        }

        self.total_created += 1;
        self.entities.entry(id).or_insert_with(|| Entity::new(id, tag))
    }

    /// Get a record, including one that is pending removal
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// True iff the entity is known and not pending removal
    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| !e.pending_removal)
    }

    /// Request deferred removal
    ///
    /// Returns `false` for unknown ids. Marking twice is a no-op that still
    /// returns `true`.
    pub fn mark_for_removal(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };

        if !entity.pending_removal {
            entity.pending_removal = true;
            self.pending.push(id);
        }
        true
    }

    /// Synchronously erase a record and its tag index entry
    ///
    /// Components are not touched; purging them is the caller's job.
    pub fn remove_immediate(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.erase(id) else {
            return false;
        };

        if entity.pending_removal {
            self.pending.retain(|pending| *pending != id);
        }
        true
    }

    /// Drop the record and its tag index entry, leaving `pending` untouched
    fn erase(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;

        if let Some(tag) = entity.tag() {
            if let Some(ids) = self.by_tag.get_mut(tag) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }

        self.total_destroyed += 1;
        Some(entity)
    }

    /// Ids awaiting removal, in the order they were marked
    pub fn pending_removals(&self) -> &[EntityId] {
        &self.pending
    }

    /// Erase every entity that was pending when the call started
    ///
    /// Returns the number of records erased.
    pub fn flush_removals(&mut self) -> usize {
        let batch = self.pending.clone();
        self.flush_batch(&batch)
    }

    /// Erase exactly the given pending entities
    ///
    /// Entities marked after `batch` was captured stay pending for the next
    /// flush.
    pub fn flush_batch(&mut self, batch: &[EntityId]) -> usize {
        let erased: HashSet<EntityId> = batch
            .iter()
            .filter(|id| self.erase(**id).is_some())
            .copied()
            .collect();
        let removed = erased.len();

        // Prune the queue once for the whole batch
        if removed > 0 {
            self.pending.retain(|pending| !erased.contains(pending));
            log::trace!("Flushed {} entities, {} still pending", removed, self.pending.len());
        }
        removed
    }

    /// Active entities carrying `tag`, in id order
    pub fn get_by_tag(&self, tag: &str) -> Vec<&Entity> {
        self.by_tag.get(tag).map_or_else(Vec::new, |ids| {
            ids.iter()
                .filter_map(|id| self.entities.get(id))
                .filter(|entity| !entity.pending_removal)
                .collect()
        })
    }

    /// Ids of all active entities, in id order
    pub fn get_all_ids(&self) -> Vec<EntityId> {
        self.active().map(Entity::id).collect()
    }

    /// Visit every active entity in id order
    pub fn for_each(&self, mut f: impl FnMut(&Entity)) {
        self.active().for_each(|entity| f(entity));
    }

    /// Active entity count
    pub fn count(&self) -> usize {
        self.entities.len() - self.pending.len()
    }

    /// Id the next `create` will hand out
    pub const fn peek_next_id(&self) -> EntityId {
        EntityId::new(self.next_id)
    }

    /// Restart id allocation from the first id
    ///
    /// Test hook: ids handed out before the reset are issued again, so it is
    /// only compiled for tests or with the `test-hooks` feature. Only honoured
    /// on an empty registry so ids can never alias a live record. Returns
    /// whether the counter was reset.
    #[cfg(any(test, feature = "test-hooks"))]
    pub fn reset_id_counter(&mut self) -> bool {
        if !self.entities.is_empty() {
            log::warn!(
                "Refusing to reset entity ids with {} records alive",
                self.entities.len()
            );
            return false;
        }
        self.next_id = FIRST_ENTITY_ID;
        true
    }

    /// Drop every record and reset statistics
    ///
    /// The id counter keeps running so handles from before the clear are
    /// never handed out again.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.by_tag.clear();
        self.pending.clear();
        self.total_created = 0;
        self.total_destroyed = 0;
    }

    /// Snapshot of registry statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active: self.count(),
            pending_removal: self.pending.len(),
            total_created: self.total_created,
            total_destroyed: self.total_destroyed,
            tag_counts: self
                .by_tag
                .iter()
                .map(|(tag, ids)| (tag.clone(), ids.len()))
                .collect(),
        }
    }

    fn active(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|entity| !entity.pending_removal)
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(None).id();
        let b = registry.create(None).id();
        assert!(a < b);

        registry.remove_immediate(b);
        let c = registry.create(None).id();
        assert!(c > b);
    }

    #[test]
    fn test_registries_do_not_share_id_space() {
        let mut first = EntityRegistry::new();
        let mut second = EntityRegistry::new();
        first.create(None);
        first.create(None);
        assert_eq!(second.create(None).id(), EntityId::new(1));
        assert_eq!(first.peek_next_id(), EntityId::new(3));
    }

    #[test]
    fn test_mark_keeps_record_readable_until_flush() {
        let mut registry = EntityRegistry::new();
        let id = registry.create(Some("ship")).id();

        assert!(registry.mark_for_removal(id));
        assert!(registry.mark_for_removal(id));
        assert_eq!(registry.pending_removals(), &[id]);

        assert!(!registry.exists(id));
        assert!(registry.get(id).is_some_and(Entity::is_pending_removal));
        assert!(registry.get_by_tag("ship").is_empty());
        assert!(registry.get_all_ids().is_empty());
        assert_eq!(registry.count(), 0);

        assert_eq!(registry.flush_removals(), 1);
        assert!(registry.get(id).is_none());
        assert!(registry.pending_removals().is_empty());
        assert_eq!(registry.stats().total_destroyed, 1);
    }

    #[test]
    fn test_unknown_ids_are_not_errors() {
        let mut registry = EntityRegistry::new();
        assert!(!registry.mark_for_removal(EntityId::new(42)));
        assert!(!registry.remove_immediate(EntityId::new(42)));
        assert!(!registry.exists(EntityId::new(42)));
    }

    #[test]
    fn test_flush_batch_leaves_late_marks_pending() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(None).id();
        let b = registry.create(None).id();

        registry.mark_for_removal(a);
        let batch = registry.pending_removals().to_vec();
        registry.mark_for_removal(b);

        assert_eq!(registry.flush_batch(&batch), 1);
        assert!(registry.get(a).is_none());
        assert_eq!(registry.pending_removals(), &[b]);
        assert_eq!(registry.flush_removals(), 1);
    }

    #[test]
    fn test_flush_large_batch_in_one_pass() {
        const MARKED: u64 = 50_000;

        let mut registry = EntityRegistry::new();
        let ids: Vec<EntityId> = (0..MARKED).map(|_| registry.create(Some("debris")).id()).collect();
        let survivor = registry.create(Some("ship")).id();

        for id in &ids {
            registry.mark_for_removal(*id);
        }
        let batch = registry.pending_removals().to_vec();
        registry.mark_for_removal(survivor);

        let stopwatch = crate::foundation::time::Stopwatch::start_new();
        assert_eq!(registry.flush_batch(&batch), ids.len());
        assert!(stopwatch.elapsed() < std::time::Duration::from_secs(5));

        assert_eq!(registry.pending_removals(), &[survivor]);
        assert!(registry.get_by_tag("debris").is_empty());
        assert!(registry.get(survivor).is_some());
        assert_eq!(registry.count(), 0);

        let stats = registry.stats();
        assert_eq!(stats.total_destroyed, MARKED);
        assert_eq!(stats.pending_removal, 1);
        assert!(!stats.tag_counts.contains_key("debris"));
    }

    #[test]
    fn test_tag_index_and_iteration() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(Some("asteroid")).id();
        let b = registry.create(Some("asteroid")).id();
        let ship = registry.create(Some("ship")).id();
        let untagged = registry.create(Some("")).id();

        assert!(registry.get(untagged).is_some_and(|e| e.tag().is_none()));
        let asteroids: Vec<_> = registry.get_by_tag("asteroid").iter().map(|e| e.id()).collect();
        assert_eq!(asteroids, vec![a, b]);

        registry.remove_immediate(a);
        assert_eq!(registry.get_by_tag("asteroid").len(), 1);

        let mut visited = Vec::new();
        registry.for_each(|entity| visited.push(entity.id()));
        assert_eq!(visited, vec![b, ship, untagged]);

        let stats = registry.stats();
        assert_eq!(stats.active, 3);
        assert_eq!(stats.tag_counts.get("asteroid"), Some(&1));
        assert_eq!(stats.tag_counts.get("ship"), Some(&1));
        assert_eq!(stats.total_created, 4);
    }

    #[test]
    fn test_reset_id_counter_only_when_empty() {
        let mut registry = EntityRegistry::new();
        let id = registry.create(None).id();
        assert!(!registry.reset_id_counter());

        registry.remove_immediate(id);
        assert!(registry.reset_id_counter());
        assert_eq!(registry.create(None).id(), EntityId::new(1));
    }

    #[test]
    fn test_clear_keeps_id_counter_running() {
        let mut registry = EntityRegistry::new();
        registry.create(Some("a"));
        registry.create(None);
        registry.clear();

        assert_eq!(registry.count(), 0);
        assert_eq!(registry.stats(), RegistryStats::default());
        assert_eq!(registry.create(None).id(), EntityId::new(3));
    }
}
