//! Component storage and the cached membership-query engine
//!
//! Components live in one column per [`ComponentType`], keyed by entity.
//! Multi-type queries are answered from the smallest involved column and the
//! results are cached under a canonical key. Any structural mutation clears
//! the whole cache; the owning world re-validates it once per frame.

use std::any::Any;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::component::{canonical_query_key, ComponentEntry, ComponentType};
use super::entity::EntityId;

/// Component storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentStats {
    /// Population per registered type
    pub types: BTreeMap<String, usize>,
    /// Sum of all populations
    pub total_components: usize,
    /// Number of cached query results
    pub cache_size: usize,
    /// Whether cached results are currently trusted
    pub cache_valid: bool,
}

type Column = BTreeMap<EntityId, ComponentEntry>;

/// Per-type component storage with cached multi-type queries
pub struct ComponentStore {
    columns: BTreeMap<ComponentType, Column>,
    query_cache: HashMap<String, Vec<EntityId>>,
    cache_valid: bool,
}

impl ComponentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            columns: BTreeMap::new(),
            query_cache: HashMap::new(),
            cache_valid: true,
        }
    }

    /// Pre-declare an empty store for `component_type`; idempotent
    pub fn register_type(&mut self, component_type: impl Into<ComponentType>) {
        self.columns.entry(component_type.into()).or_default();
    }

    /// Insert or overwrite the single component for `(entity, type)`
    ///
    /// Invalidates every cached query, whatever its types.
    pub fn add<T: Any>(
        &mut self,
        entity: EntityId,
        component_type: impl Into<ComponentType>,
        data: T,
    ) -> &mut T {
        let entry = self.insert_entry(entity, component_type.into(), Box::new(data));
        match entry.downcast_mut::<T>() {
            Some(data) => data,
            None => unreachable!("component entry was just created from a T"),
        }
    }

    /// Insert already boxed data; used for heterogeneous bundles
    pub fn add_boxed(&mut self, entity: EntityId, component_type: ComponentType, data: Box<dyn Any>) {
        self.insert_entry(entity, component_type, data);
    }

    fn insert_entry(
        &mut self,
        entity: EntityId,
        component_type: ComponentType,
        data: Box<dyn Any>,
    ) -> &mut ComponentEntry {
        self.invalidate_cache();

        let column = self.columns.entry(component_type.clone()).or_default();
        let entry = ComponentEntry::new(entity, component_type, data);
        match column.entry(entity) {
            Entry::Occupied(mut slot) => {
                slot.insert(entry);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(entry),
        }
    }

    /// Typed access to a component
    ///
    /// `None` when the pair is absent or the stored data is not a `T`.
    pub fn get<T: Any>(&self, entity: EntityId, component_type: &str) -> Option<&T> {
        let entry = self.entry(entity, component_type)?;
        let data = entry.downcast_ref::<T>();
        if data.is_none() {
            log::debug!(
                "Component '{}' on entity {} is not a {}",
                component_type,
                entity,
                std::any::type_name::<T>()
            );
        }
        data
    }

    /// Typed mutable access to a component
    ///
    /// Mutating data in place is not structural and leaves the cache intact.
    pub fn get_mut<T: Any>(&mut self, entity: EntityId, component_type: &str) -> Option<&mut T> {
        self.columns
            .get_mut(component_type)?
            .get_mut(&entity)?
            .downcast_mut::<T>()
    }

    /// Untyped access to the stored record
    pub fn entry(&self, entity: EntityId, component_type: &str) -> Option<&ComponentEntry> {
        self.columns.get(component_type)?.get(&entity)
    }

    /// Whether `entity` has a component of `component_type`
    pub fn has(&self, entity: EntityId, component_type: &str) -> bool {
        self.columns
            .get(component_type)
            .is_some_and(|column| column.contains_key(&entity))
    }

    /// Whether `entity` has every listed type; stops at the first miss
    pub fn has_all<S: AsRef<str>>(&self, entity: EntityId, component_types: &[S]) -> bool {
        component_types.iter().all(|ty| self.has(entity, ty.as_ref()))
    }

    /// Whether `entity` has at least one listed type
    pub fn has_any<S: AsRef<str>>(&self, entity: EntityId, component_types: &[S]) -> bool {
        component_types.iter().any(|ty| self.has(entity, ty.as_ref()))
    }

    /// Remove one component; invalidates the cache only if one existed
    pub fn remove(&mut self, entity: EntityId, component_type: &str) -> bool {
        let removed = self
            .columns
            .get_mut(component_type)
            .is_some_and(|column| column.remove(&entity).is_some());

        if removed {
            self.invalidate_cache();
        }
        removed
    }

    /// Remove every component `entity` owns across all registered types
    ///
    /// Returns the number removed; invalidates the cache iff it is non-zero.
    pub fn remove_all_from_entity(&mut self, entity: EntityId) -> usize {
        let removed = self
            .columns
            .values_mut()
            .filter_map(|column| column.remove(&entity))
            .count();

        if removed > 0 {
            self.invalidate_cache();
        }
        removed
    }

    /// Types currently attached to `entity`, in type order
    pub fn get_all_from_entity(&self, entity: EntityId) -> Vec<&ComponentType> {
        self.columns
            .iter()
            .filter(|(_, column)| column.contains_key(&entity))
            .map(|(ty, _)| ty)
            .collect()
    }

    /// Entities holding every listed type, in id order
    ///
    /// The returned list is a snapshot; later mutations never change it.
    pub fn query<S: AsRef<str>>(&mut self, required: &[S]) -> Vec<EntityId> {
        if required.is_empty() {
            return Vec::new();
        }

        let key = canonical_query_key(required);
        if self.cache_valid {
            if let Some(cached) = self.query_cache.get(&key) {
                return cached.clone();
            }
        }

        let result = self.compute_query(required);
        self.query_cache.insert(key, result.clone());
        result
    }

    fn compute_query<S: AsRef<str>>(&self, required: &[S]) -> Vec<EntityId> {
        let mut driver = required[0].as_ref();
        let mut driver_size = self.type_size(driver);
        for ty in &required[1..] {
            let size = self.type_size(ty.as_ref());
            if size < driver_size {
                driver = ty.as_ref();
                driver_size = size;
            }
        }

        self.columns.get(driver).map_or_else(Vec::new, |column| {
            column
                .keys()
                .copied()
                .filter(|entity| self.has_all(*entity, required))
                .collect()
        })
    }

    /// Current population of one type
    pub fn type_size(&self, component_type: &str) -> usize {
        self.columns.get(component_type).map_or(0, BTreeMap::len)
    }

    /// Every type that has a store, in type order
    pub fn registered_types(&self) -> impl Iterator<Item = &ComponentType> {
        self.columns.keys()
    }

    /// Trust cached results again; called once per frame after the flush
    pub fn validate_cache(&mut self) {
        self.cache_valid = true;
    }

    /// Whether cached results are currently trusted
    pub const fn is_cache_valid(&self) -> bool {
        self.cache_valid
    }

    fn invalidate_cache(&mut self) {
        self.cache_valid = false;
        self.query_cache.clear();
    }

    /// Drop every store and cached result
    pub fn clear(&mut self) {
        self.columns.clear();
        self.query_cache.clear();
        self.cache_valid = true;
    }

    /// Snapshot of storage statistics
    pub fn stats(&self) -> ComponentStats {
        let types: BTreeMap<String, usize> = self
            .columns
            .iter()
            .map(|(ty, column)| (ty.to_string(), column.len()))
            .collect();

        ComponentStats {
            total_components: types.values().sum(),
            types,
            cache_size: self.query_cache.len(),
            cache_valid: self.cache_valid,
        }
    }
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}
