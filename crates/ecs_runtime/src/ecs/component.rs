//! Component keys, type-erased component records and bundles
//!
//! Component types are open-ended string keys so new kinds can appear at
//! runtime. The data itself is boxed as `dyn Any` and only ever handed out
//! through a checked downcast, so access sites stay statically typed.

use std::any::Any;
use std::borrow::{Borrow, Cow};
use std::fmt;

use super::entity::EntityId;

/// Key selecting one homogeneous component store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentType(Cow<'static, str>);

impl ComponentType {
    /// Create a key from a static name without allocating
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ComponentType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ComponentType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ComponentType {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for ComponentType {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Statically typed component with a fixed store key
///
/// Implementing this lets call sites use the typed helpers on
/// [`World`](super::World) instead of spelling the key out each time.
pub trait Component: Any {
    /// Store key for this component type
    const TYPE: ComponentType;
}

/// One stored component together with its back-reference
pub struct ComponentEntry {
    component_type: ComponentType,
    owner: EntityId,
    data: Box<dyn Any>,
}

impl ComponentEntry {
    pub(super) fn new(owner: EntityId, component_type: ComponentType, data: Box<dyn Any>) -> Self {
        Self {
            component_type,
            owner,
            data,
        }
    }

    /// Store key this entry lives under
    pub const fn component_type(&self) -> &ComponentType {
        &self.component_type
    }

    /// Entity this entry is attached to
    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// Borrow the data if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Mutably borrow the data if it is a `T`
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut::<T>()
    }

    /// Whether the data is a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.data.is::<T>()
    }
}

impl fmt::Debug for ComponentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentEntry")
            .field("component_type", &self.component_type)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Heterogeneous set of components attached together at creation time
#[derive(Default)]
pub struct ComponentBundle {
    items: Vec<(ComponentType, Box<dyn Any>)>,
}

impl ComponentBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component under an explicit key (builder pattern)
    pub fn with<T: Any>(mut self, component_type: impl Into<ComponentType>, data: T) -> Self {
        self.items.push((component_type.into(), Box::new(data)));
        self
    }

    /// Add a typed component under its own key (builder pattern)
    pub fn with_component<T: Component>(self, data: T) -> Self {
        self.with(T::TYPE, data)
    }

    /// Number of components in the bundle
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the bundle is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(super) fn into_items(self) -> Vec<(ComponentType, Box<dyn Any>)> {
        self.items
    }
}

impl fmt::Debug for ComponentBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter().map(|(ty, _)| ty)).finish()
    }
}

/// Canonical cache key for a set of component types
///
/// Sorted and comma-joined, so every ordering of the same types maps to one
/// key. Duplicates are kept, matching how the key is derived from the input.
pub fn canonical_query_key<S: AsRef<str>>(types: &[S]) -> String {
    let mut names: Vec<&str> = types.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.join(",")
}
