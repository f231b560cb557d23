//! Name-keyed entity registries with override chains
//!
//! Every declared entity lives in an append-only arena. The name index points
//! at the newest declaration of each name; a redeclared entity keeps a link to
//! the one it shadows, so nothing is ever deleted.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::Serialize;

use crate::driver::Driver;
use crate::host::Host;
use crate::job::Job;
use crate::task::Task;

/// Kinds of declarable entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Host,
    Task,
    Driver,
    Job,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Task => "task",
            Self::Driver => "driver",
            Self::Job => "job",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arena id of an entity of type `T`
pub struct Id<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Position in the arena
    pub fn index(self) -> usize {
        self.index
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index)
    }
}

pub type HostId = Id<Host>;
pub type TaskId = Id<Task>;
pub type DriverId = Id<Driver>;
pub type JobId = Id<Job>;

/// Something that can be declared by name
pub trait Entity: Sized {
    const KIND: EntityKind;

    fn name(&self) -> &str;

    /// Record the entity this declaration shadows
    fn shadow(&mut self, _predecessor: Id<Self>) {}

    /// The entity this declaration shadows, if any
    fn predecessor(&self) -> Option<Id<Self>> {
        None
    }
}

/// Ordered name → id index
///
/// Names keep the position of their first insertion.
pub struct NameIndex<T> {
    ids: IndexMap<String, Id<T>>,
}

impl<T> NameIndex<T> {
    pub fn new() -> Self {
        Self {
            ids: IndexMap::new(),
        }
    }

    /// Point `name` at `id`, returning the id it pointed at before
    pub fn insert(&mut self, name: &str, id: Id<T>) -> Option<Id<T>> {
        self.ids.insert(name.to_string(), id)
    }

    pub fn get(&self, name: &str) -> Option<Id<T>> {
        self.ids.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    /// Names and ids in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Id<T>)> {
        self.ids.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
        self.ids.values().copied()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<T> Default for NameIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for NameIndex<T> {
    fn clone(&self) -> Self {
        Self {
            ids: self.ids.clone(),
        }
    }
}

impl<T> fmt::Debug for NameIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Arena of entities plus the name index used for lookup
#[derive(Debug)]
pub struct Store<T> {
    arena: Vec<T>,
    names: NameIndex<T>,
}

impl<T: Entity> Store<T> {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            names: NameIndex::new(),
        }
    }

    /// Add a declaration, shadowing any entity with the same name
    pub fn insert(&mut self, mut entity: T) -> Id<T> {
        let id = Id::new(self.arena.len());
        if let Some(previous) = self.names.insert(entity.name(), id) {
            entity.shadow(previous);
        }
        self.arena.push(entity);
        id
    }

    /// Latest declaration of `name`
    pub fn lookup(&self, name: &str) -> Option<Id<T>> {
        self.names.get(name)
    }

    pub fn find(&self, name: &str) -> Option<&T> {
        self.lookup(name).map(|id| self.get(id))
    }

    pub fn get(&self, id: Id<T>) -> &T {
        &self.arena[id.index]
    }

    /// Entity behind `id`, or `None` for an id minted by another store
    pub fn try_get(&self, id: Id<T>) -> Option<&T> {
        self.arena.get(id.index)
    }

    pub fn contains(&self, id: Id<T>) -> bool {
        id.index < self.arena.len()
    }

    pub fn get_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.arena[id.index]
    }

    /// Visible entities in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.names.ids().map(|id| (id, self.get(id)))
    }

    pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
        self.names.ids()
    }

    /// Ids shadowed by `id`, newest first
    pub fn overrides(&self, id: Id<T>) -> Vec<Id<T>> {
        let mut chain = Vec::new();
        let mut current = self.try_get(id).and_then(Entity::predecessor);
        while let Some(previous) = current {
            chain.push(previous);
            current = self.try_get(previous).and_then(Entity::predecessor);
        }
        chain
    }

    /// Number of visible names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<T: Entity> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named {
        name: String,
        predecessor: Option<Id<Named>>,
    }

    impl Named {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                predecessor: None,
            }
        }
    }

    impl Entity for Named {
        const KIND: EntityKind = EntityKind::Host;

        fn name(&self) -> &str {
            &self.name
        }

        fn shadow(&mut self, predecessor: Id<Self>) {
            self.predecessor = Some(predecessor);
        }

        fn predecessor(&self) -> Option<Id<Self>> {
            self.predecessor
        }
    }

    #[test]
    fn test_redeclaration_shadows() {
        let mut store = Store::new();
        let first = store.insert(Named::new("web"));
        let second = store.insert(Named::new("web"));

        assert_ne!(first, second);
        assert_eq!(store.lookup("web"), Some(second));
        assert_eq!(store.get(second).predecessor, Some(first));
        assert_eq!(store.len(), 1);
        assert_eq!(store.overrides(second), vec![first]);
    }

    #[test]
    fn test_iter_keeps_first_declaration_order() {
        let mut store = Store::new();
        store.insert(Named::new("a"));
        store.insert(Named::new("b"));
        let newest_a = store.insert(Named::new("a"));

        let ids: Vec<_> = store.ids().collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], newest_a);
        assert_eq!(store.get(ids[1]).name, "b");
    }

    #[test]
    fn test_foreign_id_is_not_found() {
        let mut other = Store::new();
        other.insert(Named::new("a"));
        let foreign = other.insert(Named::new("b"));

        let store: Store<Named> = Store::new();
        assert!(!store.contains(foreign));
        assert!(store.try_get(foreign).is_none());
        assert!(store.overrides(foreign).is_empty());
    }

    #[test]
    fn test_name_index_clear() {
        let mut index: NameIndex<Named> = NameIndex::new();
        index.insert("a", Id::new(0));
        assert!(index.contains("a"));
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.get("a"), None);
    }
}
