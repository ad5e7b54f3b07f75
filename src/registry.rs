use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::model::ModelId;

/// Definition name → finished model handle. Grows monotonically during one
/// conversion and is dropped with it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    by_name: IndexMap<String, ModelId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, name: impl Into<String>, id: ModelId) {
        self.by_name.insert(name.into(), id);
    }
    pub fn get(&self, name: &str) -> Option<ModelId> {
        self.by_name.get(name).copied()
    }
    pub fn len(&self) -> usize {
        self.by_name.len()
    }
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Names currently mid-construction. Never shared between sibling builds:
/// `with` hands out an extended copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Building(BTreeSet<String>);

impl Building {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(&self, name: &str) -> Self {
        let mut next = self.0.clone();
        next.insert(name.to_owned());
        Building(next)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelFactory, TypeArena};

    #[test]
    fn later_registration_replaces_earlier() {
        let mut arena = TypeArena::new();
        let first = arena.define_composite("A", None, vec![]).unwrap();
        let second = arena.define_composite("A", None, vec![]).unwrap();
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        registry.insert("A", first);
        registry.insert("A", second);
        assert_eq!(registry.get("A"), Some(second));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("B"), None);
    }

    #[test]
    fn building_copies_do_not_leak_into_siblings() {
        let root = Building::new();
        let a = root.with("A");
        let b = root.with("B");
        assert!(a.contains("A") && !a.contains("B"));
        assert!(b.contains("B") && !b.contains("A"));
        assert!(!root.contains("A"));
        assert!(a.with("C").contains("A"));
    }
}
