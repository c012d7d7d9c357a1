//! The interface collection: an insertion-ordered map of interface
//! records owned by one run.

use indexmap::IndexMap;

use crate::interface::Interface;

/// Insertion-ordered map from interface name to its record.
///
/// Records are upserted as needed, so `auto eth0` or a `requires`
/// reference can create a placeholder before (or without) its own
/// stanza. The resolver reorders iteration order in place after depth
/// computation.
#[derive(Debug, Default)]
pub struct InterfaceCollection {
    map: IndexMap<String, Interface>,
}

impl InterfaceCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection pre-seeded with the loopback interface,
    /// which is always part of a standard configuration.
    pub fn standard() -> Self {
        let mut collection = Self::new();
        let lo = collection.find_or_create("lo");
        lo.is_auto = true;
        lo.vars.push("use", "loopback");
        collection
    }

    /// Returns the record for `name`, creating a placeholder if absent.
    pub fn find_or_create(&mut self, name: &str) -> &mut Interface {
        self.map
            .entry(name.to_string())
            .or_insert_with(|| Interface::new(name))
    }

    /// Replaces (or inserts) a record under its own name.
    pub fn upsert(&mut self, iface: Interface) {
        self.map.insert(iface.ifname.clone(), iface);
    }

    /// Looks up a record.
    pub fn get(&self, name: &str) -> Option<&Interface> {
        self.map.get(name)
    }

    /// Looks up a record mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.map.get_mut(name)
    }

    /// Whether `name` has a record.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Interface names in current iteration order.
    pub fn names(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    /// Iterates records in current iteration order.
    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.map.values()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Stable reorder by descending dependency depth: interfaces
    /// deeper in the `requires` chain iterate before their
    /// dependencies; ties keep their original relative order.
    pub fn sort_by_depth(&mut self) {
        self.map
            .sort_by(|_, a, _, b| b.rdepends_count.cmp(&a.rdepends_count));
    }
}
