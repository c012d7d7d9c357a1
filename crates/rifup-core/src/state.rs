//! Durable interface state: which interfaces are configured, under
//! which mapped name, and how many dependents hold them up.
//!
//! The store is the ground truth surviving process restarts. It is
//! loaded at startup, synchronized into the interface collection,
//! mutated in memory as transitions run, and written back at shutdown.
//! One record per line: `name=mapped_name refcount[ explicit]`.

use indexmap::IndexMap;
use std::fs;
use std::path::Path;

use crate::collection::InterfaceCollection;
use crate::error::{IfupError, IfupResult};
use crate::interface::Interface;

/// One live state record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    /// The interface definition this name maps to (supports
    /// logical-to-physical aliasing, e.g. `eth0=wlan0`).
    pub mapped_if: String,
    /// Active references: self plus dependents.
    pub refcount: u32,
    /// Brought up by explicit request.
    pub is_explicit: bool,
}

/// Insertion-ordered map of interface name to state record.
#[derive(Debug, Default)]
pub struct StateStore {
    records: IndexMap<String, StateRecord>,
}

impl StateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store from `path`. A missing file is an empty store,
    /// not an error.
    pub fn load(path: &Path) -> IfupResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(IfupError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Parses state-file text. Unparsable refcounts fall back to 1.
    pub fn parse(text: &str) -> Self {
        let mut store = Self::new();
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let Some(head) = fields.next() else { continue };
            let refcount = fields
                .next()
                .and_then(|t| t.parse::<u32>().ok())
                .filter(|rc| *rc > 0)
                .unwrap_or(1);
            let is_explicit = fields.next().is_some();
            let (name, mapped) = match head.split_once('=') {
                Some((n, m)) => (n, m),
                None => (head, head),
            };
            store.records.insert(
                name.to_string(),
                StateRecord {
                    mapped_if: mapped.to_string(),
                    refcount,
                    is_explicit,
                },
            );
        }
        store
    }

    /// Serializes all live records, one per line.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (name, rec) in &self.records {
            out.push_str(&format!(
                "{}={} {}{}\n",
                name,
                rec.mapped_if,
                rec.refcount,
                if rec.is_explicit { " explicit" } else { "" }
            ));
        }
        out
    }

    /// Writes all live records to `path`, replacing its contents.
    pub fn save(&self, path: &Path) -> IfupResult<()> {
        fs::write(path, self.serialize()).map_err(|e| IfupError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Copies each record's refcount and explicit flag into the
    /// matching interface record, creating placeholders as needed.
    pub fn sync(&self, collection: &mut InterfaceCollection) {
        for rec in self.records.values() {
            let iface = collection.find_or_create(&rec.mapped_if);
            iface.refcount = rec.refcount;
            iface.is_explicit = rec.is_explicit;
        }
    }

    /// Inserts or replaces the record for `name` from the interface's
    /// current refcount and flags.
    pub fn upsert(&mut self, name: &str, iface: &Interface) {
        self.records.insert(
            name.to_string(),
            StateRecord {
                mapped_if: iface.ifname.clone(),
                refcount: iface.refcount,
                is_explicit: iface.is_explicit,
            },
        );
    }

    /// Removes the record for `name`, if any.
    pub fn remove(&mut self, name: &str) {
        self.records.shift_remove(name);
    }

    /// Increments the interface's refcount and upserts its record.
    pub fn ref_if(&mut self, name: &str, iface: &mut Interface) {
        iface.refcount += 1;
        self.upsert(name, iface);
    }

    /// Decrements the interface's refcount; the record is upserted
    /// while references remain and deleted when the count reaches
    /// zero. A refcount already at zero stays there.
    pub fn unref_if(&mut self, name: &str, iface: &mut Interface) {
        if iface.refcount == 0 {
            return;
        }
        iface.refcount -= 1;
        if iface.refcount > 0 {
            self.upsert(name, iface);
        } else {
            self.remove(name);
        }
    }

    /// The record for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&StateRecord> {
        self.records.get(name)
    }

    /// Whether `name` has a live record.
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Resolves `name` through its record's mapped name to the
    /// interface definition it refers to.
    pub fn lookup<'a>(
        &self,
        collection: &'a InterfaceCollection,
        name: &str,
    ) -> Option<&'a Interface> {
        let rec = self.records.get(name)?;
        collection.get(&rec.mapped_if)
    }

    /// Iterates `(name, record)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_variants() {
        let store = StateStore::parse("eth0=eth0 1\neth1=wlan0 2 explicit\nbare\n");
        assert_eq!(store.len(), 3);

        let eth0 = store.get("eth0").unwrap();
        assert_eq!(eth0.mapped_if, "eth0");
        assert_eq!(eth0.refcount, 1);
        assert!(!eth0.is_explicit);

        let eth1 = store.get("eth1").unwrap();
        assert_eq!(eth1.mapped_if, "wlan0");
        assert_eq!(eth1.refcount, 2);
        assert!(eth1.is_explicit);

        // a bare name maps to itself with refcount 1
        let bare = store.get("bare").unwrap();
        assert_eq!(bare.mapped_if, "bare");
        assert_eq!(bare.refcount, 1);
    }

    #[test]
    fn test_parse_clamps_bad_refcounts() {
        let store = StateStore::parse("a=a 0\nb=b garbage\n");
        assert_eq!(store.get("a").unwrap().refcount, 1);
        assert_eq!(store.get("b").unwrap().refcount, 1);
    }

    #[test]
    fn test_roundtrip() {
        let text = "lo=lo 1\neth0=eth0 2\nwlan0=wlan-home 1 explicit\n";
        let store = StateStore::parse(text);
        assert_eq!(store.serialize(), text);

        let again = StateStore::parse(&store.serialize());
        for (name, rec) in store.iter() {
            assert_eq!(again.get(name), Some(rec));
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(&dir.path().join("no-such-state")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ifstate");
        let mut store = StateStore::new();
        let mut iface = Interface::new("eth0");
        store.ref_if("eth0", &mut iface);
        store.save(&path).unwrap();

        let loaded = StateStore::load(&path).unwrap();
        assert_eq!(loaded.get("eth0").unwrap().refcount, 1);
    }

    #[test]
    fn test_ref_unref_lifecycle() {
        let mut store = StateStore::new();
        let mut iface = Interface::new("br0");

        store.ref_if("br0", &mut iface);
        store.ref_if("br0", &mut iface);
        assert_eq!(iface.refcount, 2);
        assert_eq!(store.get("br0").unwrap().refcount, 2);

        store.unref_if("br0", &mut iface);
        assert_eq!(iface.refcount, 1);
        assert!(store.contains("br0"));

        store.unref_if("br0", &mut iface);
        assert_eq!(iface.refcount, 0);
        assert!(!store.contains("br0"));

        // further decrements are no-ops
        store.unref_if("br0", &mut iface);
        assert_eq!(iface.refcount, 0);
    }

    #[test]
    fn test_sync_copies_into_collection() {
        let store = StateStore::parse("eth0=eth0 2\nwlan0=wlan-home 1 explicit\n");
        let mut collection = InterfaceCollection::new();
        store.sync(&mut collection);

        assert_eq!(collection.get("eth0").unwrap().refcount, 2);
        let home = collection.get("wlan-home").unwrap();
        assert_eq!(home.refcount, 1);
        assert!(home.is_explicit);
    }

    #[test]
    fn test_lookup_through_mapped_name() {
        let store = StateStore::parse("eth0=wlan-home 1\n");
        let mut collection = InterfaceCollection::new();
        collection.find_or_create("wlan-home").is_auto = true;

        let iface = store.lookup(&collection, "eth0").unwrap();
        assert_eq!(iface.ifname, "wlan-home");
        assert!(store.lookup(&collection, "absent").is_none());
    }
}
