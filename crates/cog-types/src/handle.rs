use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use crate::atom::Atom;
use crate::value::Value;

struct AtomEntry {
    atom: Atom,
    values: RwLock<BTreeMap<Atom, Value>>,
}

/// Shared reference to an atom and its key/value table.
///
/// Cloning a `Handle` is cheap; all clones see the same values. Equality and
/// hashing follow the atom, not the value table.
#[derive(Clone)]
pub struct Handle(Arc<AtomEntry>);

impl Handle {
    pub fn new(atom: Atom) -> Self {
        Self(Arc::new(AtomEntry {
            atom,
            values: RwLock::new(BTreeMap::new()),
        }))
    }

    pub fn atom(&self) -> &Atom {
        &self.0.atom
    }

    /// Set (or, with `None`, remove) the value stored under `key`.
    pub fn set_value(&self, key: Atom, value: Option<Value>) {
        let mut values = self.0.values.write().expect("values lock poisoned");
        match value {
            Some(v) => {
                values.insert(key, v);
            }
            None => {
                values.remove(&key);
            }
        }
    }

    pub fn value(&self, key: &Atom) -> Option<Value> {
        self.0
            .values
            .read()
            .expect("values lock poisoned")
            .get(key)
            .cloned()
    }

    /// All keys with a value, in key order.
    pub fn keys(&self) -> Vec<Atom> {
        self.0
            .values
            .read()
            .expect("values lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot of every key/value pair, in key order.
    pub fn values(&self) -> Vec<(Atom, Value)> {
        self.0
            .values
            .read()
            .expect("values lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn has_values(&self) -> bool {
        !self.0.values.read().expect("values lock poisoned").is_empty()
    }

    pub fn clear_values(&self) {
        self.0.values.write().expect("values lock poisoned").clear();
    }

    /// Returns `true` if both handles point at the same entry.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Atom> for Handle {
    fn from(atom: Atom) -> Self {
        Self::new(atom)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.0.atom == other.0.atom
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.atom.hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0.atom)
    }
}
