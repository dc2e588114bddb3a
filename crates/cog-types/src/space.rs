use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::atom::Atom;
use crate::error::{TypeError, TypeResult};
use crate::handle::Handle;

/// In-memory atom table.
///
/// Interns atoms into [`Handle`]s so that every insertion of the same atom
/// yields the same key/value table. Spaces can be stacked into frames: a
/// lookup that misses locally falls through to the parents. All state sits
/// behind a `RwLock` for concurrent access from the storage workers.
pub struct AtomSpace {
    name: String,
    parents: Vec<Arc<AtomSpace>>,
    read_only: AtomicBool,
    atoms: RwLock<HashMap<Atom, Handle>>,
}

impl AtomSpace {
    /// Create a new empty, writable space.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parents(name, Vec::new())
    }

    /// Create a frame layered on top of `parents`.
    pub fn with_parents(name: impl Into<String>, parents: Vec<Arc<AtomSpace>>) -> Self {
        Self {
            name: name.into(),
            parents,
            read_only: AtomicBool::new(false),
            atoms: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &[Arc<AtomSpace>] {
        &self.parents
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    /// Add an atom (and, for links, its outgoing set), returning its handle.
    ///
    /// Adding an atom that is already present returns the existing handle.
    pub fn add(&self, atom: Atom) -> TypeResult<Handle> {
        if self.is_read_only() {
            return Err(TypeError::ReadOnly(self.name.clone()));
        }
        Ok(self.insert(atom))
    }

    fn insert(&self, atom: Atom) -> Handle {
        for child in atom.outgoing() {
            self.insert(child.clone());
        }
        if let Some(h) = self.get(&atom) {
            return h;
        }
        let mut map = self.atoms.write().expect("atomspace lock poisoned");
        map.entry(atom.clone())
            .or_insert_with(|| Handle::new(atom))
            .clone()
    }

    /// Look up an atom here, then in the parent frames.
    pub fn get(&self, atom: &Atom) -> Option<Handle> {
        if let Some(h) = self.get_local(atom) {
            return Some(h);
        }
        self.parents.iter().find_map(|p| p.get(atom))
    }

    /// Look up an atom in this frame only.
    pub fn get_local(&self, atom: &Atom) -> Option<Handle> {
        self.atoms
            .read()
            .expect("atomspace lock poisoned")
            .get(atom)
            .cloned()
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        self.get(atom).is_some()
    }

    /// Remove an atom from this frame.
    ///
    /// Without `recursive`, removal fails while links still point at the
    /// atom; with it, those links are removed first.
    pub fn remove(&self, atom: &Atom, recursive: bool) -> TypeResult<()> {
        if self.is_read_only() {
            return Err(TypeError::ReadOnly(self.name.clone()));
        }
        if self.get_local(atom).is_none() {
            return Err(TypeError::NotFound(atom.to_string()));
        }
        let incoming = self.incoming(atom);
        if !incoming.is_empty() {
            if !recursive {
                return Err(TypeError::HasIncoming {
                    atom: atom.to_string(),
                    count: incoming.len(),
                });
            }
            for h in incoming {
                // Already gone if an earlier removal took it out.
                let _ = self.remove(h.atom(), true);
            }
        }
        self.atoms
            .write()
            .expect("atomspace lock poisoned")
            .remove(atom);
        Ok(())
    }

    /// Links in this frame that contain `atom` directly.
    pub fn incoming(&self, atom: &Atom) -> Vec<Handle> {
        let map = self.atoms.read().expect("atomspace lock poisoned");
        let mut out: Vec<Handle> = map
            .values()
            .filter(|h| h.atom().contains(atom))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.atom().cmp(b.atom()));
        out
    }

    pub fn incoming_by_type(&self, atom: &Atom, ty: &str) -> Vec<Handle> {
        self.incoming(atom)
            .into_iter()
            .filter(|h| h.atom().is_a(ty))
            .collect()
    }

    /// Every atom of the given type in this frame, sorted.
    pub fn atoms_of_type(&self, ty: &str) -> Vec<Handle> {
        let map = self.atoms.read().expect("atomspace lock poisoned");
        let mut out: Vec<Handle> = map
            .values()
            .filter(|h| h.atom().is_a(ty))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.atom().cmp(b.atom()));
        out
    }

    /// Number of atoms in this frame.
    pub fn len(&self) -> usize {
        self.atoms.read().expect("atomspace lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.read().expect("atomspace lock poisoned").is_empty()
    }

    /// Remove every atom from this frame.
    pub fn clear(&self) {
        self.atoms.write().expect("atomspace lock poisoned").clear();
    }
}

impl std::fmt::Debug for AtomSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomSpace")
            .field("name", &self.name)
            .field("atoms", &self.len())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}
