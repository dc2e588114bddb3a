use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use cog_sexpr::FrameExpr;
use cog_types::AtomSpace;

use crate::error::{StorageError, StorageResult};

/// Maps local atomspace frames to the short names the server knows them
/// by, and back. Guarded by its own lock, independent of the channel.
#[derive(Default)]
pub struct FrameCache {
    frames: RwLock<HashMap<String, Arc<AtomSpace>>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `space` and all of its ancestors. Returns its short name.
    ///
    /// Frames are known to the server by name only, so a name already
    /// taken by a different atomspace is refused and nothing is recorded.
    pub fn remember(&self, space: &Arc<AtomSpace>) -> StorageResult<String> {
        let mut frames = self.frames.write().expect("frame cache lock poisoned");
        let mut found: HashMap<String, Arc<AtomSpace>> = HashMap::new();
        let mut stack = vec![Arc::clone(space)];
        while let Some(frame) = stack.pop() {
            let name = frame.name();
            let taken = frames.get(name).or_else(|| found.get(name));
            if let Some(other) = taken {
                if !Arc::ptr_eq(other, &frame) {
                    return Err(StorageError::FrameConflict(name.to_string()));
                }
            }
            stack.extend(frame.parents().iter().cloned());
            found.insert(name.to_string(), frame);
        }
        frames.extend(found);
        Ok(space.name().to_string())
    }

    pub fn get(&self, name: &str) -> Option<Arc<AtomSpace>> {
        self.frames
            .read()
            .expect("frame cache lock poisoned")
            .get(name)
            .cloned()
    }

    /// Short name of a cached frame, matched by identity.
    pub fn name_of(&self, space: &Arc<AtomSpace>) -> Option<String> {
        self.frames
            .read()
            .expect("frame cache lock poisoned")
            .iter()
            .find(|(_, f)| Arc::ptr_eq(f, space))
            .map(|(name, _)| name.clone())
    }

    /// Turn a decoded frame expression into local frames, reusing cached
    /// ones by name and creating the rest bottom-up.
    pub fn resolve(&self, expr: &FrameExpr) -> Arc<AtomSpace> {
        if let Some(found) = self.get(&expr.name) {
            return found;
        }
        let parents: Vec<Arc<AtomSpace>> = expr.parents.iter().map(|p| self.resolve(p)).collect();
        let frame = Arc::new(AtomSpace::with_parents(expr.name.clone(), parents));
        let mut frames = self.frames.write().expect("frame cache lock poisoned");
        // Another thread may have resolved the same name meanwhile.
        Arc::clone(frames.entry(expr.name.clone()).or_insert(frame))
    }

    pub fn len(&self) -> usize {
        self.frames.read().expect("frame cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.frames.write().expect("frame cache lock poisoned").clear();
    }
}
