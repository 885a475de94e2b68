/// ShaderRegistry - named shader sources with generation counters.
///
/// An explicit, constructed-and-owned registry: the render core owns it and
/// reads it freely on the render thread. File watchers (or any other
/// collaborator) run on their own threads and never touch the registry
/// directly. They push `(name, code)` updates through a mutex-guarded
/// handoff queue, which the render thread drains once per frame. Every
/// applied update bumps that shader's generation counter; compiled
/// artifacts compare generations to detect staleness.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::render_info;

/// SPIR-V source pair for one named shader, plus its generation
pub struct ShaderSource {
    pub vertex: Arc<Vec<u8>>,
    pub fragment: Arc<Vec<u8>>,
    /// Incremented every time the source changes; never reset
    pub generation: u64,
}

/// One pending hot-reload update from a watcher thread
pub struct ShaderUpdate {
    pub name: String,
    pub vertex: Vec<u8>,
    pub fragment: Vec<u8>,
}

/// Cloneable handle for pushing updates from watcher threads.
///
/// The only cross-thread surface of the shader system: a mutex-guarded
/// vector, appended by watchers, drained by the render thread.
#[derive(Clone)]
pub struct ShaderUpdateQueue {
    pending: Arc<Mutex<Vec<ShaderUpdate>>>,
}

impl ShaderUpdateQueue {
    fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue new source for a named shader. Callable from any thread.
    pub fn push(&self, name: impl Into<String>, vertex: Vec<u8>, fragment: Vec<u8>) {
        self.pending.lock().unwrap().push(ShaderUpdate {
            name: name.into(),
            vertex,
            fragment,
        });
    }

    fn drain(&self) -> Vec<ShaderUpdate> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

/// Owned registry of shader sources
pub struct ShaderRegistry {
    shaders: FxHashMap<String, ShaderSource>,
    updates: ShaderUpdateQueue,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self {
            shaders: FxHashMap::default(),
            updates: ShaderUpdateQueue::new(),
        }
    }

    /// Register or replace a shader's source, bumping its generation.
    pub fn register(&mut self, name: impl Into<String>, vertex: Vec<u8>, fragment: Vec<u8>) {
        self.apply(name.into(), vertex, fragment);
    }

    fn apply(&mut self, name: String, vertex: Vec<u8>, fragment: Vec<u8>) -> u64 {
        let generation = self.shaders.get(&name).map_or(1, |s| s.generation + 1);
        self.shaders.insert(
            name,
            ShaderSource {
                vertex: Arc::new(vertex),
                fragment: Arc::new(fragment),
                generation,
            },
        );
        generation
    }

    pub fn get(&self, name: &str) -> Option<&ShaderSource> {
        self.shaders.get(name)
    }

    pub fn generation(&self, name: &str) -> Option<u64> {
        self.shaders.get(name).map(|s| s.generation)
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Handle for watcher threads; clone freely.
    pub fn update_queue(&self) -> ShaderUpdateQueue {
        self.updates.clone()
    }

    /// Apply pending hot-reload updates. Render thread only; called once
    /// per frame. Returns the number of updates applied.
    pub fn drain_updates(&mut self) -> usize {
        let updates = self.updates.drain();
        let count = updates.len();
        for update in updates {
            let name = update.name.clone();
            let generation = self.apply(update.name, update.vertex, update.fragment);
            render_info!(
                "orrery3d::ShaderRegistry",
                "shader '{}' updated to generation {}",
                name,
                generation
            );
        }
        count
    }
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
