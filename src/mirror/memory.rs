use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{MirrorError, MirrorStore};

/// In-memory mirror store.
///
/// Clones share the same map, so a test can keep a handle on the store
/// it handed to an orchestrator and inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct MemoryMirrorStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MirrorStore for MemoryMirrorStore {
    fn read(&self, key: &str) -> Result<Option<String>, MirrorError> {
        let entries = self.entries.lock().map_err(|_| MirrorError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), MirrorError> {
        let mut entries = self.entries.lock().map_err(|_| MirrorError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MirrorError> {
        let mut entries = self.entries.lock().map_err(|_| MirrorError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}
