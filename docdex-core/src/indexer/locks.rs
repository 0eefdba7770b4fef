//! Per-document write locks
//!
//! Each `doc_id` maps to an async mutex that is held across the whole
//! embed-then-write sequence. Entries are dropped once no writer holds them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held while writing one document; releases the key on drop
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let entry = {
            let mut map = self.inner.lock();
            // Forget keys nobody is holding or waiting on
            map.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(map.entry(key.to_string()).or_default())
        };

        KeyGuard {
            _guard: entry.lock_owned().await,
        }
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
