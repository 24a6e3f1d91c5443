//! Concurrent display-name registry
//!
//! Maps each registered display name to its active connection. Owned
//! explicitly by the server and passed by reference to every session handler;
//! there is no process-wide state.
//!
//! A name is inserted only after the handshake accepts it and removed only
//! when that session's main loop terminates. The registry holds a non-owning
//! association: removal never closes the connection, the owning handler does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::connection::Connection;

/// Thread-safe name -> connection mapping with atomic check-and-insert
///
/// Names are case-sensitive and non-empty; no two entries ever reference the
/// same underlying connection.
#[derive(Debug, Default)]
pub struct NameRegistry {
    inner: Mutex<HashMap<String, Arc<Connection>>>,
}

impl NameRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically register `name` if it is free
    ///
    /// Returns `false` without mutating when the name is already present or
    /// empty. A `false` result is the recoverable name-conflict case: the
    /// caller re-prompts instead of failing.
    pub fn try_register(&self, name: &str, connection: Arc<Connection>) -> bool {
        if name.is_empty() {
            return false;
        }
        let mut map = self.inner.lock().expect("registry lock poisoned");
        if map.contains_key(name) {
            return false;
        }
        map.insert(name.to_string(), connection);
        true
    }

    /// Remove `name` if present; no-op otherwise
    pub fn unregister(&self, name: &str) {
        let mut map = self.inner.lock().expect("registry lock poisoned");
        map.remove(name);
    }

    /// Whether `name` is currently registered
    pub fn contains(&self, name: &str) -> bool {
        let map = self.inner.lock().expect("registry lock poisoned");
        map.contains_key(name)
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        let map = self.inner.lock().expect("registry lock poisoned");
        map.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A consistent point-in-time copy of all (name, connection) pairs
    ///
    /// Concurrent mutations after the snapshot is taken are not reflected;
    /// iteration over the copy cannot observe duplicates or phantom entries.
    pub fn snapshot(&self) -> Vec<(String, Arc<Connection>)> {
        let map = self.inner.lock().expect("registry lock poisoned");
        map.iter()
            .map(|(name, conn)| (name.clone(), Arc::clone(conn)))
            .collect()
    }
}
