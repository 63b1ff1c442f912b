//! Handle table for host-owned values
//!
//! Foreign code cannot hold a safe reference into host memory, so host
//! values handed across the boundary are parked here and referred to by an
//! integer. IDs start at 1, increase monotonically, and are never reused
//! within a process run; 0 is the "empty slot" value.
//!
//! Entries are never reclaimed passively. The owner of a foreign object must
//! call [`HandleTable::remove`] exactly once when that object tears down;
//! an owner that never does leaks its entry for the rest of the process.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Key of a handle table entry. Never 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Rebuild an ID read back from a foreign storage slot; `None` for the
    /// empty slot value 0
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(HandleId(raw))
        }
    }

    /// Raw value for storing in a foreign slot
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stored host value of unknown type
pub type HostValue = Arc<dyn Any + Send + Sync>;

struct Entries {
    next_id: u64,
    values: HashMap<u64, HostValue>,
}

/// Thread-safe registry mapping integer IDs to host-owned values.
///
/// One reader/writer lock guards the whole table: lookups run concurrently,
/// stores and removals are exclusive.
pub struct HandleTable {
    entries: RwLock<Entries>,
}

impl HandleTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries {
                next_id: 1,
                values: HashMap::new(),
            }),
        }
    }

    /// Insert a value and return its ID.
    pub fn store(&self, value: HostValue) -> HandleId {
        let mut entries = self.entries.write();
        let id = entries.next_id;
        entries.next_id += 1;
        entries.values.insert(id, value);
        tracing::trace!(handle = id, "stored host value");
        HandleId(id)
    }

    /// Insert a typed value and return its ID.
    pub fn store_value<T: Any + Send + Sync>(&self, value: T) -> HandleId {
        self.store(Arc::new(value))
    }

    /// Value stored under `id`, if it has not been removed.
    pub fn lookup(&self, id: HandleId) -> Option<HostValue> {
        let value = self.entries.read().values.get(&id.0).cloned();
        if value.is_none() {
            tracing::debug!(handle = id.0, "lookup of missing handle");
        }
        value
    }

    /// Value stored under `id`, downcast to `T`.
    ///
    /// A value of another type is reported and treated as absent.
    pub fn lookup_as<T: Any + Send + Sync>(&self, id: HandleId) -> Option<Arc<T>> {
        let value = self.lookup(id)?;
        match value.downcast::<T>() {
            Ok(typed) => Some(typed),
            Err(_) => {
                tracing::error!(
                    handle = id.0,
                    expected = std::any::type_name::<T>(),
                    "stored host value has an unexpected type"
                );
                None
            }
        }
    }

    /// Remove the entry for `id`. Returns false if there was none.
    pub fn remove(&self, id: HandleId) -> bool {
        let removed = self.entries.write().values.remove(&id.0).is_some();
        if removed {
            tracing::trace!(handle = id.0, "removed host value");
        } else {
            tracing::debug!(handle = id.0, "remove of missing handle");
        }
        removed
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.read().values.len()
    }

    /// True when no entries are live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// ID the next store will issue
    pub fn peek_next_id(&self) -> u64 {
        self.entries.read().next_id
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

static HANDLES: LazyLock<HandleTable> = LazyLock::new(HandleTable::new);

/// The process-wide handle table
pub fn handles() -> &'static HandleTable {
    &HANDLES
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ids_start_at_one() {
        let table = HandleTable::new();
        let id = table.store_value(5u32);
        assert_eq!(id.as_raw(), 1);
        assert_eq!(HandleId::from_raw(0), None);
        assert_eq!(HandleId::from_raw(1), Some(id));
    }

    #[test]
    fn test_store_lookup_remove() {
        let table = HandleTable::new();
        let id = table.store_value(String::from("window"));
        assert_eq!(table.lookup_as::<String>(id).unwrap().as_str(), "window");
        assert!(table.remove(id));
        assert!(table.lookup(id).is_none());
        assert!(!table.remove(id));
    }

    #[test]
    fn test_ids_never_reused() {
        let table = HandleTable::new();
        let first = table.store_value(1u8);
        table.remove(first);
        let second = table.store_value(2u8);
        assert!(second > first);
    }

    #[test]
    fn test_wrong_type_is_absent() {
        let table = HandleTable::new();
        let id = table.store_value(7i64);
        assert!(table.lookup_as::<String>(id).is_none());
        assert!(table.lookup_as::<i64>(id).is_some());
    }

    #[test]
    fn test_concurrent_store_and_remove() {
        let table = Arc::new(HandleTable::new());
        let workers: Vec<_> = (0..8)
            .map(|n| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..100u64 {
                        let id = table.store_value(n * 1000 + i);
                        if i % 2 == 0 {
                            assert!(table.remove(id));
                            assert!(table.lookup(id).is_none());
                        } else {
                            kept.push(id);
                        }
                    }
                    for id in &kept {
                        assert!(table.lookup(*id).is_some());
                    }
                    kept
                })
            })
            .collect();

        let mut all: Vec<HandleId> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        assert_eq!(table.len(), 400);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(table.peek_next_id(), 801);
    }
}
