//! Simulator unit/dialect string interning. The simulator RPC surface
//! tags values with a small, slow-changing set of unit/dialect strings
//! (e.g. "chp_state"); rather than allocate a fresh `String` per message we
//! intern them into a small shared pool of `Arc<str>`.

use parking_lot::Mutex;
use std::sync::Arc;

const DEFAULT_CAPACITY: usize = 8;

/// An interned unit or dialect string, cheap to clone and compare by
/// pointer via `Arc::ptr_eq` when it came from the same pool.
pub type SimulatorUnit = Arc<str>;

/// Fixed-capacity, concurrent-insert-safe pool of interned strings. Eviction
/// is oldest-first: once full, the next novel string bumps out whichever
/// entry has been resident longest. This is a simplicity trade-off, not a
/// frequency-aware cache; the pool's whole job is to avoid repeat
/// allocation for a handful of recurring names, not perfect hit rates.
pub struct DialectPool {
    capacity: usize,
    entries: Mutex<Vec<SimulatorUnit>>,
}

impl DialectPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Return the interned `SimulatorUnit` for `value`, inserting it if not
    /// already present.
    pub fn intern(&self, value: &str) -> SimulatorUnit {
        let mut guard = self.entries.lock();
        if let Some(existing) = guard.iter().find(|e| e.as_ref() == value) {
            return existing.clone();
        }
        let interned: SimulatorUnit = Arc::from(value);
        if guard.len() >= self.capacity {
            guard.remove(0);
        }
        guard.push(interned.clone());
        interned
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DialectPool {
    fn default() -> Self {
        Self::new()
    }
}
