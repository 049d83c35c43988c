//! Identity tracking for runtime objects.
//!
//! Scopes, operations and lookups have no natural identifier, and two of
//! them may be structurally identical. The tracker keys objects by their
//! `Arc` allocation and hands out monotonically increasing [`ObjectId`]s.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Identifier of a tracked object or a described type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Keeps a tracked allocation from being freed, so its address cannot be
/// handed to a different object while the entry exists. Does not keep the
/// value itself alive.
trait AllocationPin: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl<T: ?Sized + Send + Sync> AllocationPin for Weak<T> {
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }
}

struct Entry {
    id: ObjectId,
    pin: Box<dyn AllocationPin>,
}

/// Thread-safe identity map from `Arc` allocations to [`ObjectId`]s.
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::IdTracker;
/// use std::sync::Arc;
///
/// let tracker = IdTracker::new();
/// let a = Arc::new(5);
/// let b = Arc::new(5);
///
/// let (id_a, new_a) = tracker.get_or_assign_id(&a);
/// let (id_b, _) = tracker.get_or_assign_id(&b);
/// assert!(new_a);
/// assert_ne!(id_a, id_b);
/// assert_eq!(tracker.get_or_assign_id(&a), (id_a, false));
///
/// tracker.forget_id(&a);
/// assert_eq!(tracker.id_of(&a), None);
/// ```
pub struct IdTracker {
    next: AtomicU64,
    entries: Mutex<AHashMap<usize, Entry>>,
}

impl IdTracker {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(AHashMap::new()),
        }
    }

    #[inline]
    fn address<T: ?Sized>(object: &Arc<T>) -> usize {
        Arc::as_ptr(object) as *const () as usize
    }

    /// A fresh identifier not bound to any object.
    pub fn allocate(&self) -> ObjectId {
        ObjectId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The identifier of `object`, assigning one if it is not tracked yet.
    /// The flag is true when the identifier was assigned by this call.
    pub fn get_or_assign_id<T>(&self, object: &Arc<T>) -> (ObjectId, bool)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&Self::address(object)) {
            return (entry.id, false);
        }
        let id = self.allocate();
        entries.insert(
            Self::address(object),
            Entry {
                id,
                pin: Box::new(Arc::downgrade(object)),
            },
        );
        (id, true)
    }

    /// The identifier of `object`, if tracked.
    pub fn id_of<T: ?Sized>(&self, object: &Arc<T>) -> Option<ObjectId> {
        self.entries.lock().get(&Self::address(object)).map(|entry| entry.id)
    }

    /// Stops tracking `object`. No-op if it was never tracked.
    pub fn forget_id<T: ?Sized>(&self, object: &Arc<T>) -> Option<ObjectId> {
        self.forget_address(Self::address(object))
    }

    /// Stops tracking the allocation at `address`.
    pub fn forget_address(&self, address: usize) -> Option<ObjectId> {
        self.entries.lock().remove(&address).map(|entry| entry.id)
    }

    /// Drops entries whose object has already been destroyed. Returns how many.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.pin.is_alive());
        before - entries.len()
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IdTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdTracker")
            .field("tracked", &self.len())
            .field("next", &self.next.load(Ordering::Relaxed))
            .finish()
    }
}
