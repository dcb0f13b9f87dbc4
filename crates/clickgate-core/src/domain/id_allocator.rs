//! Thread-safe allocator for component ids.
//!
//! Ids start at 1 and increase by one per registration.  Unlike a protocol
//! sequence number, a component id must never be reused within the process,
//! so the allocator refuses to wrap: once `i32::MAX` has been handed out,
//! further allocations fail.
//!
//! The counter is an `AtomicI32`, so concurrent registrations on different
//! worker threads never block each other and never receive the same id.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::domain::component::ComponentId;

/// Hands out process-unique, strictly increasing [`ComponentId`]s.
///
/// # Examples
///
/// ```rust
/// use clickgate_core::domain::id_allocator::ComponentIdAllocator;
///
/// let ids = ComponentIdAllocator::new();
/// assert_eq!(ids.allocate(), Some(1));
/// assert_eq!(ids.allocate(), Some(2));
/// ```
#[derive(Debug)]
pub struct ComponentIdAllocator {
    /// The next id to hand out.
    next: AtomicI32,
}

impl ComponentIdAllocator {
    /// Creates an allocator whose first id is 1.
    pub fn new() -> Self {
        Self {
            next: AtomicI32::new(1),
        }
    }

    /// Returns a fresh id, or `None` once the id space is exhausted.
    pub fn allocate(&self) -> Option<ComponentId> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
                if id <= 0 {
                    None
                } else {
                    Some(id.checked_add(1).unwrap_or(0))
                }
            })
            .ok()
    }
}

impl Default for ComponentIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
