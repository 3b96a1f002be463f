use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use jagged_error::{DbError, ErrorKind, Result};

/// Tracks memory reserved by native buffers.
///
/// Every buffer holds a `Reservation` for its lifetime, and the reservation
/// returns its bytes to the manager when dropped. This lets callers verify
/// that all storage reachable through shared buffers was released (e.g. after
/// a failed marshal).
///
/// Cloning a manager produces a handle to the same underlying counters.
#[derive(Clone)]
pub struct BufferManager {
    state: Arc<ManagerState>,
}

struct ManagerState {
    /// Optional upper bound on reserved bytes.
    limit: Option<usize>,
    reserved_bytes: AtomicUsize,
    live_reservations: AtomicUsize,
}

impl BufferManager {
    /// Create a manager with no memory limit.
    pub fn new() -> Self {
        Self::with_optional_limit(None)
    }

    /// Create a manager that refuses reservations past `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self::with_optional_limit(Some(limit))
    }

    fn with_optional_limit(limit: Option<usize>) -> Self {
        BufferManager {
            state: Arc::new(ManagerState {
                limit,
                reserved_bytes: AtomicUsize::new(0),
                live_reservations: AtomicUsize::new(0),
            }),
        }
    }

    /// Reserve `size` bytes.
    pub fn reserve(&self, size: usize) -> Result<Reservation> {
        let prev = self.state.reserved_bytes.fetch_add(size, Ordering::AcqRel);
        if let Some(limit) = self.state.limit {
            if prev + size > limit {
                self.state.reserved_bytes.fetch_sub(size, Ordering::AcqRel);
                tracing::trace!(size, limit, reserved = prev, "rejecting reservation");
                return Err(DbError::new("Buffer manager memory limit exceeded")
                    .with_kind(ErrorKind::ResourceExhausted)
                    .with_field("requested", size)
                    .with_field("reserved", prev)
                    .with_field("limit", limit));
            }
        }
        self.state.live_reservations.fetch_add(1, Ordering::AcqRel);

        Ok(Reservation {
            state: self.state.clone(),
            size,
        })
    }

    /// Number of bytes currently reserved.
    pub fn reserved_bytes(&self) -> usize {
        self.state.reserved_bytes.load(Ordering::Acquire)
    }

    /// Number of reservations that haven't been dropped.
    pub fn live_reservations(&self) -> usize {
        self.state.live_reservations.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<usize> {
        self.state.limit
    }
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferManager")
            .field("limit", &self.state.limit)
            .field("reserved_bytes", &self.reserved_bytes())
            .field("live_reservations", &self.live_reservations())
            .finish()
    }
}

/// Bytes reserved from a buffer manager, released on drop.
pub struct Reservation {
    state: Arc<ManagerState>,
    size: usize,
}

impl Reservation {
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("size", &self.size)
            .finish()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.state
            .reserved_bytes
            .fetch_sub(self.size, Ordering::AcqRel);
        self.state.live_reservations.fetch_sub(1, Ordering::AcqRel);
    }
}
