//! Exclusive access to the external automation host.
//!
//! Every conversion takes a [`HostPermit`] before launching a host and keeps
//! it until the host has quit. The permit is an owned semaphore permit, so it
//! can move into the blocking task and is returned on every exit path,
//! including panics and cancelled requests.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HostArbiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Proof of exclusive (or bounded) access to the host. Released on drop.
#[derive(Debug)]
pub struct HostPermit {
    _permit: OwnedSemaphorePermit,
    waited: Duration,
}

impl HostPermit {
    /// How long the caller queued before getting access.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl HostArbiter {
    /// `capacity` is the number of hosts allowed to run at once (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hosts that could be launched right now without waiting.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for access to the host.
    pub async fn acquire(&self) -> HostPermit {
        let start = Instant::now();
        if self.available() == 0 {
            debug!("waiting for host access ({} in use)", self.capacity());
        }
        let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(p) => p,
            // The semaphore lives as long as `self` and is never closed.
            Err(_) => unreachable!("host arbiter semaphore closed"),
        };
        let waited = start.elapsed();
        debug!("host permit acquired after {}ms", waited.as_millis());
        HostPermit {
            _permit: permit,
            waited,
        }
    }
}

impl Default for HostArbiter {
    fn default() -> Self {
        Self::new(1)
    }
}
