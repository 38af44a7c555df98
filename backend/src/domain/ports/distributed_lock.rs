//! Named, TTL-bound mutual exclusion on the shared cache backend.
//!
//! Used to serialise first-write-wins paths such as "does this shopper
//! already have a cart header?". There is no renewal: critical sections are
//! kept short by construction and the TTL bounds how long a crashed holder
//! can block everyone else.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::define_port_error;

/// Token identifying one lock holder, so release is ownership-checked
/// rather than a blind delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(Uuid);

impl LockToken {
    /// Mint a fresh holder token.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

define_port_error! {
    /// Errors raised by distributed lock adapters.
    pub enum DistributedLockError {
        /// Cache backend is unavailable or timing out.
        Backend => "distributed lock backend failure: {message}",
    }
}

/// Port for acquiring and releasing named TTL-bound locks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock. `Ok(false)` when another token already holds
    /// it; never an error for ordinary contention.
    async fn acquire(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, DistributedLockError>;

    /// Give the lock back. Only succeeds when `token` still matches the
    /// current holder, so a slow caller cannot release somebody else's
    /// re-acquired lock.
    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, DistributedLockError>;
}
