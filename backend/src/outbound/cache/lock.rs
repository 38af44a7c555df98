//! Redis-backed `DistributedLock` implementation.
//!
//! Acquisition is a single `SET key token NX PX ttl`: it either claims the
//! key for this holder or leaves the current holder untouched. Release runs
//! a compare-and-delete script so only the token that took the lock can
//! give it back; a blind `DEL` would let a slow caller free a lock someone
//! else has since re-acquired. There is no renewal — the TTL is the only
//! thing that frees a crashed holder's lock.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis;
use tracing::debug;

use crate::domain::ports::{DistributedLock, DistributedLockError, LockToken};

use super::{CachePool, CachePoolError};

/// Compare-and-delete: remove the key only while it still holds our token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis implementation of the [`DistributedLock`] port.
#[derive(Clone)]
pub struct RedisDistributedLock {
    pool: CachePool,
}

impl RedisDistributedLock {
    /// Create the lock adapter over a pool.
    pub fn new(pool: CachePool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: CachePoolError) -> DistributedLockError {
    DistributedLockError::backend(error)
}

fn map_redis_error(error: redis::RedisError) -> DistributedLockError {
    debug!(error = %error, "lock redis command failed");
    DistributedLockError::backend(error)
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl DistributedLock for RedisDistributedLock {
    async fn acquire(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, DistributedLockError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let claimed: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token.to_string())
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(claimed.is_some())
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, DistributedLockError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let removed: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(token.to_string())
            .invoke_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn ttl_converts_to_whole_milliseconds() {
        assert_eq!(ttl_millis(Duration::from_secs(5)), 5_000);
        assert_eq!(ttl_millis(Duration::from_millis(1)), 1);
    }

    #[rstest]
    fn release_script_checks_ownership_before_deleting() {
        assert!(RELEASE_SCRIPT.contains(r#"redis.call("get", KEYS[1]) == ARGV[1]"#));
        assert!(RELEASE_SCRIPT.contains(r#"redis.call("del", KEYS[1])"#));
    }

    #[rstest]
    fn pool_error_maps_to_backend() {
        let err = map_pool_error(CachePoolError::checkout("pool exhausted"));
        assert!(matches!(err, DistributedLockError::Backend { .. }));
    }
}
