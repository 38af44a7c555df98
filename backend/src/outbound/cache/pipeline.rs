//! Redis-backed `CachePipeline` implementation.
//!
//! Staged writes become one `MULTI`/`EXEC` pipeline, so everything in the
//! batch lands atomically relative to other clients of the same keys. After
//! `EXEC`, each command's reply is judged against what the staged write
//! requires: plain stores accept any reply, while expiries and deletes must
//! report that they actually touched a key. One unsatisfied reply fails the
//! whole unit from the caller's point of view, even though Redis applied it.

use async_trait::async_trait;
use bb8_redis::redis::{self, Pipeline, Value};
use tracing::warn;

use crate::domain::ports::{CachePipeline, CachePipelineError, CacheWrite, CartKeySpace};

use super::CachePool;

/// Redis implementation of the [`CachePipeline`] port.
#[derive(Clone)]
pub struct RedisCachePipeline {
    pool: CachePool,
    keys: CartKeySpace,
}

impl RedisCachePipeline {
    /// Create the pipeline over a pool and key space.
    pub fn new(pool: CachePool, keys: CartKeySpace) -> Self {
        Self { pool, keys }
    }
}

/// What a staged command's reply must look like for the write to count as
/// applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyCheck {
    /// Any non-error reply is fine (unconditional stores).
    Any,
    /// The reply must be an integer of at least this value (expiries and
    /// deletes report how many keys they touched).
    IntAtLeast(i64),
}

fn stage_write(
    pipe: &mut Pipeline,
    keys: &CartKeySpace,
    write: &CacheWrite,
) -> Result<ReplyCheck, CachePipelineError> {
    match write {
        CacheWrite::PutHeader { header, ttl } => {
            let key = keys.header_key(header.user_id());
            let payload =
                serde_json::to_string(header).map_err(CachePipelineError::serialization)?;
            let cmd = pipe.cmd("SET").arg(key).arg(payload);
            match ttl {
                Some(ttl) => {
                    cmd.arg("EX").arg(ttl.as_secs());
                }
                None => {
                    cmd.arg("KEEPTTL");
                }
            }
            Ok(ReplyCheck::Any)
        }
        CacheWrite::PutItem { user_id, item } => {
            let payload = serde_json::to_string(item).map_err(CachePipelineError::serialization)?;
            pipe.cmd("HSET")
                .arg(keys.items_key(user_id))
                .arg(item.product_id().to_string())
                .arg(payload);
            Ok(ReplyCheck::Any)
        }
        CacheWrite::RemoveItem {
            user_id,
            product_id,
        } => {
            pipe.cmd("HDEL")
                .arg(keys.items_key(user_id))
                .arg(product_id.to_string());
            Ok(ReplyCheck::IntAtLeast(1))
        }
        CacheWrite::ExpireItems { user_id, ttl } => {
            pipe.cmd("EXPIRE")
                .arg(keys.items_key(user_id))
                .arg(ttl.as_secs());
            Ok(ReplyCheck::IntAtLeast(1))
        }
        CacheWrite::DeleteHeader { user_id } => {
            pipe.cmd("DEL").arg(keys.header_key(user_id));
            Ok(ReplyCheck::IntAtLeast(1))
        }
        CacheWrite::DeleteAllItems { user_id } => {
            // An emptied hash no longer exists, so a cart whose last line
            // was decremented away legitimately has no items key; deleting
            // nothing still counts as the collection being gone.
            pipe.cmd("DEL").arg(keys.items_key(user_id));
            Ok(ReplyCheck::Any)
        }
    }
}

fn reply_satisfies(check: ReplyCheck, reply: &Value) -> bool {
    match check {
        ReplyCheck::Any => true,
        ReplyCheck::IntAtLeast(min) => matches!(reply, Value::Int(n) if *n >= min),
    }
}

#[async_trait]
impl CachePipeline for RedisCachePipeline {
    async fn apply(&self, writes: &[CacheWrite]) -> Result<bool, CachePipelineError> {
        if writes.is_empty() {
            return Ok(true);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut checks = Vec::with_capacity(writes.len());
        for write in writes {
            checks.push(stage_write(&mut pipe, &self.keys, write)?);
        }

        let mut conn = self.pool.get().await.map_err(CachePipelineError::submit)?;
        let replies: Vec<Value> = pipe
            .query_async(&mut *conn)
            .await
            .map_err(CachePipelineError::submit)?;

        if replies.len() != checks.len() {
            warn!(
                staged = checks.len(),
                replied = replies.len(),
                "cache pipeline reply count mismatch"
            );
            return Ok(false);
        }
        Ok(checks
            .iter()
            .zip(&replies)
            .all(|(check, reply)| reply_satisfies(*check, reply)))
    }
}
