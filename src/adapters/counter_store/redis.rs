//! Redis-backed counter store for multi-instance deployments.
//!
//! Increment and first-write expiry run as one server-side script, so a crash
//! between INCR and EXPIRE can never leave a counter without a TTL.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, ErrorKind, RedisError, Script};

use crate::ports::{CounterStore, CounterStoreError};

/// INCR, then EXPIRE when the key was just created.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// DECR only an existing, positive counter; never resurrects an expired key.
const DECREMENT_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current > 0 then
    return redis.call('DECR', KEYS[1])
end
return 0
"#;

const SCAN_BATCH: usize = 500;

/// Redis [`CounterStore`].
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: MultiplexedConnection,
    increment: Script,
    decrement: Script,
}

impl RedisCounterStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            increment: Script::new(INCREMENT_SCRIPT),
            decrement: Script::new(DECREMENT_SCRIPT),
        }
    }

    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, CounterStoreError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self::new(conn))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CounterStoreError> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_and_get(&self, key: &str, ttl_secs: u64) -> Result<u64, CounterStoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = self
            .increment
            .key(key)
            .arg(ttl_secs.max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| counter_error(key, e))?;
        Ok(count.max(0) as u64)
    }

    async fn get(&self, key: &str) -> Result<u64, CounterStoreError> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn.get(key).await.map_err(|e| counter_error(key, e))?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    async fn decrement(&self, key: &str) -> Result<(), CounterStoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .decrement
            .key(key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| counter_error(key, e))?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CounterStoreError> {
        let keys = self.keys_with_prefix(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let mut deleted = 0;
        for chunk in keys.chunks(SCAN_BATCH) {
            let n: u64 = redis::cmd("DEL")
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;
            deleted += n;
        }
        Ok(deleted)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>, CounterStoreError> {
        let keys = self.keys_with_prefix(prefix).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let mut found = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(SCAN_BATCH) {
            let values: Vec<Option<i64>> = redis::cmd("MGET")
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(|e| counter_error(prefix, e))?;
            // Keys can expire between SCAN and MGET.
            for (key, value) in chunk.iter().zip(values) {
                if let Some(value) = value {
                    found.push((key.clone(), value.max(0) as u64));
                }
            }
        }
        Ok(found)
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

fn unavailable(err: RedisError) -> CounterStoreError {
    CounterStoreError::unavailable(err.to_string())
}

/// Values that are not integer counters are `Corrupt`; anything else is an outage.
fn counter_error(key: &str, err: RedisError) -> CounterStoreError {
    let message = err.to_string();
    let bad_value = err.kind() == ErrorKind::TypeError
        || err.code() == Some("WRONGTYPE")
        || message.contains("WRONGTYPE")
        || message.contains("not an integer");

    if bad_value {
        CounterStoreError::Corrupt {
            key: key.to_string(),
            reason: message,
        }
    } else {
        unavailable(err)
    }
}

/// Escapes Redis glob metacharacters so a prefix matches literally.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("ratelimit:+2010:"), "ratelimit:+2010:");
        assert_eq!(escape_glob("a*b?c[d]e\\"), "a\\*b\\?c\\[d\\]e\\\\");
    }

    #[test]
    fn non_integer_values_are_corrupt() {
        let err = RedisError::from((
            ErrorKind::TypeError,
            "Response was of incompatible type",
            "\"abc\" is not an integer".to_string(),
        ));
        match counter_error("rl:cafe:total:0", err) {
            CounterStoreError::Corrupt { key, .. } => assert_eq!(key, "rl:cafe:total:0"),
            other => panic!("expected corrupt, got {other:?}"),
        }

        let err = RedisError::from((
            ErrorKind::ResponseError,
            "An error was signalled by the server",
            "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
        ));
        assert!(matches!(
            counter_error("rl:cafe:total:0", err),
            CounterStoreError::Corrupt { .. }
        ));
    }

    #[test]
    fn connection_failures_are_unavailable() {
        let err = RedisError::from((ErrorKind::IoError, "Connection refused"));
        assert!(matches!(
            counter_error("rl:cafe:total:0", err),
            CounterStoreError::Unavailable(_)
        ));
    }

    #[tokio::test]
    #[ignore] // needs a running Redis: cargo test -- --ignored
    async fn redis_counter_roundtrip() {
        let store = RedisCounterStore::connect("redis://127.0.0.1/").await.unwrap();
        let prefix = format!("leadflow-test:{}:", uuid::Uuid::new_v4());
        let key = format!("{}k", prefix);

        assert_eq!(store.increment_and_get(&key, 60).await.unwrap(), 1);
        assert_eq!(store.increment_and_get(&key, 60).await.unwrap(), 2);
        store.decrement(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), 1);
        assert_eq!(store.scan_prefix(&prefix).await.unwrap(), vec![(key.clone(), 1)]);
        assert_eq!(store.delete_by_prefix(&prefix).await.unwrap(), 1);
        assert_eq!(store.get(&key).await.unwrap(), 0);
    }
}
