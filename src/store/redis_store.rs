use super::{KvStore, StoreError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

/// Redis-backed store. All keys are namespaced with the configured prefix so
/// several deployments can share one instance.
pub struct RedisStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;
        tracing::info!(url = %url, prefix = %prefix, "Connected to redis store");
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    // MultiplexedConnection is cheap to clone and each op needs &mut.
    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        conn.get(self.key(key)).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.set(self.key(key), value).await.map_err(backend)?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn
            .set_ex(self.key(key), value, ttl_secs)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        conn.hget(self.key(key), field).await.map_err(backend)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: i64 = conn
            .hset(self.key(key), field, value)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let added: i64 = conn.sadd(self.key(key), member).await.map_err(backend)?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let removed: i64 = conn.srem(self.key(key), member).await.map_err(backend)?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        conn.smembers(self.key(key)).await.map_err(backend)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn();
        let len: i64 = conn.rpush(self.key(key), value).await.map_err(backend)?;
        Ok(len.max(0) as u64)
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        conn.lrange(self.key(key), start, stop)
            .await
            .map_err(backend)
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn
            .ltrim(self.key(key), start, stop)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
