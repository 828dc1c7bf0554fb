use super::{KvStore, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// In-process store used by tests and as the no-Redis fallback backend.
/// Mirrors the redis semantics the pipeline relies on, including negative
/// list indices and lazy TTL expiry.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, StringEntry>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, Vec<String>>,
}

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at <= Instant::now())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Maps a redis-style inclusive range onto `0..len` indices.
/// Returns `None` when the range selects nothing.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.strings.get(key) {
            Some(entry) if entry.expired() => {
                inner.strings.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .sets
            .get_mut(key)
            .map(|s| s.remove(member))
            .unwrap_or(false))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let list = inner.lists.entry(key.to_string()).or_default();
        list.push(value.to_string());
        Ok(list.len() as u64)
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(list) = inner.lists.get(key) else {
            return Ok(Vec::new());
        };
        match resolve_range(list.len(), start, stop) {
            Some((s, e)) => Ok(list[s..=e].to_vec()),
            None => Ok(Vec::new()),
        }
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(list) = inner.lists.get_mut(key) {
            match resolve_range(list.len(), start, stop) {
                Some((s, e)) => {
                    *list = list[s..=e].to_vec();
                }
                None => list.clear(),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", 1).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hash_fields_independent() {
        let store = MemoryStore::new();
        store.hset("h", "a", "1").await.unwrap();
        store.hset("h", "b", "2").await.unwrap();
        store.hset("h", "a", "3").await.unwrap();
        assert_eq!(store.hget("h", "a").await.unwrap(), Some("3".to_string()));
        assert_eq!(store.hget("h", "b").await.unwrap(), Some("2".to_string()));
        assert_eq!(store.hget("h", "c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_membership() {
        let store = MemoryStore::new();
        assert!(store.sadd("s", "0xabc").await.unwrap());
        assert!(!store.sadd("s", "0xabc").await.unwrap());
        assert_eq!(store.smembers("s").await.unwrap(), vec!["0xabc".to_string()]);
        assert!(store.srem("s", "0xabc").await.unwrap());
        assert!(!store.srem("s", "0xabc").await.unwrap());
        assert!(store.smembers("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_negative_indices() {
        let store = MemoryStore::new();
        for v in ["a", "b", "c", "d"] {
            store.rpush("l", v).await.unwrap();
        }
        assert_eq!(
            store.lrange("l", 0, -1).await.unwrap(),
            vec!["a", "b", "c", "d"]
        );
        assert_eq!(store.lrange("l", -2, -1).await.unwrap(), vec!["c", "d"]);
        assert!(store.lrange("l", 5, 9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ltrim_caps_list() {
        let store = MemoryStore::new();
        for v in ["a", "b", "c", "d", "e"] {
            store.rpush("l", v).await.unwrap();
        }
        store.ltrim("l", -3, -1).await.unwrap();
        assert_eq!(store.lrange("l", 0, -1).await.unwrap(), vec!["c", "d", "e"]);
    }
}
