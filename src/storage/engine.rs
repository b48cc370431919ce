//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the keyspace: the single source of truth mapping
//! keys to [`Entry`] values, shared by every protocol front-end.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are spread over 64 shards.
//! 2. **Lazy Expiry**: Every read checks the entry it found and drops it if expired.
//! 3. **One lock per command**: A command touching one key (including a
//!    multi-field HSET or HDEL) does all its work under that key's shard lock,
//!    so readers never observe a half-applied write.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multi-key operations visit each key's shard independently and provide no
//! cross-key atomicity.

use crate::storage::glob::glob_match;
use crate::storage::value::{Entry, HashFields, Value};
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// Per-entry bookkeeping overhead assumed by [`StorageEngine::memory_usage`].
const ENTRY_OVERHEAD: usize = 64;

type ShardMap = HashMap<Bytes, Entry>;

/// Errors raised by typed storage operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The key holds a value of a different kind than the operation needs
    #[error("operation against a key holding the wrong kind of value")]
    WrongType,

    /// The stored scalar is not a base-10 signed 64-bit integer
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// Integer arithmetic left the i64 range
    #[error("increment or decrement would overflow")]
    Overflow,
}

/// Precondition for [`StorageEngine::set_if`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    /// Write unconditionally
    #[default]
    Always,
    /// Write only if the key does not hold a live value (NX)
    IfAbsent,
    /// Write only if the key holds a live value (XX)
    IfPresent,
}

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<ShardMap>,
}

impl Shard {
    // Poisoning is ignored. A panic mid-way through a multi-field HSET or HDEL
    // can leave only some fields applied, but every entry stays well-formed.
    fn read(&self) -> RwLockReadGuard<'_, ShardMap> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShardMap> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The keyspace.
///
/// Designed to be wrapped in an `Arc` and shared across all connection
/// handlers. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use polykv::storage::StorageEngine;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("polykv"));
/// assert!(engine.exists(b"name"));
///
/// engine.hset(
///     Bytes::from("user:1"),
///     vec![(Bytes::from("name"), Bytes::from("Ada"))],
/// );
/// assert_eq!(engine.hkeys(b"user:1"), Ok(vec![Bytes::from("name")]));
///
/// engine.set_with_ttl(Bytes::from("session"), Bytes::from("abc123"), Duration::from_secs(60));
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,

    /// Number of stored entries, including expired ones not yet reclaimed
    key_count: AtomicU64,

    read_count: AtomicU64,
    write_count: AtomicU64,
    del_count: AtomicU64,

    /// Entries reclaimed by lazy or active expiry
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            key_count: AtomicU64::new(0),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Removes `key` from a locked shard if it is expired at `now`.
    fn remove_if_expired(&self, data: &mut ShardMap, key: &[u8], now: Instant) -> bool {
        if data.get(key).is_some_and(|e| e.is_expired_at(now)) {
            data.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Returns the live entry for `key` in a write-locked shard.
    fn live_entry_mut<'a>(
        &self,
        data: &'a mut ShardMap,
        key: &[u8],
        now: Instant,
    ) -> Option<&'a mut Entry> {
        self.remove_if_expired(data, key, now);
        data.get_mut(key)
    }

    /// Inserts an entry into a write-locked shard, keeping the key count.
    fn insert_entry(&self, data: &mut ShardMap, key: Bytes, entry: Entry) {
        if data.insert(key, entry).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Applies `f` to the live entry for `key`.
    ///
    /// Takes the read lock first; if the entry turns out to be expired the
    /// write lock is taken to remove it (lazy expiry). The entry is re-checked
    /// under the write lock since another writer may have replaced it.
    fn read_live<R>(&self, key: &[u8], f: impl FnOnce(&Entry) -> R) -> Option<R> {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        let shard = self.shard(key);

        {
            let data = shard.read();
            match data.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(Instant::now()) => return Some(f(entry)),
                Some(_) => {}
            }
        }

        let mut data = shard.write();
        if self.remove_if_expired(&mut data, key, Instant::now()) {
            return None;
        }
        data.get(key).map(f)
    }

    /// Applies `f` to the fields of a live hash.
    fn read_hash<R>(
        &self,
        key: &[u8],
        f: impl FnOnce(&HashFields) -> R,
    ) -> Result<Option<R>, StorageError> {
        self.read_live(key, |entry| match &entry.value {
            Value::Hash(fields) => Ok(f(fields)),
            Value::Scalar(_) => Err(StorageError::WrongType),
        })
        .transpose()
    }

    // ========================================================================
    // Generic key operations
    // ========================================================================

    /// Stores `entry` under `key` if `condition` allows it.
    ///
    /// Any previous value and TTL are replaced, whatever their kind.
    /// Returns whether the write happened.
    pub fn set_if(&self, key: Bytes, entry: Entry, condition: SetCondition) -> bool {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.shard(&key).write();
        let present = self.live_entry_mut(&mut data, &key, Instant::now()).is_some();

        let allowed = match condition {
            SetCondition::Always => true,
            SetCondition::IfAbsent => !present,
            SetCondition::IfPresent => present,
        };
        if allowed {
            self.insert_entry(&mut data, key, entry);
        }
        allowed
    }

    /// Stores `entry` under `key` unconditionally.
    pub fn set_entry(&self, key: Bytes, entry: Entry) {
        self.set_if(key, entry, SetCondition::Always);
    }

    /// Sets a scalar value without expiry, clearing any previous TTL.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.set_entry(key, Entry::new(Value::Scalar(value)));
    }

    /// Sets a scalar value that expires after `ttl`.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) {
        self.set_entry(key, Entry::with_ttl(Value::Scalar(value), ttl));
    }

    /// Returns a copy of the live value for `key`.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.read_live(key, |entry| entry.value.clone())
    }

    /// Returns the live scalar stored at `key`.
    pub fn get_scalar(&self, key: &[u8]) -> Result<Option<Bytes>, StorageError> {
        self.read_live(key, |entry| match &entry.value {
            Value::Scalar(b) => Ok(b.clone()),
            Value::Hash(_) => Err(StorageError::WrongType),
        })
        .transpose()
    }

    /// Removes `key` whether or not it has expired.
    ///
    /// Returns whether an entry was physically removed.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.remove(key).is_some()
    }

    /// Removes `key` and reports whether it was live.
    ///
    /// An expired entry is still removed, but counts as already gone.
    pub fn delete_live(&self, key: &[u8]) -> bool {
        match self.remove(key) {
            Some(entry) if entry.is_expired() => {
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn remove(&self, key: &[u8]) -> Option<Entry> {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let removed = self.shard(key).write().remove(key);
        if removed.is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Deletes each key in turn, returning how many live keys were removed.
    pub fn delete_many<K: AsRef<[u8]>>(&self, keys: &[K]) -> u64 {
        keys.iter().filter(|k| self.delete_live(k.as_ref())).count() as u64
    }

    /// Checks if a key exists (and is not expired).
    pub fn exists(&self, key: &[u8]) -> bool {
        self.read_live(key, |_| ()).is_some()
    }

    /// Counts how many of the given keys exist.
    ///
    /// Each key is checked on its own at the moment it is visited, and a key
    /// listed twice is counted twice.
    pub fn exists_many<K: AsRef<[u8]>>(&self, keys: &[K]) -> u64 {
        keys.iter().filter(|k| self.exists(k.as_ref())).count() as u64
    }

    /// Returns "string", "hash" or "none".
    pub fn key_type(&self, key: &[u8]) -> &'static str {
        self.read_live(key, |entry| entry.value.type_name())
            .unwrap_or("none")
    }

    // ========================================================================
    // Expiry
    // ========================================================================

    /// Sets the time to live of a live key. A zero `ttl` deletes the key.
    ///
    /// Returns `false` if the key doesn't exist.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> bool {
        let mut data = self.shard(key).write();
        let now = Instant::now();

        let Some(entry) = self.live_entry_mut(&mut data, key, now) else {
            return false;
        };
        if ttl.is_zero() {
            data.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            self.del_count.fetch_add(1, Ordering::Relaxed);
        } else {
            entry.expires_at = now.checked_add(ttl);
        }
        true
    }

    /// Removes the expiry from a key.
    ///
    /// Returns `true` only if the key existed and had a TTL.
    pub fn persist(&self, key: &[u8]) -> bool {
        let mut data = self.shard(key).write();
        match self.live_entry_mut(&mut data, key, Instant::now()) {
            Some(entry) => entry.expires_at.take().is_some(),
            None => false,
        }
    }

    /// Remaining TTL: `None` if absent, `Some(None)` if it never expires.
    pub fn remaining_ttl(&self, key: &[u8]) -> Option<Option<Duration>> {
        self.read_live(key, |entry| entry.remaining(Instant::now()))
    }

    /// Remaining TTL in seconds (rounded), -1 without expiry, -2 if absent.
    pub fn ttl(&self, key: &[u8]) -> i64 {
        match self.remaining_ttl(key) {
            Some(Some(left)) => ((left.as_millis() + 500) / 1000) as i64,
            Some(None) => -1,
            None => -2,
        }
    }

    /// Remaining TTL in milliseconds, -1 without expiry, -2 if absent.
    pub fn pttl(&self, key: &[u8]) -> i64 {
        match self.remaining_ttl(key) {
            Some(Some(left)) => left.as_millis() as i64,
            Some(None) => -1,
            None => -2,
        }
    }

    // ========================================================================
    // Scalar arithmetic
    // ========================================================================

    /// Adds `delta` to the integer stored at `key` (absent counts as 0).
    ///
    /// The key's TTL is kept.
    pub fn incr_by(&self, key: &[u8], delta: i64) -> Result<i64, StorageError> {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.shard(key).write();
        let now = Instant::now();

        let (current, expires_at) = match self.live_entry_mut(&mut data, key, now) {
            Some(entry) => {
                let Value::Scalar(raw) = &entry.value else {
                    return Err(StorageError::WrongType);
                };
                let n = std::str::from_utf8(raw)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or(StorageError::NotAnInteger)?;
                (n, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current.checked_add(delta).ok_or(StorageError::Overflow)?;
        let entry = Entry {
            value: Value::Scalar(Bytes::from(next.to_string())),
            expires_at,
        };
        self.insert_entry(&mut data, Bytes::copy_from_slice(key), entry);

        Ok(next)
    }

    // ========================================================================
    // Hash operations
    // ========================================================================

    /// Sets fields of the hash at `key`.
    ///
    /// An absent key or a key holding a scalar becomes a fresh hash (the
    /// scalar and its TTL are discarded); an existing hash is merged into and
    /// keeps its TTL. All pairs are applied under one lock.
    ///
    /// Returns the number of fields that did not exist before.
    pub fn hset(&self, key: Bytes, pairs: Vec<(Bytes, Bytes)>) -> u64 {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.shard(&key).write();

        if let Some(Entry {
            value: Value::Hash(fields),
            ..
        }) = self.live_entry_mut(&mut data, &key, Instant::now())
        {
            return pairs
                .into_iter()
                .filter(|(field, value)| fields.insert(field.clone(), value.clone()).is_none())
                .count() as u64;
        }

        let mut fields = HashFields::with_capacity(pairs.len());
        let mut added = 0;
        for (field, value) in pairs {
            if fields.insert(field, value).is_none() {
                added += 1;
            }
        }
        if !fields.is_empty() {
            self.insert_entry(&mut data, key, Entry::new(Value::Hash(fields)));
        }
        added
    }

    /// Removes fields from the hash at `key`.
    ///
    /// A hash left without fields is removed from the keyspace.
    /// Returns the number of fields removed.
    pub fn hdel<F: AsRef<[u8]>>(&self, key: &[u8], fields: &[F]) -> Result<u64, StorageError> {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.shard(key).write();

        let Some(entry) = self.live_entry_mut(&mut data, key, Instant::now()) else {
            return Ok(0);
        };
        let Value::Hash(map) = &mut entry.value else {
            return Err(StorageError::WrongType);
        };

        let removed = fields
            .iter()
            .filter(|f| map.remove(f.as_ref()).is_some())
            .count() as u64;

        if map.is_empty() {
            data.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Returns the value of one field of the hash at `key`.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>, StorageError> {
        self.read_hash(key, |fields| fields.get(field).cloned())
            .map(Option::flatten)
    }

    /// Returns every field name of the hash at `key`; empty if absent.
    pub fn hkeys(&self, key: &[u8]) -> Result<Vec<Bytes>, StorageError> {
        self.read_hash(key, |fields| fields.keys().cloned().collect())
            .map(Option::unwrap_or_default)
    }

    /// Returns every value of the hash at `key`; empty if absent.
    pub fn hvals(&self, key: &[u8]) -> Result<Vec<Bytes>, StorageError> {
        self.read_hash(key, |fields| fields.values().cloned().collect())
            .map(Option::unwrap_or_default)
    }

    /// Returns every (field, value) pair of the hash at `key`; empty if absent.
    pub fn hgetall(&self, key: &[u8]) -> Result<Vec<(Bytes, Bytes)>, StorageError> {
        self.read_hash(key, |fields| {
            fields
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect()
        })
        .map(Option::unwrap_or_default)
    }

    /// Number of fields in the hash at `key`; 0 if absent.
    pub fn hlen(&self, key: &[u8]) -> Result<u64, StorageError> {
        self.read_hash(key, |fields| fields.len() as u64)
            .map(Option::unwrap_or_default)
    }

    /// Whether the hash at `key` has `field`.
    pub fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool, StorageError> {
        self.read_hash(key, |fields| fields.contains_key(field))
            .map(Option::unwrap_or_default)
    }

    // ========================================================================
    // Scans and maintenance
    // ========================================================================

    /// Calls `f` with every live key, one shard at a time.
    pub fn for_each_key(&self, mut f: impl FnMut(&Bytes)) {
        for shard in &self.shards {
            let data = shard.read();
            let now = Instant::now();
            data.iter()
                .filter(|(_, entry)| !entry.is_expired_at(now))
                .for_each(|(key, _)| f(key));
        }
    }

    /// Returns all live keys matching a glob pattern.
    ///
    /// **Warning**: This operation scans all keys and can be slow on large databases.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Bytes> {
        let mut result = Vec::new();
        self.for_each_key(|key| {
            if glob_match(pattern, key) {
                result.push(key.clone());
            }
        });
        result
    }

    /// Clears all data from the database.
    pub fn flush(&self) {
        for shard in &self.shards {
            let mut data = shard.write();
            self.key_count
                .fetch_sub(data.len() as u64, Ordering::Relaxed);
            data.clear();
        }
    }

    /// Number of stored entries.
    ///
    /// Expired entries that have not been reclaimed yet are included.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if the database is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns database statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            read_ops: self.read_count.load(Ordering::Relaxed),
            write_ops: self.write_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Approximate memory held by live entries, in bytes.
    pub fn memory_usage(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            let data = shard.read();
            let now = Instant::now();
            total += data
                .iter()
                .filter(|(_, entry)| !entry.is_expired_at(now))
                .map(|(key, entry)| key.len() + entry.value.approximate_size() + ENTRY_OVERHEAD)
                .sum::<usize>();
        }
        total
    }

    /// Number of shards, for callers that sweep shard by shard.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Removes every entry of one shard that is expired at `now`.
    ///
    /// Only that shard's lock is held. Returns the number of entries removed.
    pub fn sweep_shard(&self, index: usize, now: Instant) -> u64 {
        let Some(shard) = self.shards.get(index) else {
            return 0;
        };

        let mut data = shard.write();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired_at(now));
        let removed = (before - data.len()) as u64;

        if removed > 0 {
            self.key_count.fetch_sub(removed, Ordering::Relaxed);
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Sweeps all shards synchronously.
    ///
    /// Returns the number of keys that were cleaned up.
    pub fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        (0..self.shards.len())
            .map(|index| self.sweep_shard(index, now))
            .sum()
    }
}

/// Database statistics.
#[derive(Debug, Clone, Copy)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total read operations
    pub read_ops: u64,
    /// Total write operations
    pub write_ops: u64,
    /// Total delete operations
    pub del_ops: u64,
    /// Total expired keys cleaned up
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn pairs(items: &[(&str, &str)]) -> Vec<(Bytes, Bytes)> {
        items
            .iter()
            .map(|(f, v)| (Bytes::from(f.to_string()), Bytes::from(v.to_string())))
            .collect()
    }

    fn sorted(mut v: Vec<Bytes>) -> Vec<Bytes> {
        v.sort();
        v
    }

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert_eq!(
            engine.get(b"key"),
            Some(Value::Scalar(Bytes::from("value")))
        );
        assert_eq!(engine.get_scalar(b"key"), Ok(Some(Bytes::from("value"))));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get(b"nonexistent"), None);
        assert_eq!(engine.get_scalar(b"nonexistent"), Ok(None));
    }

    #[test]
    fn test_delete() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert!(engine.delete(b"key"));
        assert_eq!(engine.get(b"key"), None);
        assert!(!engine.delete(b"key"));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_delete_expired_entry() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(Bytes::from("a"), Bytes::from("v"), Duration::from_millis(10));
        engine.set_with_ttl(Bytes::from("b"), Bytes::from("v"), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));

        // Physically removed either way, but an expired key was not live
        assert!(engine.delete(b"a"));
        assert!(!engine.delete_live(b"b"));
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn test_exists() {
        let engine = StorageEngine::new();

        assert!(!engine.exists(b"key"));
        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert!(engine.exists(b"key"));
    }

    #[test]
    fn test_exists_many_counts_duplicates() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("a"), Bytes::from("1"));
        engine.set(Bytes::from("b"), Bytes::from("2"));
        engine.set_with_ttl(Bytes::from("c"), Bytes::from("3"), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));

        assert_eq!(engine.exists_many(&["a", "b", "c", "a"]), 3);
    }

    #[test]
    fn test_expiry() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(
            Bytes::from("key"),
            Bytes::from("value"),
            Duration::from_millis(50),
        );

        assert!(engine.exists(b"key"));

        thread::sleep(Duration::from_millis(100));

        assert_eq!(engine.get(b"key"), None);
        // The read removed the entry
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().expired, 1);
    }

    #[test]
    fn test_set_clears_ttl() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(Bytes::from("key"), Bytes::from("v1"), Duration::from_millis(20));
        engine.set(Bytes::from("key"), Bytes::from("v2"));
        thread::sleep(Duration::from_millis(40));

        assert!(engine.exists(b"key"));
        assert_eq!(engine.ttl(b"key"), -1);
    }

    #[test]
    fn test_set_conditions() {
        let engine = StorageEngine::new();
        let entry = |v: &'static str| Entry::new(Value::Scalar(Bytes::from(v)));

        assert!(!engine.set_if(Bytes::from("k"), entry("x"), SetCondition::IfPresent));
        assert!(!engine.exists(b"k"));

        assert!(engine.set_if(Bytes::from("k"), entry("a"), SetCondition::IfAbsent));
        assert!(!engine.set_if(Bytes::from("k"), entry("b"), SetCondition::IfAbsent));
        assert_eq!(engine.get_scalar(b"k"), Ok(Some(Bytes::from("a"))));

        assert!(engine.set_if(Bytes::from("k"), entry("c"), SetCondition::IfPresent));
        assert_eq!(engine.get_scalar(b"k"), Ok(Some(Bytes::from("c"))));
    }

    #[test]
    fn test_set_overwrites_hash() {
        let engine = StorageEngine::new();

        engine.hset(Bytes::from("k"), pairs(&[("f", "v")]));
        engine.set(Bytes::from("k"), Bytes::from("scalar"));

        assert_eq!(engine.key_type(b"k"), "string");
        assert_eq!(engine.hkeys(b"k"), Err(StorageError::WrongType));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_incr() {
        let engine = StorageEngine::new();

        assert_eq!(engine.incr_by(b"counter", 1), Ok(1));
        assert_eq!(engine.incr_by(b"counter", 1), Ok(2));
        assert_eq!(engine.incr_by(b"counter", -5), Ok(-3));

        engine.set(Bytes::from("num"), Bytes::from("10"));
        assert_eq!(engine.incr_by(b"num", 1), Ok(11));

        engine.set(Bytes::from("text"), Bytes::from("hello"));
        assert_eq!(engine.incr_by(b"text", 1), Err(StorageError::NotAnInteger));

        engine.set(Bytes::from("max"), Bytes::from(i64::MAX.to_string()));
        assert_eq!(engine.incr_by(b"max", 1), Err(StorageError::Overflow));

        engine.hset(Bytes::from("h"), pairs(&[("f", "1")]));
        assert_eq!(engine.incr_by(b"h", 1), Err(StorageError::WrongType));
    }

    #[test]
    fn test_incr_keeps_ttl() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(Bytes::from("n"), Bytes::from("1"), Duration::from_secs(100));
        engine.incr_by(b"n", 1).unwrap();
        assert!(engine.pttl(b"n") > 0);
    }

    #[test]
    fn test_ttl() {
        let engine = StorageEngine::new();

        assert_eq!(engine.ttl(b"nonexistent"), -2);

        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert_eq!(engine.ttl(b"key"), -1);

        engine.set_with_ttl(Bytes::from("temp"), Bytes::from("value"), Duration::from_secs(100));
        let ttl = engine.ttl(b"temp");
        assert!(ttl > 98 && ttl <= 100);
        assert!(engine.pttl(b"temp") > 98_000);
    }

    #[test]
    fn test_expire_and_persist() {
        let engine = StorageEngine::new();

        assert!(!engine.expire(b"missing", Duration::from_secs(1)));

        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert!(!engine.persist(b"key"));
        assert!(engine.expire(b"key", Duration::from_secs(100)));
        assert!(engine.ttl(b"key") > 0);
        assert!(engine.persist(b"key"));
        assert_eq!(engine.ttl(b"key"), -1);

        assert!(engine.expire(b"key", Duration::ZERO));
        assert!(!engine.exists(b"key"));
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn test_hset_counts_new_fields() {
        let engine = StorageEngine::new();

        assert_eq!(engine.hset(Bytes::from("h"), pairs(&[("f", "v")])), 1);
        assert_eq!(engine.hkeys(b"h"), Ok(vec![Bytes::from("f")]));

        assert_eq!(engine.hset(Bytes::from("h"), pairs(&[("f", "v2")])), 0);
        assert_eq!(engine.hkeys(b"h"), Ok(vec![Bytes::from("f")]));
        assert_eq!(engine.hget(b"h", b"f"), Ok(Some(Bytes::from("v2"))));

        assert_eq!(
            engine.hset(Bytes::from("h"), pairs(&[("f", "v3"), ("g", "1"), ("h", "2")])),
            2
        );
        assert_eq!(engine.hlen(b"h"), Ok(3));
    }

    #[test]
    fn test_hset_duplicate_field_in_one_call() {
        let engine = StorageEngine::new();

        assert_eq!(engine.hset(Bytes::from("h"), pairs(&[("f", "1"), ("f", "2")])), 1);
        assert_eq!(engine.hget(b"h", b"f"), Ok(Some(Bytes::from("2"))));
    }

    #[test]
    fn test_hset_replaces_scalar() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(Bytes::from("k"), Bytes::from("v"), Duration::from_secs(100));
        assert_eq!(engine.hset(Bytes::from("k"), pairs(&[("f", "v")])), 1);

        assert_eq!(engine.key_type(b"k"), "hash");
        assert_eq!(engine.ttl(b"k"), -1);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_hset_keeps_hash_ttl() {
        let engine = StorageEngine::new();

        engine.hset(Bytes::from("h"), pairs(&[("a", "1")]));
        engine.expire(b"h", Duration::from_secs(100));
        engine.hset(Bytes::from("h"), pairs(&[("b", "2")]));

        assert!(engine.ttl(b"h") > 0);
    }

    #[test]
    fn test_hdel_removes_empty_hash() {
        let engine = StorageEngine::new();

        engine.hset(Bytes::from("h"), pairs(&[("a", "1"), ("b", "2")]));

        assert_eq!(engine.hdel(b"h", &["a", "missing"]), Ok(1));
        assert!(engine.exists(b"h"));

        assert_eq!(engine.hdel(b"h", &["b"]), Ok(1));
        assert!(!engine.exists(b"h"));
        assert_eq!(engine.hkeys(b"h"), Ok(vec![]));
        assert_eq!(engine.len(), 0);

        assert_eq!(engine.hdel(b"h", &["b"]), Ok(0));
    }

    #[test]
    fn test_hash_reads_on_scalar_are_type_errors() {
        let engine = StorageEngine::new();
        engine.set(Bytes::from("s"), Bytes::from("v"));

        assert_eq!(engine.hkeys(b"s"), Err(StorageError::WrongType));
        assert_eq!(engine.hvals(b"s"), Err(StorageError::WrongType));
        assert_eq!(engine.hget(b"s", b"f"), Err(StorageError::WrongType));
        assert_eq!(engine.hlen(b"s"), Err(StorageError::WrongType));
        assert_eq!(engine.hdel(b"s", &["f"]), Err(StorageError::WrongType));
        assert_eq!(engine.get_scalar(b"s"), Ok(Some(Bytes::from("v"))));
    }

    #[test]
    fn test_hash_reads_on_absent_key() {
        let engine = StorageEngine::new();

        assert_eq!(engine.hkeys(b"none"), Ok(vec![]));
        assert_eq!(engine.hvals(b"none"), Ok(vec![]));
        assert_eq!(engine.hgetall(b"none"), Ok(vec![]));
        assert_eq!(engine.hget(b"none", b"f"), Ok(None));
        assert_eq!(engine.hlen(b"none"), Ok(0));
        assert_eq!(engine.hexists(b"none", b"f"), Ok(false));
    }

    #[test]
    fn test_hgetall_and_hvals() {
        let engine = StorageEngine::new();
        engine.hset(Bytes::from("h"), pairs(&[("a", "1"), ("b", "2")]));

        let mut all = engine.hgetall(b"h").unwrap();
        all.sort();
        assert_eq!(all, pairs(&[("a", "1"), ("b", "2")]));
        assert_eq!(
            sorted(engine.hvals(b"h").unwrap()),
            vec![Bytes::from("1"), Bytes::from("2")]
        );
        assert_eq!(engine.hexists(b"h", b"a"), Ok(true));
        assert_eq!(engine.hexists(b"h", b"z"), Ok(false));
    }

    #[test]
    fn test_keys_pattern() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("user:1"), Bytes::from("a"));
        engine.set(Bytes::from("user:2"), Bytes::from("b"));
        engine.hset(Bytes::from("user:3"), pairs(&[("f", "v")]));
        engine.set(Bytes::from("session:1"), Bytes::from("c"));

        assert_eq!(engine.keys(b"user:*").len(), 3);
        assert_eq!(engine.keys(b"*").len(), 4);
        assert_eq!(engine.keys(b"session:?"), vec![Bytes::from("session:1")]);
    }

    #[test]
    fn test_flush() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key1"), Bytes::from("value1"));
        engine.hset(Bytes::from("key2"), pairs(&[("f", "v")]));
        assert_eq!(engine.len(), 2);

        engine.flush();

        assert_eq!(engine.len(), 0);
        assert!(!engine.exists(b"key1"));
    }

    #[test]
    fn test_cleanup_expired() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(
            Bytes::from("key1"),
            Bytes::from("value1"),
            Duration::from_millis(10),
        );
        engine.set_with_ttl(
            Bytes::from("key2"),
            Bytes::from("value2"),
            Duration::from_millis(10),
        );
        engine.set(Bytes::from("key3"), Bytes::from("value3"));

        thread::sleep(Duration::from_millis(50));

        assert_eq!(engine.cleanup_expired(), 2);
        assert_eq!(engine.len(), 1);
        assert!(engine.exists(b"key3"));
    }

    #[test]
    fn test_lazy_and_active_expiry_commute() {
        let engine = StorageEngine::new();

        engine.set_with_ttl(Bytes::from("a"), Bytes::from("v"), Duration::from_millis(10));
        engine.set_with_ttl(Bytes::from("b"), Bytes::from("v"), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));

        // Lazy first, then sweep
        assert!(!engine.exists(b"a"));
        assert_eq!(engine.cleanup_expired(), 1);

        // Sweep already done, lazy finds nothing
        assert!(!engine.exists(b"b"));
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().expired, 2);
    }

    #[test]
    fn test_for_each_key_skips_expired() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("live"), Bytes::from("v"));
        engine.set_with_ttl(Bytes::from("dead"), Bytes::from("v"), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));

        let mut seen = Vec::new();
        engine.for_each_key(|k| seen.push(k.clone()));
        assert_eq!(seen, vec![Bytes::from("live")]);
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    engine.set(Bytes::from(key.clone()), Bytes::from("value"));
                    engine.get(key.as_bytes());
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
    }

    #[test]
    fn test_concurrent_hset_same_key() {
        let engine = Arc::new(StorageEngine::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    (0..50)
                        .map(|i| {
                            let field = Bytes::from(format!("f-{}-{}", t, i));
                            engine.hset(Bytes::from("shared"), vec![(field, Bytes::from("v"))])
                        })
                        .sum::<u64>()
                })
            })
            .collect();

        let added: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // Every field is distinct, so every insert counted exactly once
        assert_eq!(added, 400);
        assert_eq!(engine.hlen(b"shared"), Ok(400));
        assert_eq!(engine.len(), 1);
    }
}
