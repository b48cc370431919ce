//! Stored value types.
//!
//! Every key maps to exactly one [`Entry`]: a [`Value`] of some kind plus an
//! optional absolute deadline. The kind of a value only changes when a
//! command explicitly overwrites it (SET, or HSET over a scalar).

use crate::storage::expiry::is_expired;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Field-to-value mapping backing hash values.
pub type HashFields = HashMap<Bytes, Bytes>;

/// The payload of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A single opaque string or number. Numbers are kept as decimal text.
    Scalar(Bytes),

    /// A field -> value mapping. Never empty while stored.
    Hash(HashFields),
}

impl Value {
    /// Name reported by the TYPE command.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "string",
            Value::Hash(_) => "hash",
        }
    }

    /// Rough byte footprint, used by INFO.
    pub(crate) fn approximate_size(&self) -> usize {
        match self {
            Value::Scalar(b) => b.len(),
            Value::Hash(h) => h.iter().map(|(f, v)| f.len() + v.len()).sum(),
        }
    }
}

/// A value together with its expiry deadline.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The stored value
    pub value: Value,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates a new entry that expires `ttl` from now.
    ///
    /// A TTL too large to represent as a deadline never expires.
    pub fn with_ttl(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    /// Checks if this entry has expired at `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        is_expired(self.expires_at, now)
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Remaining time to live, or None if the entry never expires.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(now))
    }
}
