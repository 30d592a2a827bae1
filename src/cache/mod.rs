//! Typed read-through cache over a [`KeyValueStore`].
//!
//! The cache is opportunistic: a storage failure or an unreadable entry is
//! logged and treated as a miss, never as a failed lookup.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::api::ApiError;
use crate::storage::{KeyValueStore, StoredEntry};

pub mod keys {
    pub const USER_NAMES: &str = "user-names";
    pub const SESSION_TOKEN: &str = "session:token";
    pub const SESSION_USER: &str = "session:user";
    pub const SESSION_PREFIX: &str = "session:";

    pub fn comments(article_id: &str) -> String {
        format!("comments:{article_id}")
    }

    pub fn replies(comment_id: &str) -> String {
        format!("replies:{comment_id}")
    }

    pub fn schedule(league: &str) -> String {
        format!("schedule:{league}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    NoExpiry,
    Ttl(Duration),
}

impl CachePolicy {
    fn is_fresh(&self, entry: &StoredEntry, now: OffsetDateTime) -> bool {
        match self {
            CachePolicy::NoExpiry => true,
            CachePolicy::Ttl(ttl) => {
                let age = now.unix_timestamp().saturating_sub(entry.written_at);
                age < ttl.whole_seconds()
            }
        }
    }
}

#[derive(Clone)]
pub struct CacheShim {
    store: Arc<dyn KeyValueStore>,
}

impl CacheShim {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str, policy: CachePolicy) -> Option<T> {
        self.read_at(key, policy, OffsetDateTime::now_utc())
    }

    pub fn read_at<T: DeserializeOwned>(
        &self,
        key: &str,
        policy: CachePolicy,
        now: OffsetDateTime,
    ) -> Option<T> {
        let entry = match self.store.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };
        if !policy.is_fresh(&entry, now) {
            tracing::debug!(%key, written_at = entry.written_at, "cache entry expired");
            return None;
        }
        match serde_json::from_str(&entry.value) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%key, error = %err, "unreadable cache entry, treating as miss");
                None
            }
        }
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.put(key, &raw)
    }

    pub fn invalidate(&self, key: &str) -> Result<bool> {
        let removed = self.store.remove(key)?;
        if removed {
            tracing::debug!(%key, "cache entry invalidated");
        }
        Ok(removed)
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let removed = self.store.remove_prefix(prefix)?;
        tracing::debug!(%prefix, removed, "cache entries invalidated");
        Ok(removed)
    }

    /// Returns a fresh cached value without calling `fetch`; otherwise fetches,
    /// stores the result and returns it. Fetch failures are not cached.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        policy: CachePolicy,
        fetch: F,
    ) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Some(hit) = self.read(key, policy) {
            tracing::debug!(%key, "cache hit");
            return Ok(hit);
        }
        tracing::debug!(%key, "cache miss");
        let value = fetch().await?;
        if let Err(err) = self.write(key, &value) {
            tracing::warn!(%key, error = %err, "failed to write cache entry");
        }
        Ok(value)
    }
}
