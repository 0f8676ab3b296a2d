//! Per-talent expiring cache, layered over the backing store's meta values.
//!
//! Every collector stores its normalized data under a source-scoped key as a
//! [`CachedValue`] envelope. Reads distinguish three states — fresh, stale,
//! and missing — so callers can serve stale data immediately while deciding
//! whether a refresh is warranted. Writes are last-write-wins: concurrent
//! refreshes of the same key are idempotent overwrites.

use crate::model::TalentId;
use crate::store::Store;
use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::IntoAppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "     cache";

/// A cached value together with its absolute expiry timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue<T> {
    pub data: T,
    pub expiration: DateTime<Utc>,
}

/// Result of reading a cache slot.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState<T> {
    /// A value exists and its expiry is still in the future.
    Fresh(T),

    /// A value exists but has expired; usable as a last-known answer while a
    /// refresh is pending.
    Stale(T),

    /// Never fetched (or the stored envelope was unreadable).
    Missing,
}

impl<T> CacheState<T> {
    /// Returns `true` for the fresh variant.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    /// The last known value, fresh or stale.
    #[must_use]
    pub fn into_latest(self) -> Option<T> {
        match self {
            Self::Fresh(data) | Self::Stale(data) => Some(data),
            Self::Missing => None,
        }
    }
}

impl<T: Default> CacheState<T> {
    /// The last known value, or the zero/empty sentinel when never fetched.
    #[must_use]
    pub fn latest_or_default(self) -> T {
        self.into_latest().unwrap_or_default()
    }
}

/// Typed cache facade over a [`Store`]'s meta mechanism.
#[derive(Debug, Clone)]
pub struct TalentCache {
    store: Arc<dyn Store>,
}

impl TalentCache {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The store this cache writes through to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Read a cache slot, classifying freshness against the current time.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, id: TalentId, key: &str) -> CacheState<T> {
        self.get_at(id, key, Utc::now())
    }

    /// Read a cache slot, classifying freshness against an explicit clock.
    #[must_use]
    pub fn get_at<T: DeserializeOwned>(&self, id: TalentId, key: &str, now: DateTime<Utc>) -> CacheState<T> {
        let Some(raw) = self.store.get_meta(id, key) else {
            return CacheState::Missing;
        };

        let envelope: CachedValue<T> = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Unreadable envelopes count as never-fetched; the next
                // refresh overwrites them.
                log::debug!(target: LOG_TARGET, "Discarding unreadable cache entry '{key}' for talent {id}: {e:#}");
                return CacheState::Missing;
            }
        };

        if envelope.expiration > now {
            CacheState::Fresh(envelope.data)
        } else {
            log::debug!(target: LOG_TARGET, "Cache expired for '{key}' on talent {id}");
            CacheState::Stale(envelope.data)
        }
    }

    /// Write a cache slot with the given TTL from now.
    pub fn put<T: Serialize>(&self, id: TalentId, key: &str, data: &T, ttl: Duration) -> Result<()> {
        self.put_at(id, key, data, ttl, Utc::now())
    }

    /// Write a cache slot with the given TTL from an explicit clock.
    pub fn put_at<T: Serialize>(&self, id: TalentId, key: &str, data: &T, ttl: Duration, now: DateTime<Utc>) -> Result<()> {
        let expiration = now + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        let envelope = serde_json::to_value(CachedValue { data, expiration })
            .into_app_err_with(|| format!("unable to serialize cache entry '{key}'"))?;
        self.store.put_meta(id, key, envelope)
    }
}
