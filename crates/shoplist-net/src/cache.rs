//! In-memory response cache addressed by entity resource name
//!
//! ## Architecture
//!
//! Successful GET responses are split into per-entity fragments keyed by the
//! entity's ERN (`ern:offer:a1`). Later requests are answered from those
//! fragments when every requested entity is present:
//!
//! ```text
//!   GET /v2/offers?offer_ids=a1,b2        GET /v2/offers/a1
//!            │                                   │
//!            ▼                                   ▼
//!   ┌──────────────────┐                ┌──────────────────┐
//!   │ set-shaped lookup │               │ single lookup    │
//!   │ ern:offer:a1 ✓    │               │ ern:offer:a1 ✓   │
//!   │ ern:offer:b2 ✗    │               └──────────────────┘
//!   └──────────────────┘
//!            │ partial hit
//!            ▼
//!         miss (network)
//! ```
//!
//! Expired fragments are evicted lazily when read; there is no sweeper.
//! [`Cache::clear`] swaps the whole map so concurrent readers see either the
//! old or the new generation, never a half-cleared one.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use shoplist_core::domain::Ern;

/// Default lifetime of a cached fragment
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Resource types that support set-shaped lookups, with their id filter parameter
const CACHEABLE_TYPES: &[(&str, &str)] = &[
    ("catalogs", "catalog_ids"),
    ("offers", "offer_ids"),
    ("dealers", "dealer_ids"),
    ("stores", "store_ids"),
];

/// Parameter that limits the page size; harmless when it covers every id
const LIMIT_PARAM: &str = "limit";

fn filter_param(resource_type: &str) -> Option<&'static str> {
    CACHEABLE_TYPES
        .iter()
        .find(|(t, _)| *t == resource_type)
        .map(|(_, p)| *p)
}

/// One cached fragment
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem {
    pub key: String,
    pub payload: serde_json::Value,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl CacheItem {
    /// Fragment inserted now with the default lifetime
    pub fn new(key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            payload,
            inserted_at: Instant::now(),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// An item is expired once `now >= inserted_at + ttl`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.inserted_at.checked_add(self.ttl) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// Thread-safe TTL cache of JSON fragments
#[derive(Debug)]
pub struct Cache {
    items: RwLock<Arc<DashMap<String, CacheItem>>>,
    default_ttl: Duration,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl Cache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            items: RwLock::new(Arc::new(DashMap::new())),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn generation(&self) -> Arc<DashMap<String, CacheItem>> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store or overwrite an item by key
    pub fn put(&self, item: CacheItem) {
        self.generation().insert(item.key.clone(), item);
    }

    pub fn put_all(&self, items: impl IntoIterator<Item = CacheItem>) {
        let map = self.generation();
        for item in items {
            map.insert(item.key.clone(), item);
        }
    }

    /// Return a live item, evicting it if it has expired
    pub fn get(&self, key: &str) -> Option<CacheItem> {
        self.get_at(key, Instant::now())
    }

    /// Same as [`Cache::get`] with an explicit clock
    pub fn get_at(&self, key: &str, now: Instant) -> Option<CacheItem> {
        let map = self.generation();
        if map.remove_if(key, |_, item| item.is_expired_at(now)).is_some() {
            tracing::trace!(key, "Evicted expired cache item");
            return None;
        }
        map.get(key).map(|entry| entry.value().clone())
    }

    /// Resolve a single-entity URL (`…/<type>/<id>`) through the entity's ERN
    pub fn get_entity(&self, url: &str) -> Option<serde_json::Value> {
        let segments = path_segments(url);
        let [.., resource_type, id] = segments.as_slice() else {
            return None;
        };
        filter_param(resource_type)?;
        let ern = Ern::for_resource(resource_type, id.as_str());
        self.get(&ern.to_string()).map(|item| item.payload)
    }

    /// Resolve a set-shaped request (`…/<type>?<type>_ids=a,b,c`).
    ///
    /// Returns the fragments in request order only when every id is cached.
    /// Zero ids, a partial hit, or any parameter that could change the
    /// shape of the result (ordering, paging, filtering) yields `None`.
    pub fn get_list(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
    ) -> Option<Vec<serde_json::Value>> {
        let segments = path_segments(url);
        let resource_type = segments.last()?;
        let filter = filter_param(resource_type)?;

        let ids = split_ids(params.get(filter)?);
        if ids.is_empty() {
            return None;
        }

        for (key, value) in params {
            if key == filter {
                continue;
            }
            if key == LIMIT_PARAM {
                match value.trim().parse::<usize>() {
                    Ok(limit) if limit >= ids.len() => continue,
                    _ => return None,
                }
            }
            tracing::trace!(param = %key, "Parameter bypasses set-shaped cache lookup");
            return None;
        }

        let mut result = Vec::with_capacity(ids.len());
        for id in &ids {
            let ern = Ern::for_resource(resource_type, *id);
            match self.get(&ern.to_string()) {
                Some(item) => result.push(item.payload),
                None => return None,
            }
        }
        Some(result)
    }

    /// Drop every item atomically
    pub fn clear(&self) {
        let mut guard = self.items.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(DashMap::new());
    }

    /// Number of stored items, including not yet evicted expired ones
    pub fn len(&self) -> usize {
        self.generation().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Comma-separated ids in first-seen order, empty segments and duplicates removed
fn split_ids(raw: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .collect()
}

/// Non-empty path segments of an absolute or relative URL, query stripped
fn path_segments(url: &str) -> Vec<String> {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            return segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
