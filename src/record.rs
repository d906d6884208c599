//! Observed ETags, keyed by URL
//!
//! Filled by the dev-server capture layer and the native watcher. Nothing
//! reads it back to make refresh decisions; it exists for diagnostics.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Shared map from resource URL to the last ETag seen for it
#[derive(Debug, Clone, Default)]
pub struct EtagRecord {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl EtagRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `etag` for `url`, returning the value it replaced
    pub fn record(&self, url: &str, etag: &str) -> Option<String> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(url.to_string(), etag.to_string())
    }

    /// Last ETag seen for `url`
    pub fn get(&self, url: &str) -> Option<String> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(url).cloned()
    }

    /// Sorted copy of every entry
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
