//! Bounded, insertion-ordered cache of generated artifacts.
//!
//! Most-recent-wins: once the cache is full, inserting a new id evicts the
//! single oldest-inserted entry (FIFO by insertion, not by access). Ids are
//! caller-generated random 32-bit integers and fully opaque here; a colliding
//! insert silently overwrites without disturbing the entry's position.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::types::{Artifact, GenerationId};

/// Default capacity bound
pub const DEFAULT_CAPACITY: usize = 500;

/// Insertion-ordered id → artifact map with FIFO eviction
pub struct ArtifactCache {
    entries: IndexMap<GenerationId, Arc<Artifact>>,
    capacity: usize,
}

impl ArtifactCache {
    /// Create a cache bounded at [`DEFAULT_CAPACITY`] entries
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a cache with an explicit capacity bound
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// Insert an artifact, evicting the oldest entry if the bound would be
    /// exceeded; a colliding id overwrites in place
    pub fn put(&mut self, id: GenerationId, artifact: Arc<Artifact>) {
        if !self.entries.contains_key(&id) && self.entries.len() >= self.capacity {
            // shift_remove keeps the remaining insertion order intact
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                tracing::debug!(artifact = %evicted, "evicted oldest cached artifact");
            }
        }
        self.entries.insert(id, artifact);
    }

    /// Fetch an artifact by id
    pub fn get(&self, id: GenerationId) -> Option<Arc<Artifact>> {
        self.entries.get(&id).cloned()
    }

    /// Current number of cached artifacts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{GenerationRequest, OverrideParams, RequestBuilder};
    use crate::config::Config;
    use crate::types::UserSettings;

    fn request() -> GenerationRequest {
        let config = Config::default();
        RequestBuilder::new(&config.defaults, &config.limits, &config.policy)
            .build(
                &UserSettings::default(),
                &OverrideParams {
                    prompt: Some("a cat".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    fn artifact(tag: u8) -> Arc<Artifact> {
        Arc::new(Artifact::new(vec![tag; 4], request()))
    }

    #[test]
    fn get_returns_inserted_artifact() {
        let mut cache = ArtifactCache::new();
        let id = GenerationId(7);
        cache.put(id, artifact(1));

        assert_eq!(cache.get(id).unwrap().image, vec![1; 4]);
        assert!(cache.get(GenerationId(8)).is_none());
    }

    #[test]
    fn exceeding_capacity_evicts_oldest_inserted() {
        let mut cache = ArtifactCache::with_capacity(500);
        for i in 0..500u32 {
            cache.put(GenerationId(i), artifact(0));
        }
        assert_eq!(cache.len(), 500);

        // the 501st distinct id pushes out the earliest insert only
        cache.put(GenerationId(500), artifact(0));
        assert_eq!(cache.len(), 500);
        assert!(cache.get(GenerationId(0)).is_none());
        assert!(cache.get(GenerationId(1)).is_some());
        assert!(cache.get(GenerationId(500)).is_some());
    }

    #[test]
    fn eviction_is_fifo_not_lru() {
        let mut cache = ArtifactCache::with_capacity(2);
        cache.put(GenerationId(1), artifact(1));
        cache.put(GenerationId(2), artifact(2));

        // touching the oldest entry must not protect it
        assert!(cache.get(GenerationId(1)).is_some());
        cache.put(GenerationId(3), artifact(3));

        assert!(cache.get(GenerationId(1)).is_none());
        assert!(cache.get(GenerationId(2)).is_some());
        assert!(cache.get(GenerationId(3)).is_some());
    }

    #[test]
    fn colliding_put_overwrites_without_eviction() {
        let mut cache = ArtifactCache::with_capacity(2);
        cache.put(GenerationId(1), artifact(1));
        cache.put(GenerationId(2), artifact(2));

        cache.put(GenerationId(1), artifact(9));
        assert_eq!(cache.len(), 2, "overwrite must not evict");
        assert_eq!(cache.get(GenerationId(1)).unwrap().image, vec![9; 4]);
        assert!(cache.get(GenerationId(2)).is_some());
    }
}
