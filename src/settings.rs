//! Per-user settings store with a write-through persistence hook.
//!
//! The in-memory map is the source of truth for the process lifetime; every
//! mutation is followed by a best-effort full-snapshot persist through the
//! injected [`SettingsSink`]. A failed persist is logged and never rolls back
//! the in-memory change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::{SettingsPatch, UserId, UserSettings};

/// Persistence hook receiving the full settings snapshot after every mutation
///
/// Trait object so deployments can swap the file format or destination, and
/// tests can drop persistence entirely.
#[async_trait::async_trait]
pub trait SettingsSink: Send + Sync {
    /// Persist a full snapshot of all user settings
    async fn persist(&self, snapshot: &HashMap<UserId, UserSettings>) -> Result<()>;

    /// Human-readable sink name for logging
    fn name(&self) -> &str;
}

/// Production [`SettingsSink`] rewriting one JSON file in full on every
/// mutation; keys are user ids rendered as strings
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Create a sink writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl SettingsSink for JsonFileSink {
    async fn persist(&self, snapshot: &HashMap<UserId, UserSettings>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

/// [`SettingsSink`] that discards every snapshot (tests, ephemeral bots)
pub struct NoOpSink;

#[async_trait::async_trait]
impl SettingsSink for NoOpSink {
    async fn persist(&self, _snapshot: &HashMap<UserId, UserSettings>) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "no-op"
    }
}

/// In-memory user-id → settings map with write-through persistence
pub struct SettingsStore {
    users: RwLock<HashMap<UserId, UserSettings>>,
    sink: Arc<dyn SettingsSink>,
}

impl SettingsStore {
    /// Create an empty store over the given sink
    pub fn new(sink: Arc<dyn SettingsSink>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sink,
        }
    }

    /// Load the store from a previously persisted JSON file
    ///
    /// A missing file yields an empty store; a corrupt file is an error so a
    /// misconfigured deployment does not silently wipe everyone's settings.
    pub async fn load(path: &Path, sink: Arc<dyn SettingsSink>) -> Result<Self> {
        let users = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            path = %path.display(),
            users = users.len(),
            sink = sink.name(),
            "settings store loaded"
        );
        Ok(Self {
            users: RwLock::new(users),
            sink,
        })
    }

    /// Fetch a copy of one user's settings
    pub async fn get(&self, user: UserId) -> Option<UserSettings> {
        self.users.read().await.get(&user).cloned()
    }

    /// Whether the user has a settings record (i.e. is enrolled)
    pub async fn exists(&self, user: UserId) -> bool {
        self.users.read().await.contains_key(&user)
    }

    /// Shallow-merge a patch into the user's record, creating the record if
    /// absent, then persist
    pub async fn set(&self, user: UserId, patch: &SettingsPatch) {
        {
            let mut users = self.users.write().await;
            users.entry(user).or_default().apply(patch);
        }
        self.persist_after_mutation().await;
    }

    /// Delete a user's record entirely, then persist; returns whether a
    /// record existed
    pub async fn delete(&self, user: UserId) -> bool {
        let removed = self.users.write().await.remove(&user).is_some();
        if removed {
            self.persist_after_mutation().await;
        }
        removed
    }

    /// Create an empty record for the user if none exists; returns true when
    /// a record was created
    pub async fn create_if_absent(&self, user: UserId) -> bool {
        let created = {
            let mut users = self.users.write().await;
            if users.contains_key(&user) {
                false
            } else {
                users.insert(user, UserSettings::default());
                true
            }
        };
        if created {
            self.persist_after_mutation().await;
        }
        created
    }

    /// Set or clear the group-origin flag, creating the record if absent
    pub async fn set_group_origin(&self, user: UserId, from_group: bool) {
        {
            let mut users = self.users.write().await;
            users.entry(user).or_default().from_group = from_group;
        }
        self.persist_after_mutation().await;
    }

    /// Copy of the full map (status queries, shutdown persistence, tests)
    pub async fn snapshot(&self) -> HashMap<UserId, UserSettings> {
        self.users.read().await.clone()
    }

    /// Explicitly persist the current snapshot, surfacing the error
    pub async fn persist_now(&self) -> Result<()> {
        let snapshot = self.snapshot().await;
        self.sink.persist(&snapshot).await
    }

    /// Write-through after a mutation; failure is logged, the in-memory
    /// state stays authoritative
    async fn persist_after_mutation(&self) {
        if let Err(e) = self.persist_now().await {
            tracing::warn!(
                sink = self.sink.name(),
                error = %e,
                "failed to persist user settings; in-memory state unchanged"
            );
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// Sink that always fails, for verifying persist errors are non-fatal
    struct FailingSink;

    #[async_trait::async_trait]
    impl SettingsSink for FailingSink {
        async fn persist(&self, _snapshot: &HashMap<UserId, UserSettings>) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk on fire")))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn store() -> SettingsStore {
        SettingsStore::new(Arc::new(NoOpSink))
    }

    #[tokio::test]
    async fn set_shallow_merges_fields() {
        let store = store();
        let user = UserId(1);

        store
            .set(
                user,
                &SettingsPatch {
                    width: Some(832),
                    height: Some(1216),
                    ..Default::default()
                },
            )
            .await;
        store
            .set(
                user,
                &SettingsPatch {
                    steps: Some(28),
                    ..Default::default()
                },
            )
            .await;

        let settings = store.get(user).await.unwrap();
        assert_eq!(settings.width, Some(832), "earlier fields survive later patches");
        assert_eq!(settings.height, Some(1216));
        assert_eq!(settings.steps, Some(28));
    }

    #[tokio::test]
    async fn dyn_implies_smea_after_any_toggle_sequence() {
        let store = store();
        let user = UserId(2);

        // enable dyn together with sm (the way the toggle operation does)
        store
            .set(
                user,
                &SettingsPatch {
                    sm: Some(true),
                    sm_dyn: Some(true),
                    ..Default::default()
                },
            )
            .await;
        let s = store.get(user).await.unwrap();
        assert_eq!((s.sm, s.sm_dyn), (Some(true), Some(true)));

        // disabling sm must force dyn off
        store
            .set(
                user,
                &SettingsPatch {
                    sm: Some(false),
                    sm_dyn: Some(false),
                    ..Default::default()
                },
            )
            .await;
        let s = store.get(user).await.unwrap();
        assert_eq!((s.sm, s.sm_dyn), (Some(false), Some(false)));

        // a patch claiming dyn without sm cannot break the invariant
        store
            .set(
                user,
                &SettingsPatch {
                    sm_dyn: Some(true),
                    ..Default::default()
                },
            )
            .await;
        let s = store.get(user).await.unwrap();
        assert!(
            !s.sm_dyn.unwrap_or(false) || s.sm.unwrap_or(false),
            "sm_dyn set while sm is disabled"
        );
    }

    #[tokio::test]
    async fn delete_and_exists() {
        let store = store();
        let user = UserId(3);

        assert!(!store.exists(user).await);
        store.create_if_absent(user).await;
        assert!(store.exists(user).await);
        assert!(store.delete(user).await);
        assert!(!store.exists(user).await);
        assert!(!store.delete(user).await, "second delete is a no-op");
    }

    #[tokio::test]
    async fn persist_failure_keeps_in_memory_mutation() {
        let store = SettingsStore::new(Arc::new(FailingSink));
        let user = UserId(4);

        store
            .set(
                user,
                &SettingsPatch {
                    steps: Some(28),
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(
            store.get(user).await.unwrap().steps,
            Some(28),
            "in-memory state must survive a failed persist"
        );
    }

    #[tokio::test]
    async fn json_file_sink_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("user_settings.json");
        let sink = Arc::new(JsonFileSink::new(&path));

        let store = SettingsStore::new(sink.clone());
        let user = UserId(42);
        store
            .set(
                user,
                &SettingsPatch {
                    width: Some(1024),
                    negative_prompt: Some("blurry".to_string()),
                    ..Default::default()
                },
            )
            .await;
        store.set_group_origin(user, true).await;

        // keys are user ids as strings in one flat JSON object
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(raw.get("42").is_some());
        assert_eq!(raw["42"]["uc"], "blurry");

        let reloaded = SettingsStore::load(&path, sink).await.unwrap();
        let settings = reloaded.get(user).await.unwrap();
        assert_eq!(settings.width, Some(1024));
        assert!(settings.from_group);
    }

    #[tokio::test]
    async fn load_missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let store = SettingsStore::load(&path, Arc::new(NoOpSink)).await.unwrap();
        assert!(store.snapshot().await.is_empty());
    }
}
