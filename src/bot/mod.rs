//! Core bot implementation split into focused submodules.
//!
//! The `ImageBot` struct and its methods are organized by domain:
//! - [`access`] - Enrollment and chat access checks
//! - [`settings_ops`] - Per-user settings operations
//! - [`generate`] - Generation entry points and request orchestration
//! - [`artifacts`] - Cached artifact retrieval and status queries
//! - [`messages`] - User-facing text rendering

mod access;
mod artifacts;
mod generate;
pub mod messages;
mod settings_ops;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use access::{AccessDecision, EnrollOutcome};

use std::collections::HashMap;
use std::sync::Arc;

use crate::artifact_cache::ArtifactCache;
use crate::client::{GenerationClient, ImageGenerator};
use crate::config::Config;
use crate::error::Result;
use crate::queue::TaskQueue;
use crate::request::OverrideParams;
use crate::settings::{JsonFileSink, SettingsStore};
use crate::transport::ChatTransport;
use crate::types::{Artifact, Event, UserId};

/// Buffer size of the bot event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main bot instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the settings store, the artifact cache, the serializing task queue,
/// and the injected collaborators (upstream generator, chat transport).
#[derive(Clone)]
pub struct ImageBot {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Per-user settings with write-through persistence
    pub(crate) settings: Arc<SettingsStore>,
    /// Bounded most-recent-wins artifact cache
    pub(crate) artifacts: Arc<tokio::sync::Mutex<ArtifactCache>>,
    /// Single-concurrency FIFO queue serializing upstream calls
    pub(crate) queue: Arc<TaskQueue<Arc<Artifact>>>,
    /// Upstream image API (trait object for pluggable implementations)
    pub(crate) generator: Arc<dyn ImageGenerator>,
    /// Chat side (trait object for pluggable implementations)
    pub(crate) transport: Arc<dyn ChatTransport>,
    /// Each user's latest resolved generation parameters (memory only),
    /// supporting the repeat and edit-and-regenerate flows
    pub(crate) latest_params: Arc<tokio::sync::Mutex<HashMap<UserId, OverrideParams>>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl ImageBot {
    /// Create a new ImageBot instance
    ///
    /// This validates the configuration, loads previously persisted user
    /// settings, builds the production HTTP client, and spawns the queue
    /// worker. Must be called from within a tokio runtime.
    pub async fn new(config: Config, transport: Arc<dyn ChatTransport>) -> Result<Self> {
        config.validate()?;

        let sink = Arc::new(JsonFileSink::new(&config.persistence.settings_path));
        let settings = SettingsStore::load(&config.persistence.settings_path, sink).await?;
        let generator = Arc::new(GenerationClient::new(&config.api)?);

        Ok(Self::with_components(
            config,
            settings,
            generator,
            transport,
        ))
    }

    /// Assemble a bot from explicit components
    ///
    /// This is the injection seam for embedders and tests: any
    /// [`ImageGenerator`] and [`ChatTransport`] implementation can be wired
    /// in, and the settings store may use any [`SettingsSink`](crate::SettingsSink).
    /// Must be called from within a tokio runtime (the queue worker is
    /// spawned here).
    pub fn with_components(
        config: Config,
        settings: SettingsStore,
        generator: Arc<dyn ImageGenerator>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config: Arc::new(config),
            settings: Arc::new(settings),
            artifacts: Arc::new(tokio::sync::Mutex::new(ArtifactCache::new())),
            queue: Arc::new(TaskQueue::new()),
            generator,
            transport,
            latest_params: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            event_tx,
        }
    }

    /// Subscribe to bot events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all
    /// events independently; a subscriber falling behind by more than the
    /// channel capacity observes a `Lagged` error.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current count of generation tasks not yet completed (pending + running)
    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// generation proceeds whether or not anyone is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    /// Gracefully shut down the bot
    ///
    /// Persists the user settings one final time and emits a shutdown event.
    /// Tasks already admitted to the queue drain to completion on the worker;
    /// no new work should be submitted after this call.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("initiating graceful shutdown");

        if let Err(e) = self.settings.persist_now().await {
            tracing::error!(error = %e, "failed to persist settings during shutdown");
            // continue shutting down regardless
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("graceful shutdown complete");
        Ok(())
    }
}
