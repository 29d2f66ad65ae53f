//! # imagegen-bot
//!
//! Backend library for AI image-generation chat bots.
//!
//! ## Design Philosophy
//!
//! imagegen-bot is designed to be:
//! - **Transport-agnostic** - The chat side (message parsing, keyboards,
//!   command routing) is an injected [`ChatTransport`], not a framework choice
//! - **Strictly serialized** - Upstream generation calls run one at a time in
//!   admission order, respecting the API's burst-hostile rate limit
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use imagegen_bot::{Config, ImageBot, NoOpTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         api: imagegen_bot::ApiConfig {
//!             token: "upstream-api-token".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let bot = ImageBot::new(config, Arc::new(NoOpTransport)).await?;
//!
//!     // Subscribe to events
//!     let mut events = bot.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Bounded artifact cache
pub mod artifact_cache;
/// Core bot implementation (decomposed into focused submodules)
pub mod bot;
/// Upstream generation API client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Task queue serializing upstream calls
pub mod queue;
/// Request construction and validation
pub mod request;
/// Per-user settings store
pub mod settings;
/// Chat transport seam
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use artifact_cache::ArtifactCache;
pub use bot::{AccessDecision, EnrollOutcome, ImageBot, messages};
pub use client::{GenerationClient, ImageGenerator};
pub use config::{
    AccessConfig, ApiConfig, Config, GenerationDefaults, LimitsConfig, PersistenceConfig,
    PolicyConfig,
};
pub use error::{DecodeError, Error, Result, ValidationError};
pub use queue::{TaskHandle, TaskQueue, TaskSettled};
pub use request::{GenerationRequest, OverrideParams, RequestBuilder};
pub use settings::{JsonFileSink, NoOpSink, SettingsSink, SettingsStore};
pub use transport::{ChatTransport, ImageReply, NoOpTransport, ReplyAction};
pub use types::{
    Artifact, ChatId, ChatKind, ChatRef, Event, GenerationId, MessageId, Model, RequestContext,
    Sampler, SettingsPatch, StatusReport, UserId, UserSettings,
};

/// Helper function to run the bot with graceful signal handling.
///
/// Waits for a termination signal and then calls the bot's `shutdown()`
/// method, which persists user settings one final time.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(bot: ImageBot) -> Result<()> {
    wait_for_signal().await;
    bot.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration can fail in restricted environments (containers,
    // tests); degrade to whatever handler still registers
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(_), Err(_)) => {
            tracing::error!("could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
