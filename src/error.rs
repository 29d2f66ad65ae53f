//! Error types for imagegen-bot
//!
//! This module provides the error taxonomy for the library:
//! - Request-shape errors ([`ValidationError`]) that the user can correct
//! - Deployment-policy rejections (free-tier caps)
//! - Upstream API failures, with rate limiting kept distinct
//! - Archive decoding failures ([`DecodeError`])
//! - Expired artifact references and access-control rejections

use thiserror::Error;

use crate::types::GenerationId;

/// Result type alias for imagegen-bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for imagegen-bot
///
/// Errors from the request builder and the generation client propagate
/// unmodified up to the orchestrator, which is the single point that renders
/// them as user-facing text. None of the variants trigger automatic retries.
#[derive(Debug, Error)]
pub enum Error {
    /// Request shape or size violates a constraint (user-correctable)
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Request blocked by deployment policy (e.g. free-tier caps)
    #[error("request exceeds the free tier: {reason}")]
    Policy {
        /// Which cap the request ran into
        reason: String,
    },

    /// Upstream returned HTTP 429 — the user is told to wait, no retry
    #[error("upstream API rate limit hit, try again later")]
    RateLimited,

    /// Generic upstream failure (non-2xx status or transport-level trouble)
    #[error("upstream API error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Upstream {
        /// HTTP status code, if a response was received at all
        status: Option<u16>,
        /// Upstream response body or transport error text (may be long;
        /// the orchestrator truncates before showing it to a user)
        message: String,
    },

    /// Response archive could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Artifact id is no longer present in the cache
    #[error("artifact {0} has expired, generate a new image")]
    ExpiredArtifact(GenerationId),

    /// User is not enrolled (or the capability check rejected them)
    #[error("user is not authorized")]
    Unauthorized,

    /// An operation that replays previous parameters was invoked before any
    /// generation happened for that user
    #[error("no previous generation for this user")]
    NoPriorGeneration,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g. "api.endpoint")
        key: Option<String>,
    },

    /// Chat transport failure (posting or updating a message)
    #[error("chat transport error: {0}")]
    Transport(String),

    /// The task queue is shutting down and no longer accepts work
    #[error("queue closed: task was not executed")]
    QueueClosed,

    /// Network error while talking to the upstream endpoint
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Request validation errors, each naming the violated constraint
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Total pixel count exceeds the budget for this entry point
    #[error("image too large: {width}x{height} exceeds the {budget}px budget")]
    PixelBudgetExceeded {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// The pixel budget in effect at this entry point
        budget: u32,
    },

    /// Width or height is not a multiple of 64
    #[error("image dimensions must be multiples of 64, got {width}x{height}")]
    DimensionNotMultipleOf64 {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Steps outside the accepted range
    #[error("steps must lie in [{min}, {max}], got {steps}")]
    StepsOutOfRange {
        /// Requested step count
        steps: u32,
        /// Lower bound (inclusive)
        min: u32,
        /// Upper bound (inclusive)
        max: u32,
    },

    /// Scale outside the accepted range
    #[error("scale must lie in [{min}, {max}], got {scale}")]
    ScaleOutOfRange {
        /// Requested guidance scale
        scale: u32,
        /// Lower bound (inclusive)
        min: u32,
        /// Upper bound (inclusive)
        max: u32,
    },

    /// No prompt was supplied by any settings layer
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// Model id is not in the configured allow-list
    #[error("unknown model: {0}")]
    UnknownModel(String),
}

/// Archive decoding errors (upstream responses are zip archives)
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The response body is not a readable zip archive
    #[error("response is not a readable archive: {0}")]
    Archive(String),

    /// The archive did not contain the expected image entry
    #[error("archive has no entry named *{expected}")]
    MissingImageEntry {
        /// Entry-name suffix that was searched for
        expected: &'static str,
    },

    /// Reading the target entry out of the archive failed
    #[error("failed to read archive entry {name}: {reason}")]
    EntryRead {
        /// Name of the entry that failed to decompress
        name: String,
        /// Underlying failure text
        reason: String,
    },
}
