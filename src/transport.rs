//! Chat transport seam.
//!
//! The bot core never talks to a chat network directly; it drives this trait.
//! Implementations adapt a concrete chat framework (message ids, inline
//! keyboards, photo uploads) while the core stays transport-agnostic and
//! testable with a recording double.

use crate::error::Result;
use crate::types::{ChatId, GenerationId, MessageId};

/// Inline actions a transport should attach to an image reply
///
/// Transports map these to whatever affordance their platform has (inline
/// keyboard buttons, slash-command hints, plain text).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyAction {
    /// Re-run the user's latest parameters with a fresh seed
    Repeat,
    /// Send the resolved prompt of the referenced artifact
    FetchPrompt,
    /// Send the original image bytes of the referenced artifact
    FetchOriginal,
    /// Re-run with 10 fewer steps
    DecreaseSteps,
}

/// The image reply emitted after a successful generation
#[derive(Clone, Copy, Debug)]
pub struct ImageReply<'a> {
    /// Raw PNG bytes
    pub image: &'a [u8],
    /// Caption summarizing the resolved parameters
    pub caption: &'a str,
    /// Cache id of the artifact, for the fetch actions
    pub artifact_id: GenerationId,
    /// Actions to offer alongside the image
    pub actions: &'a [ReplyAction],
    /// Message this reply answers, if the platform supports threading
    pub reply_to: Option<MessageId>,
}

/// Outbound chat operations the orchestrator needs
///
/// Progress-message edits and deletions are best-effort on the caller's side:
/// the orchestrator logs failures of those and continues.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post the progress indicator; returns its message id for later edits
    async fn post_progress(&self, chat: ChatId, text: &str) -> Result<MessageId>;

    /// Update the progress indicator text
    async fn edit_progress(&self, chat: ChatId, message: MessageId, text: &str) -> Result<()>;

    /// Remove the progress indicator
    async fn delete_progress(&self, chat: ChatId, message: MessageId) -> Result<()>;

    /// Deliver the generated image
    async fn send_image(&self, chat: ChatId, reply: ImageReply<'_>) -> Result<()>;

    /// Deliver a plain-text message (status, confirmations, errors); when
    /// `offer_retry` is set the transport should attach a retry action
    async fn send_text(&self, chat: ChatId, text: &str, offer_retry: bool) -> Result<()>;
}

/// [`ChatTransport`] that drops everything (headless operation, tests)
pub struct NoOpTransport;

#[async_trait::async_trait]
impl ChatTransport for NoOpTransport {
    async fn post_progress(&self, _chat: ChatId, _text: &str) -> Result<MessageId> {
        Ok(MessageId(0))
    }

    async fn edit_progress(
        &self,
        _chat: ChatId,
        _message: MessageId,
        _text: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn delete_progress(&self, _chat: ChatId, _message: MessageId) -> Result<()> {
        Ok(())
    }

    async fn send_image(&self, _chat: ChatId, _reply: ImageReply<'_>) -> Result<()> {
        Ok(())
    }

    async fn send_text(&self, _chat: ChatId, _text: &str, _offer_retry: bool) -> Result<()> {
        Ok(())
    }
}
