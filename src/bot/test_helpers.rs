//! Shared test helpers for creating ImageBot instances with test doubles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::bot::ImageBot;
use crate::client::ImageGenerator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::request::GenerationRequest;
use crate::settings::{NoOpSink, SettingsStore};
use crate::transport::{ChatTransport, ImageReply};
use crate::types::{
    Artifact, ChatId, ChatKind, ChatRef, GenerationId, MessageId, RequestContext, UserId,
};

/// Group chat id on the test allow-list
pub(crate) const ALLOWED_GROUP: ChatId = ChatId(-1000);

/// Passcode configured for the test bot
pub(crate) const TEST_PASSCODE: &str = "sesame";

/// Scripted outcome for one [`FakeGenerator`] call
pub(crate) enum FakeOutcome {
    /// Succeed with these image bytes after the given delay
    Ok { bytes: Vec<u8>, delay_ms: u64 },
    /// Fail with HTTP 429
    RateLimited,
    /// Fail with a generic upstream error
    Upstream { status: u16, message: String },
}

/// [`ImageGenerator`] double: records every request and plays back a script
/// of outcomes; an exhausted script succeeds instantly with fixed bytes.
#[derive(Default)]
pub(crate) struct FakeGenerator {
    pub(crate) calls: Mutex<Vec<GenerationRequest>>,
    script: Mutex<VecDeque<FakeOutcome>>,
}

impl FakeGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, outcome: FakeOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn call(&self, index: usize) -> GenerationRequest {
        self.calls.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Artifact> {
        self.calls.lock().unwrap().push(request.clone());
        let outcome = self.script.lock().unwrap().pop_front();

        match outcome {
            None => Ok(Artifact::new(b"png bytes".to_vec(), request.clone())),
            Some(FakeOutcome::Ok { bytes, delay_ms }) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Artifact::new(bytes, request.clone()))
            }
            Some(FakeOutcome::RateLimited) => Err(Error::RateLimited),
            Some(FakeOutcome::Upstream { status, message }) => Err(Error::Upstream {
                status: Some(status),
                message,
            }),
        }
    }
}

/// One image delivery recorded by [`RecordingTransport`]
#[derive(Clone, Debug)]
pub(crate) struct RecordedImage {
    pub(crate) chat: ChatId,
    pub(crate) bytes: Vec<u8>,
    pub(crate) caption: String,
    pub(crate) artifact_id: GenerationId,
}

/// [`ChatTransport`] double recording every outbound operation
#[derive(Default)]
pub(crate) struct RecordingTransport {
    next_message_id: AtomicI64,
    pub(crate) progress_posts: Mutex<Vec<(ChatId, MessageId, String)>>,
    pub(crate) progress_edits: Mutex<Vec<(MessageId, String)>>,
    pub(crate) progress_deletes: Mutex<Vec<MessageId>>,
    pub(crate) images: Mutex<Vec<RecordedImage>>,
    pub(crate) texts: Mutex<Vec<(ChatId, String, bool)>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn image_count(&self) -> usize {
        self.images.lock().unwrap().len()
    }

    pub(crate) fn image(&self, index: usize) -> RecordedImage {
        self.images.lock().unwrap()[index].clone()
    }

    pub(crate) fn text_messages(&self) -> Vec<(ChatId, String, bool)> {
        self.texts.lock().unwrap().clone()
    }

    /// Edits recorded for one progress message, in order
    pub(crate) fn edits_for(&self, message: MessageId) -> Vec<String> {
        self.progress_edits
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == message)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub(crate) fn deleted(&self, message: MessageId) -> bool {
        self.progress_deletes.lock().unwrap().contains(&message)
    }
}

#[async_trait::async_trait]
impl ChatTransport for RecordingTransport {
    async fn post_progress(&self, chat: ChatId, text: &str) -> Result<MessageId> {
        let id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.progress_posts
            .lock()
            .unwrap()
            .push((chat, id, text.to_string()));
        Ok(id)
    }

    async fn edit_progress(&self, _chat: ChatId, message: MessageId, text: &str) -> Result<()> {
        self.progress_edits
            .lock()
            .unwrap()
            .push((message, text.to_string()));
        Ok(())
    }

    async fn delete_progress(&self, _chat: ChatId, message: MessageId) -> Result<()> {
        self.progress_deletes.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_image(&self, chat: ChatId, reply: ImageReply<'_>) -> Result<()> {
        self.images.lock().unwrap().push(RecordedImage {
            chat,
            bytes: reply.image.to_vec(),
            caption: reply.caption.to_string(),
            artifact_id: reply.artifact_id,
        });
        Ok(())
    }

    async fn send_text(&self, chat: ChatId, text: &str, offer_retry: bool) -> Result<()> {
        self.texts
            .lock()
            .unwrap()
            .push((chat, text.to_string(), offer_retry));
        Ok(())
    }
}

/// Build a bot wired to a fake generator and a recording transport
pub(crate) fn create_test_bot() -> (ImageBot, Arc<FakeGenerator>, Arc<RecordingTransport>) {
    let mut config = Config::default();
    config.api.token = "test-token".to_string();
    config.access.passcode = Some(TEST_PASSCODE.to_string());
    config.access.group_allowlist = vec![ALLOWED_GROUP];

    create_test_bot_with_config(config)
}

/// Same as [`create_test_bot`] but over a caller-tuned configuration
pub(crate) fn create_test_bot_with_config(
    config: Config,
) -> (ImageBot, Arc<FakeGenerator>, Arc<RecordingTransport>) {
    let generator = Arc::new(FakeGenerator::new());
    let transport = Arc::new(RecordingTransport::new());
    let settings = SettingsStore::new(Arc::new(NoOpSink));

    let generator_seam: Arc<dyn ImageGenerator> = generator.clone();
    let transport_seam: Arc<dyn ChatTransport> = transport.clone();
    let bot = ImageBot::with_components(config, settings, generator_seam, transport_seam);
    (bot, generator, transport)
}

/// Request context for a private chat with the given user
pub(crate) fn private_ctx(user: i64) -> RequestContext {
    RequestContext {
        user: UserId(user),
        chat: ChatRef {
            id: ChatId(user),
            kind: ChatKind::Private,
        },
        reply_to: Some(MessageId(900 + user)),
    }
}

/// Request context for a message in the allow-listed group
pub(crate) fn group_ctx(user: i64) -> RequestContext {
    RequestContext {
        user: UserId(user),
        chat: ChatRef {
            id: ALLOWED_GROUP,
            kind: ChatKind::Group,
        },
        reply_to: None,
    }
}
