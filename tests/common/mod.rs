//! Shared helpers for the end-to-end tests.

use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use imagegen_bot::{
    ChatId, ChatTransport, GenerationId, ImageReply, MessageId, Result,
};

/// Build an in-memory zip archive containing the given entries
pub fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(*name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A response archive shaped like the upstream's: one image entry plus noise
pub fn upstream_archive(image_bytes: &[u8]) -> Vec<u8> {
    zip_with(&[("image_0.png", image_bytes), ("metadata.json", b"{}")])
}

/// One image delivery recorded by [`RecordingTransport`]
#[derive(Clone, Debug)]
pub struct RecordedImage {
    pub bytes: Vec<u8>,
    pub caption: String,
    pub artifact_id: GenerationId,
}

/// Minimal recording [`ChatTransport`] for integration tests
#[derive(Default)]
pub struct RecordingTransport {
    next_message_id: AtomicI64,
    pub images: Mutex<Vec<RecordedImage>>,
    pub texts: Mutex<Vec<(String, bool)>>,
    pub deletes: Mutex<Vec<MessageId>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChatTransport for RecordingTransport {
    async fn post_progress(&self, _chat: ChatId, _text: &str) -> Result<MessageId> {
        Ok(MessageId(
            self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
        ))
    }

    async fn edit_progress(&self, _chat: ChatId, _message: MessageId, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_progress(&self, _chat: ChatId, message: MessageId) -> Result<()> {
        self.deletes.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_image(&self, _chat: ChatId, reply: ImageReply<'_>) -> Result<()> {
        self.images.lock().unwrap().push(RecordedImage {
            bytes: reply.image.to_vec(),
            caption: reply.caption.to_string(),
            artifact_id: reply.artifact_id,
        });
        Ok(())
    }

    async fn send_text(&self, _chat: ChatId, text: &str, offer_retry: bool) -> Result<()> {
        self.texts
            .lock()
            .unwrap()
            .push((text.to_string(), offer_retry));
        Ok(())
    }
}
