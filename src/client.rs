//! Upstream generation API client.
//!
//! One HTTP POST per task, bearer-token authorized, JSON body. The endpoint
//! answers with a zip archive; the client locates the entry whose name ends
//! with `image_0.png` (case-sensitive) and decompresses exactly that entry
//! into memory — other entries are skipped without being read.
//!
//! No retries happen here and no timeout is imposed on the upstream call;
//! retry policy, if any, belongs to the caller, and the single-concurrency
//! queue already bounds how much work can be in flight.

use std::io::{Cursor, Read};

use crate::config::ApiConfig;
use crate::error::{DecodeError, Error, Result};
use crate::request::GenerationRequest;
use crate::types::Artifact;

/// Archive entry suffix identifying the image payload
const IMAGE_ENTRY_SUFFIX: &str = "image_0.png";

/// Abstraction over the upstream image API, enabling testability
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Run one generation call and return the produced artifact
    async fn generate(&self, request: &GenerationRequest) -> Result<Artifact>;
}

/// Production [`ImageGenerator`] talking HTTP to the configured endpoint
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GenerationClient {
    /// Build a client from the API configuration
    ///
    /// The underlying HTTP client is created without a request timeout:
    /// generations legitimately take minutes and the queue serializes them.
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            endpoint: api.endpoint.clone(),
            token: api.token.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ImageGenerator for GenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Artifact> {
        tracing::debug!(
            model = %request.model,
            seed = request.parameters.seed,
            steps = request.parameters.steps,
            width = request.parameters.width,
            height = request.parameters.height,
            "dispatching generation request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body = response.bytes().await?;
        let image = extract_first_image(&body)?;
        tracing::debug!(image_bytes = image.len(), "generation response decoded");

        Ok(Artifact::new(image, request.clone()))
    }
}

/// Pull the image payload out of an in-memory response archive
///
/// Walks the entries looking for the first name ending in `image_0.png` and
/// decompresses only that one.
pub(crate) fn extract_first_image(archive: &[u8]) -> Result<Vec<u8>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| DecodeError::Archive(e.to_string()))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| DecodeError::Archive(e.to_string()))?;
        if !entry.name().ends_with(IMAGE_ENTRY_SUFFIX) {
            continue;
        }

        let mut image = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut image)
            .map_err(|e| DecodeError::EntryRead {
                name: entry.name().to_string(),
                reason: e.to_string(),
            })?;
        return Ok(image);
    }

    Err(DecodeError::MissingImageEntry {
        expected: IMAGE_ENTRY_SUFFIX,
    }
    .into())
}
