//! Cached artifact retrieval.
//!
//! Artifacts are referenced by the opaque id minted at generation time and
//! carried in reply actions. The cache is bounded and most-recent-wins, so a
//! reference can expire; callers are told to regenerate.

use std::sync::Arc;

use super::ImageBot;
use crate::error::{Error, Result};
use crate::types::{Artifact, GenerationId};

impl ImageBot {
    /// Fetch a cached artifact by id
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExpiredArtifact`] when the id is no longer cached.
    pub async fn artifact(&self, id: GenerationId) -> Result<Arc<Artifact>> {
        self.artifacts
            .lock()
            .await
            .get(id)
            .ok_or(Error::ExpiredArtifact(id))
    }

    /// Fetch the resolved prompt (with quality tags appended) that produced
    /// a cached artifact
    pub async fn artifact_prompt(&self, id: GenerationId) -> Result<String> {
        Ok(self.artifact(id).await?.request.input.clone())
    }
}
