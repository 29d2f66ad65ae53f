//! Core types for imagegen-bot

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::request::GenerationRequest;

/// Unique identifier for a chat user
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Create a new UserId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Unique identifier for a chat (private conversation or group)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message inside a chat, as assigned by the transport
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub i64);

/// What kind of chat a request came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-on-one conversation with the bot
    Private,
    /// Group or supergroup chat
    Group,
}

/// A chat reference: id plus kind, enough for access checks and replies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    /// Chat identifier
    pub id: ChatId,
    /// Private or group
    pub kind: ChatKind,
}

/// Per-request context handed to the generation entry points
#[derive(Clone, Copy, Debug)]
pub struct RequestContext {
    /// The requesting user
    pub user: UserId,
    /// Where progress and replies go
    pub chat: ChatRef,
    /// Message to attach the image reply to, if the transport supports it
    pub reply_to: Option<MessageId>,
}

/// Opaque identifier for a cached artifact
///
/// Minted by the orchestrator as a uniformly random 32-bit integer. Collisions
/// are not de-duplicated — a colliding insert overwrites the older artifact.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GenerationId(pub u32);

impl GenerationId {
    /// Draw a fresh random artifact id
    pub fn random() -> Self {
        Self(rand::thread_rng().r#gen())
    }
}

impl std::fmt::Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GenerationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Diffusion sampler choice passed to the upstream API
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sampler {
    /// Euler Ancestral
    #[serde(rename = "k_euler_ancestral")]
    KEulerAncestral,
    /// Euler
    #[serde(rename = "k_euler")]
    KEuler,
    /// DPM++ 2S Ancestral
    #[default]
    #[serde(rename = "k_dpmpp_2s_ancestral")]
    KDpmpp2sAncestral,
    /// DPM++ SDE
    #[serde(rename = "k_dpmpp_sde")]
    KDpmppSde,
}

impl Sampler {
    /// Wire name of the sampler, as the upstream API expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Sampler::KEulerAncestral => "k_euler_ancestral",
            Sampler::KEuler => "k_euler",
            Sampler::KDpmpp2sAncestral => "k_dpmpp_2s_ancestral",
            Sampler::KDpmppSde => "k_dpmpp_sde",
        }
    }
}

impl std::fmt::Display for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream model identifier
///
/// The fourth-generation models use a structured caption block in the request
/// schema instead of the flat prompt/negative-prompt strings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    /// nai-diffusion-4-curated-preview
    #[default]
    #[serde(rename = "nai-diffusion-4-curated-preview")]
    Nai4CuratedPreview,
    /// nai-diffusion-4-full
    #[serde(rename = "nai-diffusion-4-full")]
    Nai4Full,
    /// nai-diffusion-v3
    #[serde(rename = "nai-diffusion-v3")]
    NaiV3,
    /// nai-diffusion-furry-3
    #[serde(rename = "nai-diffusion-furry-3")]
    NaiFurry3,
}

impl Model {
    /// All models this library knows how to talk to
    pub const ALL: [Model; 4] = [
        Model::Nai4CuratedPreview,
        Model::Nai4Full,
        Model::NaiV3,
        Model::NaiFurry3,
    ];

    /// Wire id of the model, as the upstream API expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Nai4CuratedPreview => "nai-diffusion-4-curated-preview",
            Model::Nai4Full => "nai-diffusion-4-full",
            Model::NaiV3 => "nai-diffusion-v3",
            Model::NaiFurry3 => "nai-diffusion-furry-3",
        }
    }

    /// Look a model up by its wire id
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == id)
    }

    /// Whether this model family takes the structured caption block
    /// (v4 prompt schema) instead of flat prompt strings
    pub fn uses_structured_captions(&self) -> bool {
        self.as_str().starts_with("nai-diffusion-4")
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user persisted generation settings
///
/// Every field except the group-origin flag is optional: an absent field falls
/// through to the hardcoded default at request-build time. Absent and
/// explicitly-false are distinct for the boolean flags, so the record is
/// merged field by field, never wholesale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Image width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Image height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Sampler choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<Sampler>,
    /// Guidance scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Denoising step count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    /// Model id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
    /// Negative prompt (attributes to suppress)
    #[serde(default, rename = "uc", skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Quality tags appended to every prompt
    #[serde(default, rename = "qt", skip_serializing_if = "Option::is_none")]
    pub quality_tags: Option<String>,
    /// SMEA sampler augmentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm: Option<bool>,
    /// Dynamic SMEA; requires `sm` to be enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm_dyn: Option<bool>,
    /// Set when the user was auto-enrolled through a group allow-list; such
    /// users cannot use private chat until they enroll with the passcode
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub from_group: bool,
}

/// A shallow patch over [`UserSettings`]
///
/// Only the generation settings are patchable; the group-origin flag is
/// managed exclusively by the enrollment operations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    /// Image width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Image height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Sampler choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<Sampler>,
    /// Guidance scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Denoising step count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    /// Model id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
    /// Negative prompt
    #[serde(default, rename = "uc", skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Quality tags
    #[serde(default, rename = "qt", skip_serializing_if = "Option::is_none")]
    pub quality_tags: Option<String>,
    /// SMEA flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm: Option<bool>,
    /// Dynamic SMEA flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm_dyn: Option<bool>,
}

impl UserSettings {
    /// Apply a shallow patch: present patch fields overwrite, absent fields
    /// are left alone. Afterwards the SMEA coupling is re-normalized — dynamic
    /// mode can only stay on while base SMEA is on.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.width {
            self.width = Some(v);
        }
        if let Some(v) = patch.height {
            self.height = Some(v);
        }
        if let Some(v) = patch.sampler {
            self.sampler = Some(v);
        }
        if let Some(v) = patch.scale {
            self.scale = Some(v);
        }
        if let Some(v) = patch.steps {
            self.steps = Some(v);
        }
        if let Some(v) = patch.model {
            self.model = Some(v);
        }
        if let Some(ref v) = patch.negative_prompt {
            self.negative_prompt = Some(v.clone());
        }
        if let Some(ref v) = patch.quality_tags {
            self.quality_tags = Some(v.clone());
        }
        if let Some(v) = patch.sm {
            self.sm = Some(v);
        }
        if let Some(v) = patch.sm_dyn {
            self.sm_dyn = Some(v);
        }

        // dynamic SMEA requires base SMEA
        if self.sm_dyn.unwrap_or(false) && !self.sm.unwrap_or(false) {
            self.sm_dyn = Some(false);
        }
    }
}

/// A generated image together with the resolved request that produced it
#[derive(Clone, Debug)]
pub struct Artifact {
    /// Raw PNG bytes as extracted from the response archive
    pub image: Vec<u8>,
    /// The fully-resolved request sent upstream
    pub request: GenerationRequest,
    /// When the artifact was produced
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Wrap freshly generated image bytes with their originating request
    pub fn new(image: Vec<u8>, request: GenerationRequest) -> Self {
        Self {
            image,
            request,
            created_at: Utc::now(),
        }
    }
}

/// Event emitted on the bot's broadcast channel
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A generation request was admitted to the queue
    RequestQueued {
        /// Requesting user
        user: UserId,
        /// Number of tasks ahead of this one at admission time
        position: usize,
    },

    /// A generation finished and the artifact was cached
    GenerationCompleted {
        /// Requesting user
        user: UserId,
        /// Cache id of the produced artifact
        artifact: GenerationId,
    },

    /// A generation failed; the user has been shown a rendered error
    GenerationFailed {
        /// Requesting user
        user: UserId,
        /// Rendered (already truncated) error text
        message: String,
    },

    /// A user's stored settings changed
    SettingsUpdated {
        /// The user whose settings changed
        user: UserId,
    },

    /// A user was enrolled (passcode or group allow-list)
    Enrolled {
        /// The enrolled user
        user: UserId,
    },

    /// A user was de-authorized and their settings deleted
    Deauthorized {
        /// The removed user
        user: UserId,
    },

    /// The bot is shutting down
    Shutdown,
}

/// Snapshot returned by the status query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusReport {
    /// Tasks not yet completed (pending + running)
    pub queued_tasks: usize,
    /// The requesting user's stored settings, if enrolled
    pub settings: Option<UserSettings>,
}
