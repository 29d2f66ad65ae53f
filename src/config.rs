//! Configuration types for imagegen-bot

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::request;
use crate::types::{ChatId, Model};

/// Upstream image-generation API configuration
///
/// Groups the endpoint and credential for the external generation service.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Endpoint receiving one POST per generation task
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer credential sent with every request
    #[serde(default)]
    pub token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: String::new(),
        }
    }
}

/// Enrollment and chat access configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Passcode unlocking full (private-chat) access; None disables
    /// passcode enrollment entirely
    #[serde(default)]
    pub passcode: Option<String>,

    /// Group chats whose members are auto-enrolled with the group-origin flag
    #[serde(default)]
    pub group_allowlist: Vec<ChatId>,
}

/// Deployment policy configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Reject requests that would bill paid tiers upstream
    /// (steps >= 29 or more than 1048576 pixels)
    #[serde(default)]
    pub free_tier_only: bool,
}

/// Request validation budgets
///
/// The two pixel budgets are distinct policies applied at different entry
/// points: size presets are checked against the larger budget, advanced
/// JSON-shaped requests against the restricted one. Deployments with
/// different upstream plans tune these instead of forking code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Pixel budget for advanced (JSON-shaped) requests
    #[serde(default = "default_advanced_pixel_budget")]
    pub advanced_pixel_budget: u32,

    /// Pixel budget for the simple size presets
    #[serde(default = "default_preset_pixel_budget")]
    pub preset_pixel_budget: u32,

    /// Maximum accepted step count
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Maximum accepted guidance scale
    #[serde(default = "default_max_scale")]
    pub max_scale: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            advanced_pixel_budget: default_advanced_pixel_budget(),
            preset_pixel_budget: default_preset_pixel_budget(),
            max_steps: default_max_steps(),
            max_scale: default_max_scale(),
        }
    }
}

/// Hardcoded-default layer of the request merge
///
/// These fill any field that neither the user's stored settings nor the
/// per-request overrides supply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationDefaults {
    /// Default model
    #[serde(default)]
    pub model: Model,

    /// Models users may select
    #[serde(default = "default_models")]
    pub models: Vec<Model>,

    /// Default negative prompt
    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,

    /// Default quality tags appended to every prompt
    #[serde(default = "default_quality_tags")]
    pub quality_tags: String,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            model: Model::default(),
            models: default_models(),
            negative_prompt: default_negative_prompt(),
            quality_tags: default_quality_tags(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the settings file; rewritten in full after every mutation
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
        }
    }
}

/// Main configuration for [`ImageBot`](crate::ImageBot)
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) — upstream endpoint and credential
/// - [`access`](AccessConfig) — enrollment passcode and group allow-list
/// - [`policy`](PolicyConfig) — deployment policy flags
/// - [`limits`](LimitsConfig) — validation budgets
/// - [`defaults`](GenerationDefaults) — hardcoded request defaults
/// - [`persistence`](PersistenceConfig) — settings file location
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream generation API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Enrollment and chat access settings
    #[serde(default)]
    pub access: AccessConfig,

    /// Deployment policy flags
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Validation budgets
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Hardcoded request defaults
    #[serde(default)]
    pub defaults: GenerationDefaults,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Validate the configuration before the bot starts
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the endpoint is not a valid URL, the
    /// credential is empty, or the budgets are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.api.endpoint).is_err() {
            return Err(Error::Config {
                message: format!("'{}' is not a valid URL", self.api.endpoint),
                key: Some("api.endpoint".to_string()),
            });
        }
        if self.api.token.is_empty() {
            return Err(Error::Config {
                message: "upstream API token must not be empty".to_string(),
                key: Some("api.token".to_string()),
            });
        }
        if self.limits.max_steps == 0 {
            return Err(Error::Config {
                message: "max_steps must be at least 1".to_string(),
                key: Some("limits.max_steps".to_string()),
            });
        }
        if self.defaults.models.is_empty() {
            return Err(Error::Config {
                message: "at least one model must be allowed".to_string(),
                key: Some("defaults.models".to_string()),
            });
        }
        if !self.defaults.models.contains(&self.defaults.model) {
            return Err(Error::Config {
                message: format!(
                    "default model {} is not in the allowed model list",
                    self.defaults.model
                ),
                key: Some("defaults.model".to_string()),
            });
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "https://image.novelai.net/ai/generate-image".to_string()
}

fn default_advanced_pixel_budget() -> u32 {
    983_040
}

fn default_preset_pixel_budget() -> u32 {
    1_048_576
}

fn default_max_steps() -> u32 {
    50
}

fn default_max_scale() -> u32 {
    50
}

fn default_models() -> Vec<Model> {
    Model::ALL.to_vec()
}

fn default_negative_prompt() -> String {
    request::DEFAULT_NEGATIVE_PROMPT.to_string()
}

fn default_quality_tags() -> String {
    request::DEFAULT_QUALITY_TAGS.to_string()
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("./config/user_settings.json")
}
