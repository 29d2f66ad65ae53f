//! Request construction — settings merge, validation, and the wire schema.
//!
//! A generation request is assembled from three layers with later layers
//! winning: hardcoded defaults < the user's stored settings < the per-request
//! overrides. The merge is field-by-field over typed optional records, so an
//! explicitly-false boolean is never confused with an absent one.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{GenerationDefaults, LimitsConfig, PolicyConfig};
use crate::error::{Error, Result, ValidationError};
use crate::types::{Model, Sampler, UserSettings};

/// Default image width
pub const DEFAULT_WIDTH: u32 = 832;
/// Default image height
pub const DEFAULT_HEIGHT: u32 = 1216;
/// Default guidance scale
pub const DEFAULT_SCALE: u32 = 5;
/// Default denoising step count
pub const DEFAULT_STEPS: u32 = 28;

/// Default negative prompt
pub const DEFAULT_NEGATIVE_PROMPT: &str = "{bad}, error, fewer, extra, missing, worst quality, jpeg artifacts, bad quality, watermark, unfinished, displeasing, chromatic aberration, signature, extra digits, artistic error, username, scan, [abstract], bad anatomy, bad proportions";

/// Default quality tags, appended to every prompt
pub const DEFAULT_QUALITY_TAGS: &str =
    "best quality, amazing quality, very aesthetic, absurdres";

/// Step count from which the upstream bills paid credits
pub const FREE_STEPS_LIMIT: u32 = 29;
/// Pixel count above which the upstream bills paid credits
pub const FREE_PIXEL_LIMIT: u32 = 1_048_576;

/// Per-request parameter overrides
///
/// This is the top merge layer: any field present here wins over the user's
/// stored settings and the defaults. It is also what gets remembered as the
/// user's latest parameters to support the repeat and edit-and-regenerate
/// flows, so the resolved seed is written back into it before dispatch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideParams {
    /// Prompt text (required by the time a request is built)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Seed; reused on repeat unless a fresh seed is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
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

impl OverrideParams {
    /// Overlay `patch` on top of this record: present patch fields win
    pub fn apply(&mut self, patch: &OverrideParams) {
        if let Some(ref v) = patch.prompt {
            self.prompt = Some(v.clone());
        }
        if let Some(v) = patch.seed {
            self.seed = Some(v);
        }
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
    }
}

/// Fully-resolved request body, serialized verbatim to the upstream API
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Prompt with the quality tags appended (`prompt + "," + tags`)
    pub input: String,
    /// Model id
    pub model: Model,
    /// Requested action; always "generate"
    pub action: String,
    /// Sampling parameters
    pub parameters: Parameters,
}

/// Sampling parameters of a [`GenerationRequest`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Always false; no source image is attached
    pub add_original_image: bool,
    /// CFG rescale factor
    pub cfg_rescale: u32,
    /// ControlNet strength
    pub controlnet_strength: u32,
    /// Dynamic thresholding toggle
    pub dynamic_thresholding: bool,
    /// Image height in pixels
    pub height: u32,
    /// Legacy sampling toggle
    pub legacy: bool,
    /// Legacy v3 prompt-extension toggle
    pub legacy_v3_extend: bool,
    /// Number of images per request; always 1
    pub n_samples: u32,
    /// Flat negative prompt
    pub negative_prompt: String,
    /// Noise schedule name
    pub noise_schedule: String,
    /// Parameter schema version
    pub params_version: u32,
    /// Quality toggle
    #[serde(rename = "qualityToggle")]
    pub quality_toggle: bool,
    /// Sampler choice
    pub sampler: Sampler,
    /// Guidance scale
    pub scale: u32,
    /// Seed controlling the deterministic randomness of the generation
    pub seed: u32,
    /// SMEA sampler augmentation
    pub sm: bool,
    /// Dynamic SMEA
    pub sm_dyn: bool,
    /// Denoising step count
    pub steps: u32,
    /// Negative-prompt preset selector
    #[serde(rename = "ucPreset")]
    pub uc_preset: u32,
    /// Image width in pixels
    pub width: u32,
    /// Structured negative caption, present for the v4 model family only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v4_negative_prompt: Option<V4NegativeBlock>,
    /// Structured prompt caption, present for the v4 model family only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v4_prompt: Option<V4PromptBlock>,
}

/// Structured caption carried by the v4 request schema
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct V4Caption {
    /// Whole-image caption; mirrors the flat prompt string
    pub base_caption: String,
    /// Per-character captions; always empty in this flow
    pub char_captions: Vec<V4CharCaption>,
}

/// A per-character caption entry (unused by this flow, kept for the schema)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct V4CharCaption {
    /// Caption text for one character
    pub char_caption: String,
}

/// v4 negative-prompt block
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct V4NegativeBlock {
    /// Structured caption
    pub caption: V4Caption,
    /// Legacy negative-prompt compatibility toggle
    pub legacy_uc: bool,
}

/// v4 prompt block
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct V4PromptBlock {
    /// Structured caption
    pub caption: V4Caption,
    /// Positional-coordinate toggle
    pub use_coords: bool,
    /// Character-order toggle
    pub use_order: bool,
}

impl GenerationRequest {
    /// Total pixel count of the request
    pub fn pixels(&self) -> u32 {
        self.parameters.width * self.parameters.height
    }

    /// Whether this request would bill paid credits upstream
    pub fn uses_paid_steps(&self) -> bool {
        self.parameters.steps >= FREE_STEPS_LIMIT
    }

    /// Whether this size would bill paid credits upstream
    pub fn uses_paid_size(&self) -> bool {
        self.pixels() > FREE_PIXEL_LIMIT
    }
}

/// Resolve the seed policy for one request
///
/// An explicitly carried seed is reused unless the caller asked for a fresh
/// one; otherwise a uniformly random 32-bit seed is drawn.
pub fn resolve_seed(existing: Option<u32>, fresh_seed: bool) -> u32 {
    match existing {
        Some(seed) if !fresh_seed => seed,
        _ => rand::thread_rng().r#gen(),
    }
}

/// Check that both dimensions are multiples of 64
pub fn check_multiple_of_64(width: u32, height: u32) -> std::result::Result<(), ValidationError> {
    if width % 64 != 0 || height % 64 != 0 {
        return Err(ValidationError::DimensionNotMultipleOf64 { width, height });
    }
    Ok(())
}

/// Check a width/height pair against a pixel budget
pub fn check_pixel_budget(
    width: u32,
    height: u32,
    budget: u32,
) -> std::result::Result<(), ValidationError> {
    if width.saturating_mul(height) > budget {
        return Err(ValidationError::PixelBudgetExceeded {
            width,
            height,
            budget,
        });
    }
    Ok(())
}

/// Merges the three settings layers into one canonical request and validates
/// the result. Pure: no side effects on rejection.
pub struct RequestBuilder<'a> {
    defaults: &'a GenerationDefaults,
    limits: &'a LimitsConfig,
    policy: &'a PolicyConfig,
}

impl<'a> RequestBuilder<'a> {
    /// Create a builder over the configured defaults, limits, and policy
    pub fn new(
        defaults: &'a GenerationDefaults,
        limits: &'a LimitsConfig,
        policy: &'a PolicyConfig,
    ) -> Self {
        Self {
            defaults,
            limits,
            policy,
        }
    }

    /// Build one canonical generation request
    ///
    /// Later layers win per field: `overrides` > `base` > hardcoded defaults.
    /// If `overrides` carries no seed, a fresh one is drawn here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the violated constraint, or
    /// [`Error::Policy`] when the free-tier policy rejects the request.
    pub fn build(
        &self,
        base: &UserSettings,
        overrides: &OverrideParams,
    ) -> Result<GenerationRequest> {
        let prompt = overrides
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(ValidationError::EmptyPrompt)?;

        let width = overrides.width.or(base.width).unwrap_or(DEFAULT_WIDTH);
        let height = overrides.height.or(base.height).unwrap_or(DEFAULT_HEIGHT);
        let sampler = overrides
            .sampler
            .or(base.sampler)
            .unwrap_or_default();
        let scale = overrides.scale.or(base.scale).unwrap_or(DEFAULT_SCALE);
        let steps = overrides.steps.or(base.steps).unwrap_or(DEFAULT_STEPS);
        let sm = overrides.sm.or(base.sm).unwrap_or(false);
        let sm_dyn = overrides.sm_dyn.or(base.sm_dyn).unwrap_or(false);
        let model = overrides.model.or(base.model).unwrap_or(self.defaults.model);
        let negative_prompt = overrides
            .negative_prompt
            .clone()
            .or_else(|| base.negative_prompt.clone())
            .unwrap_or_else(|| self.defaults.negative_prompt.clone());
        let quality_tags = overrides
            .quality_tags
            .clone()
            .or_else(|| base.quality_tags.clone())
            .unwrap_or_else(|| self.defaults.quality_tags.clone());

        check_multiple_of_64(width, height)?;
        if steps < 1 || steps > self.limits.max_steps {
            return Err(ValidationError::StepsOutOfRange {
                steps,
                min: 1,
                max: self.limits.max_steps,
            }
            .into());
        }
        if scale > self.limits.max_scale {
            return Err(ValidationError::ScaleOutOfRange {
                scale,
                min: 0,
                max: self.limits.max_scale,
            }
            .into());
        }
        if !self.defaults.models.contains(&model) {
            return Err(ValidationError::UnknownModel(model.to_string()).into());
        }

        if self.policy.free_tier_only {
            if steps >= FREE_STEPS_LIMIT {
                return Err(Error::Policy {
                    reason: format!("{steps} steps would bill paid credits"),
                });
            }
            if width.saturating_mul(height) > FREE_PIXEL_LIMIT {
                return Err(Error::Policy {
                    reason: format!("{width}x{height} would bill paid credits"),
                });
            }
        }

        let seed = resolve_seed(overrides.seed, false);
        let input = format!("{prompt},{quality_tags}");

        // both caption representations derive from the same merged strings
        let (v4_prompt, v4_negative_prompt) = if model.uses_structured_captions() {
            (
                Some(V4PromptBlock {
                    caption: V4Caption {
                        base_caption: input.clone(),
                        char_captions: Vec::new(),
                    },
                    use_coords: false,
                    use_order: true,
                }),
                Some(V4NegativeBlock {
                    caption: V4Caption {
                        base_caption: negative_prompt.clone(),
                        char_captions: Vec::new(),
                    },
                    legacy_uc: false,
                }),
            )
        } else {
            (None, None)
        };

        Ok(GenerationRequest {
            input,
            model,
            action: "generate".to_string(),
            parameters: Parameters {
                add_original_image: false,
                cfg_rescale: 0,
                controlnet_strength: 1,
                dynamic_thresholding: false,
                height,
                legacy: false,
                legacy_v3_extend: false,
                n_samples: 1,
                negative_prompt,
                noise_schedule: "native".to_string(),
                params_version: 1,
                quality_toggle: true,
                sampler,
                scale,
                seed,
                sm,
                sm_dyn,
                steps,
                uc_preset: 0,
                width,
                v4_negative_prompt,
                v4_prompt,
            },
        })
    }
}
