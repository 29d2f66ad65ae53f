//! Per-user settings operations.
//!
//! Every mutation goes through the store's shallow-merge-and-persist path.
//! All operations require an enrolled user; the access check in the chat
//! layer normally guarantees that, this is the backstop.

use super::ImageBot;
use crate::error::{Error, Result, ValidationError};
use crate::request;
use crate::types::{Event, Model, Sampler, SettingsPatch, StatusReport, UserId};

impl ImageBot {
    async fn require_enrolled(&self, user: UserId) -> Result<()> {
        if self.settings.exists(user).await {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }

    async fn apply_patch(&self, user: UserId, patch: SettingsPatch) {
        self.settings.set(user, &patch).await;
        self.emit_event(Event::SettingsUpdated { user });
    }

    /// Set the stored image size
    ///
    /// Validated against the preset pixel budget (the larger of the two
    /// budgets) and the multiple-of-64 rule.
    pub async fn set_size(&self, user: UserId, width: u32, height: u32) -> Result<()> {
        self.require_enrolled(user).await?;
        request::check_multiple_of_64(width, height)?;
        request::check_pixel_budget(width, height, self.config.limits.preset_pixel_budget)?;

        self.apply_patch(
            user,
            SettingsPatch {
                width: Some(width),
                height: Some(height),
                ..Default::default()
            },
        )
        .await;
        Ok(())
    }

    /// Set the stored sampler
    pub async fn set_sampler(&self, user: UserId, sampler: Sampler) -> Result<()> {
        self.require_enrolled(user).await?;
        self.apply_patch(
            user,
            SettingsPatch {
                sampler: Some(sampler),
                ..Default::default()
            },
        )
        .await;
        Ok(())
    }

    /// Toggle the SMEA flag; returns the new state
    ///
    /// Disabling SMEA forces dynamic SMEA off as well.
    pub async fn toggle_smea(&self, user: UserId) -> Result<bool> {
        self.require_enrolled(user).await?;
        let current = self
            .settings
            .get(user)
            .await
            .and_then(|s| s.sm)
            .unwrap_or(false);
        let enabled = !current;

        let patch = SettingsPatch {
            sm: Some(enabled),
            sm_dyn: if enabled { None } else { Some(false) },
            ..Default::default()
        };
        self.apply_patch(user, patch).await;
        Ok(enabled)
    }

    /// Toggle the dynamic SMEA flag; returns the new state
    ///
    /// Enabling dynamic SMEA forces base SMEA on.
    pub async fn toggle_dyn(&self, user: UserId) -> Result<bool> {
        self.require_enrolled(user).await?;
        let current = self
            .settings
            .get(user)
            .await
            .and_then(|s| s.sm_dyn)
            .unwrap_or(false);
        let enabled = !current;

        let patch = SettingsPatch {
            sm_dyn: Some(enabled),
            sm: if enabled { Some(true) } else { None },
            ..Default::default()
        };
        self.apply_patch(user, patch).await;
        Ok(enabled)
    }

    /// Set the stored step count (accepted range 1 through the configured
    /// maximum)
    pub async fn set_steps(&self, user: UserId, steps: u32) -> Result<()> {
        self.require_enrolled(user).await?;
        if steps < 1 || steps > self.config.limits.max_steps {
            return Err(ValidationError::StepsOutOfRange {
                steps,
                min: 1,
                max: self.config.limits.max_steps,
            }
            .into());
        }
        self.apply_patch(
            user,
            SettingsPatch {
                steps: Some(steps),
                ..Default::default()
            },
        )
        .await;
        Ok(())
    }

    /// Set the stored guidance scale
    pub async fn set_scale(&self, user: UserId, scale: u32) -> Result<()> {
        self.require_enrolled(user).await?;
        if scale > self.config.limits.max_scale {
            return Err(ValidationError::ScaleOutOfRange {
                scale,
                min: 0,
                max: self.config.limits.max_scale,
            }
            .into());
        }
        self.apply_patch(
            user,
            SettingsPatch {
                scale: Some(scale),
                ..Default::default()
            },
        )
        .await;
        Ok(())
    }

    /// Set the stored negative prompt
    pub async fn set_negative_prompt(&self, user: UserId, text: impl Into<String>) -> Result<()> {
        self.require_enrolled(user).await?;
        self.apply_patch(
            user,
            SettingsPatch {
                negative_prompt: Some(text.into()),
                ..Default::default()
            },
        )
        .await;
        Ok(())
    }

    /// Set the stored quality tags
    pub async fn set_quality_tags(&self, user: UserId, text: impl Into<String>) -> Result<()> {
        self.require_enrolled(user).await?;
        self.apply_patch(
            user,
            SettingsPatch {
                quality_tags: Some(text.into()),
                ..Default::default()
            },
        )
        .await;
        Ok(())
    }

    /// Set the stored model by wire id
    pub async fn set_model(&self, user: UserId, model_id: &str) -> Result<Model> {
        self.require_enrolled(user).await?;
        let model = Model::from_id(model_id)
            .filter(|m| self.config.defaults.models.contains(m))
            .ok_or_else(|| ValidationError::UnknownModel(model_id.to_string()))?;

        self.apply_patch(
            user,
            SettingsPatch {
                model: Some(model),
                ..Default::default()
            },
        )
        .await;
        Ok(model)
    }

    /// Current queue depth plus the user's stored settings
    pub async fn status(&self, user: UserId) -> StatusReport {
        StatusReport {
            queued_tasks: self.queue.len(),
            settings: self.settings.get(user).await,
        }
    }
}
