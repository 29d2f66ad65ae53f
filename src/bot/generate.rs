//! Generation entry points and request orchestration.
//!
//! Every flow funnels into [`ImageBot::process_request`]: post a progress
//! indicator, resolve the seed, remember the resolved parameters, build the
//! request, admit it to the queue, keep the indicator in step with the queue
//! via settle broadcasts, then deliver the image or a rendered error. The
//! indicator is dismissed no matter how the request ends.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::ImageBot;
use super::messages;
use crate::error::{Error, Result};
use crate::request::{self, OverrideParams, RequestBuilder};
use crate::transport::{ImageReply, ReplyAction};
use crate::types::{Event, GenerationId, MessageId, RequestContext};

/// Actions attached to every image reply
const REPLY_ACTIONS: [ReplyAction; 4] = [
    ReplyAction::Repeat,
    ReplyAction::FetchPrompt,
    ReplyAction::FetchOriginal,
    ReplyAction::DecreaseSteps,
];

impl ImageBot {
    /// Generate from a plain prompt, all other parameters layered from the
    /// user's settings and the defaults
    pub async fn generate(&self, ctx: &RequestContext, prompt: impl Into<String>) -> Result<()> {
        let overrides = OverrideParams {
            prompt: Some(prompt.into()),
            ..Default::default()
        };
        self.process_request(ctx, overrides, false).await
    }

    /// Generate from an explicit override record (the advanced flow)
    ///
    /// Pre-checks the restricted advanced pixel budget before anything is
    /// enqueued or a progress message appears.
    pub async fn advanced_generate(
        &self,
        ctx: &RequestContext,
        params: OverrideParams,
    ) -> Result<()> {
        if let Err(error) = self.check_advanced_budget(ctx, &params).await {
            self.render_rejection(ctx, &error).await;
            return Err(error);
        }
        self.process_request(ctx, params, false).await
    }

    /// Merge a patch over the user's latest parameters and re-generate,
    /// keeping the seed unless the patch replaces it
    pub async fn edit_parameters(
        &self,
        ctx: &RequestContext,
        patch: OverrideParams,
    ) -> Result<()> {
        let latest = self.latest_params.lock().await.get(&ctx.user).cloned();
        let Some(mut merged) = latest else {
            let error = Error::NoPriorGeneration;
            self.render_rejection(ctx, &error).await;
            return Err(error);
        };
        merged.apply(&patch);

        if let Err(error) = self.check_advanced_budget(ctx, &merged).await {
            self.render_rejection(ctx, &error).await;
            return Err(error);
        }
        self.process_request(ctx, merged, false).await
    }

    /// Replay the user's latest parameters with a forced fresh seed
    pub async fn repeat_last(&self, ctx: &RequestContext) -> Result<()> {
        let latest = self.latest_params.lock().await.get(&ctx.user).cloned();
        let Some(latest) = latest else {
            let error = Error::NoPriorGeneration;
            self.render_rejection(ctx, &error).await;
            return Err(error);
        };
        self.process_request(ctx, latest, true).await
    }

    /// Re-generate the user's latest parameters with 10 fewer steps
    /// (clamped to at least 1), keeping the seed
    pub async fn decrease_steps(&self, ctx: &RequestContext) -> Result<()> {
        let latest = self.latest_params.lock().await.get(&ctx.user).cloned();
        let Some(mut latest) = latest else {
            let error = Error::NoPriorGeneration;
            self.render_rejection(ctx, &error).await;
            return Err(error);
        };

        let current = match latest.steps {
            Some(steps) => steps,
            // fall back to the stored settings, then the hardcoded default
            None => self
                .settings
                .get(ctx.user)
                .await
                .and_then(|s| s.steps)
                .unwrap_or(request::DEFAULT_STEPS),
        };
        if current <= 1 {
            if let Err(e) = self
                .transport
                .send_text(ctx.chat.id, "Already at the minimum step count.", false)
                .await
            {
                tracing::warn!(error = %e, "failed to deliver minimum-steps notice");
            }
            return Ok(());
        }

        latest.steps = Some(current.saturating_sub(10).max(1));
        self.process_request(ctx, latest, false).await
    }

    /// Orchestrate one admitted request from progress post to final reply
    pub(crate) async fn process_request(
        &self,
        ctx: &RequestContext,
        overrides: OverrideParams,
        fresh_seed: bool,
    ) -> Result<()> {
        // subscribe before snapshotting the depth: a task settling between
        // the two can only advance the indicator early, never leave it stale
        let settled_rx = self.queue.subscribe();
        let ahead = self.queue.len();

        let progress = self
            .transport
            .post_progress(ctx.chat.id, &messages::queue_position_text(ahead))
            .await?;

        let outcome = self
            .run_generation(ctx, overrides, fresh_seed, settled_rx, ahead, progress)
            .await;

        // dismissal is best-effort and unconditional
        if let Err(e) = self.transport.delete_progress(ctx.chat.id, progress).await {
            tracing::warn!(error = %e, "failed to delete progress message");
        }

        match outcome {
            Ok(artifact_id) => {
                self.emit_event(Event::GenerationCompleted {
                    user: ctx.user,
                    artifact: artifact_id,
                });
                Ok(())
            }
            Err(error) => {
                tracing::error!(user_id = %ctx.user, error = %error, "generation request failed");
                let text = messages::render_error(&error);
                if let Err(e) = self.transport.send_text(ctx.chat.id, &text, true).await {
                    tracing::warn!(error = %e, "failed to deliver error message");
                }
                self.emit_event(Event::GenerationFailed {
                    user: ctx.user,
                    message: text,
                });
                Err(error)
            }
        }
    }

    async fn run_generation(
        &self,
        ctx: &RequestContext,
        mut overrides: OverrideParams,
        fresh_seed: bool,
        mut settled_rx: broadcast::Receiver<crate::queue::TaskSettled>,
        mut ahead: usize,
        progress: MessageId,
    ) -> Result<GenerationId> {
        let seed = request::resolve_seed(overrides.seed, fresh_seed);
        overrides.seed = Some(seed);

        // remembered before the task runs: a repeat issued while this request
        // is still queued replays these exact resolved parameters
        self.latest_params
            .lock()
            .await
            .insert(ctx.user, overrides.clone());

        let base = self.settings.get(ctx.user).await.unwrap_or_default();
        let builder = RequestBuilder::new(
            &self.config.defaults,
            &self.config.limits,
            &self.config.policy,
        );
        let generation_request = builder.build(&base, &overrides)?;

        self.emit_event(Event::RequestQueued {
            user: ctx.user,
            position: ahead,
        });
        tracing::info!(
            user_id = %ctx.user,
            position = ahead,
            seed,
            "generation request admitted"
        );

        let generator = Arc::clone(&self.generator);
        let mut handle = self
            .queue
            .enqueue(async move { generator.generate(&generation_request).await.map(Arc::new) });

        // keep the queue-position indicator in step until our own task
        // resolves; after that the broadcast no longer matters to this caller
        let mut track_settles = true;
        let artifact = loop {
            if !track_settles {
                break (&mut handle).await?;
            }
            tokio::select! {
                result = &mut handle => break result?,
                note = settled_rx.recv() => {
                    match note {
                        Ok(_) => ahead = ahead.saturating_sub(1),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            ahead = ahead.saturating_sub(missed as usize);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            track_settles = false;
                            continue;
                        }
                    }
                    if let Err(e) = self
                        .transport
                        .edit_progress(ctx.chat.id, progress, &messages::queue_position_text(ahead))
                        .await
                    {
                        tracing::debug!(error = %e, "failed to edit progress message");
                    }
                }
            }
        };

        let artifact_id = GenerationId::random();
        self.artifacts
            .lock()
            .await
            .put(artifact_id, Arc::clone(&artifact));

        if let Err(e) = self
            .transport
            .edit_progress(ctx.chat.id, progress, messages::UPLOADING)
            .await
        {
            tracing::debug!(error = %e, "failed to edit progress message");
        }

        let caption = messages::caption(&artifact.request);
        self.transport
            .send_image(
                ctx.chat.id,
                ImageReply {
                    image: &artifact.image,
                    caption: &caption,
                    artifact_id,
                    actions: &REPLY_ACTIONS,
                    reply_to: ctx.reply_to,
                },
            )
            .await?;

        tracing::info!(
            user_id = %ctx.user,
            artifact = %artifact_id,
            "generation delivered"
        );
        Ok(artifact_id)
    }

    /// Effective-size check against the restricted advanced budget
    async fn check_advanced_budget(
        &self,
        ctx: &RequestContext,
        params: &OverrideParams,
    ) -> Result<()> {
        let base = self.settings.get(ctx.user).await.unwrap_or_default();
        let width = params
            .width
            .or(base.width)
            .unwrap_or(request::DEFAULT_WIDTH);
        let height = params
            .height
            .or(base.height)
            .unwrap_or(request::DEFAULT_HEIGHT);
        request::check_pixel_budget(width, height, self.config.limits.advanced_pixel_budget)?;
        Ok(())
    }

    /// Deliver a pre-admission rejection (no retry affordance)
    async fn render_rejection(&self, ctx: &RequestContext, error: &Error) {
        if let Err(e) = self
            .transport
            .send_text(ctx.chat.id, &messages::render_error(error), false)
            .await
        {
            tracing::warn!(error = %e, "failed to deliver rejection message");
        }
    }
}
