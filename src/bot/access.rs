//! Enrollment and chat access checks.
//!
//! Authorization is a capability check: a user with a settings record is
//! enrolled. Members of allow-listed groups are auto-enrolled with the
//! group-origin flag set; passcode enrollment clears that flag and unlocks
//! private chat.

use super::ImageBot;
use crate::types::{ChatKind, ChatRef, Event, UserId};

/// Outcome of an access check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    /// The user may proceed in this chat
    Granted,
    /// The user is enrolled through a group only and tried private chat;
    /// they should be pointed at passcode enrollment
    GroupOnly,
    /// The user is not enrolled and this chat grants nothing
    Denied,
}

/// Outcome of a passcode enrollment attempt
///
/// Deliberately coarse: a wrong passcode and an already-enrolled user get the
/// same answer, so the enrollment command never confirms a guessed passcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrollOutcome {
    /// The user is now fully enrolled
    Authorized,
    /// Wrong passcode, enrollment disabled, or nothing to upgrade
    Rejected,
}

impl ImageBot {
    /// Check whether `user` may use the bot from `chat`
    ///
    /// A side effect is intentional here: an unknown user arriving from an
    /// allow-listed group is enrolled on the spot with the group-origin flag.
    pub async fn check_access(&self, user: UserId, chat: &ChatRef) -> AccessDecision {
        if let Some(settings) = self.settings.get(user).await {
            if settings.from_group && chat.kind == ChatKind::Private {
                return AccessDecision::GroupOnly;
            }
            return AccessDecision::Granted;
        }

        if chat.kind == ChatKind::Group && self.config.access.group_allowlist.contains(&chat.id) {
            tracing::info!(user_id = %user, chat_id = %chat.id, "auto-enrolling group member");
            self.settings.set_group_origin(user, true).await;
            self.emit_event(Event::Enrolled { user });
            return AccessDecision::Granted;
        }

        AccessDecision::Denied
    }

    /// Enroll a user with the configured passcode
    ///
    /// A new user gets an empty settings record; a group-enrolled user is
    /// upgraded by clearing the group-origin flag. Anything else — wrong
    /// passcode, enrollment disabled, already fully enrolled — is rejected.
    pub async fn enroll(&self, user: UserId, passcode: &str) -> EnrollOutcome {
        let Some(ref expected) = self.config.access.passcode else {
            return EnrollOutcome::Rejected;
        };
        if passcode != expected {
            return EnrollOutcome::Rejected;
        }

        match self.settings.get(user).await {
            None => {
                self.settings.create_if_absent(user).await;
                tracing::info!(user_id = %user, "user enrolled via passcode");
                self.emit_event(Event::Enrolled { user });
                EnrollOutcome::Authorized
            }
            Some(settings) if settings.from_group => {
                self.settings.set_group_origin(user, false).await;
                tracing::info!(user_id = %user, "group-enrolled user upgraded via passcode");
                self.emit_event(Event::Enrolled { user });
                EnrollOutcome::Authorized
            }
            Some(_) => EnrollOutcome::Rejected,
        }
    }

    /// Remove a user's enrollment and settings; returns whether anything
    /// was removed
    pub async fn deauthorize(&self, user: UserId) -> bool {
        let removed = self.settings.delete(user).await;
        if removed {
            tracing::info!(user_id = %user, "user deauthorized");
            self.emit_event(Event::Deauthorized { user });
        }
        removed
    }
}
