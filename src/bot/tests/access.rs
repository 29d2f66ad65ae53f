use crate::bot::test_helpers::{
    ALLOWED_GROUP, TEST_PASSCODE, create_test_bot, group_ctx, private_ctx,
};
use crate::bot::{AccessDecision, EnrollOutcome};
use crate::types::{ChatId, ChatKind, ChatRef, UserId};

#[tokio::test]
async fn unknown_user_in_private_chat_is_denied() {
    let (bot, _generator, _transport) = create_test_bot();

    let decision = bot.check_access(UserId(1), &private_ctx(1).chat).await;
    assert_eq!(decision, AccessDecision::Denied);
}

#[tokio::test]
async fn passcode_enrolls_and_grants_private_access() {
    let (bot, _generator, _transport) = create_test_bot();
    let user = UserId(1);

    assert_eq!(
        bot.enroll(user, TEST_PASSCODE).await,
        EnrollOutcome::Authorized
    );
    assert!(bot.settings.exists(user).await);
    assert_eq!(
        bot.check_access(user, &private_ctx(1).chat).await,
        AccessDecision::Granted
    );
}

#[tokio::test]
async fn wrong_passcode_is_rejected() {
    let (bot, _generator, _transport) = create_test_bot();

    assert_eq!(
        bot.enroll(UserId(1), "open says me").await,
        EnrollOutcome::Rejected
    );
    assert!(!bot.settings.exists(UserId(1)).await);
}

#[tokio::test]
async fn already_enrolled_user_is_rejected_on_reenroll() {
    let (bot, _generator, _transport) = create_test_bot();
    let user = UserId(1);

    bot.enroll(user, TEST_PASSCODE).await;
    assert_eq!(
        bot.enroll(user, TEST_PASSCODE).await,
        EnrollOutcome::Rejected
    );
}

#[tokio::test]
async fn allowlisted_group_auto_enrolls_with_group_origin() {
    let (bot, _generator, _transport) = create_test_bot();
    let user = UserId(5);

    let decision = bot.check_access(user, &group_ctx(5).chat).await;
    assert_eq!(decision, AccessDecision::Granted);

    let settings = bot.settings.get(user).await.unwrap();
    assert!(settings.from_group);
}

#[tokio::test]
async fn group_enrolled_user_cannot_use_private_chat() {
    let (bot, _generator, _transport) = create_test_bot();
    let user = UserId(5);

    bot.check_access(user, &group_ctx(5).chat).await;
    assert_eq!(
        bot.check_access(user, &private_ctx(5).chat).await,
        AccessDecision::GroupOnly
    );

    // the group itself keeps working
    assert_eq!(
        bot.check_access(user, &group_ctx(5).chat).await,
        AccessDecision::Granted
    );
}

#[tokio::test]
async fn passcode_upgrade_clears_group_origin() {
    let (bot, _generator, _transport) = create_test_bot();
    let user = UserId(5);

    bot.check_access(user, &group_ctx(5).chat).await;
    assert_eq!(
        bot.enroll(user, TEST_PASSCODE).await,
        EnrollOutcome::Authorized
    );

    let settings = bot.settings.get(user).await.unwrap();
    assert!(!settings.from_group);
    assert_eq!(
        bot.check_access(user, &private_ctx(5).chat).await,
        AccessDecision::Granted
    );
}

#[tokio::test]
async fn unlisted_group_grants_nothing() {
    let (bot, _generator, _transport) = create_test_bot();

    let chat = ChatRef {
        id: ChatId(-777),
        kind: ChatKind::Group,
    };
    assert_eq!(
        bot.check_access(UserId(9), &chat).await,
        AccessDecision::Denied
    );
    assert!(!bot.settings.exists(UserId(9)).await);
}

#[tokio::test]
async fn deauthorize_removes_enrollment() {
    let (bot, _generator, _transport) = create_test_bot();
    let user = UserId(1);

    bot.enroll(user, TEST_PASSCODE).await;
    assert!(bot.deauthorize(user).await);
    assert!(!bot.settings.exists(user).await);
    assert!(!bot.deauthorize(user).await, "second deauthorize is a no-op");
}

#[tokio::test]
async fn group_allowlist_respects_group_id() {
    let (bot, _generator, _transport) = create_test_bot();

    // the allow-listed group enrolls, so its id must match exactly
    assert_eq!(ALLOWED_GROUP, ChatId(-1000));
    let decision = bot.check_access(UserId(2), &group_ctx(2).chat).await;
    assert_eq!(decision, AccessDecision::Granted);
}
