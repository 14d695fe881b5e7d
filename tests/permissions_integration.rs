//! Integration tests for administrator-rights checks on moderation commands

use std::sync::Arc;

use modguard::command::{CommandRegistry, Dispatcher, Outcome, Services};
use modguard::core::types::{Event, PlatformUser};
use modguard::core::Config;
use modguard::handlers;
use modguard::services::{
    ChatAdmin, InMemoryDirectory, InMemoryMembers, Permission, RecordingDelivery,
};

const CHAT: i64 = -7;
const BOT: i64 = 500;

struct Harness {
    dispatcher: Dispatcher,
    members: Arc<InMemoryMembers>,
    delivery: Arc<RecordingDelivery>,
}

fn harness() -> Harness {
    let config = Config::default();
    let mut registry = CommandRegistry::new();
    handlers::register_all(&mut registry).unwrap();

    let members = Arc::new(InMemoryMembers::new(BOT));
    let delivery = Arc::new(RecordingDelivery::new());
    let services = Services::new(
        Arc::new(InMemoryDirectory::new()),
        delivery.clone(),
        members.clone(),
        &config,
    );
    Harness {
        dispatcher: Dispatcher::new(registry, &services, &config),
        members,
        delivery,
    }
}

fn message(user: i64, text: &str) -> Event {
    let mut event = Event::new(CHAT, PlatformUser::by_id(user).with_name("Someone"), text);
    event.message_id = 10;
    event
}

fn full_bot() -> ChatAdmin {
    ChatAdmin::administrator(BOT, [Permission::RestrictMembers, Permission::DeleteMessages])
}

#[tokio::test]
async fn test_creator_bypasses_flags() {
    let h = harness();
    h.members.set_admin(CHAT, ChatAdmin::creator(1));
    h.members.set_admin(CHAT, full_bot());

    let outcome = h.dispatcher.dispatch(message(1, "/unmute id9")).await;
    assert!(matches!(outcome, Outcome::Replied(_)));
}

#[tokio::test]
async fn test_admin_with_right_passes() {
    let h = harness();
    h.members
        .set_admin(CHAT, ChatAdmin::administrator(2, [Permission::RestrictMembers]));
    h.members.set_admin(CHAT, full_bot());

    let outcome = h.dispatcher.dispatch(message(2, "/mute id9 1h")).await;
    assert_eq!(
        outcome,
        Outcome::Replied("User id9 can only read messages for 1h".into())
    );
}

#[tokio::test]
async fn test_user_without_rights_is_silently_cancelled() {
    let h = harness();
    h.members
        .set_admin(CHAT, ChatAdmin::administrator(3, [Permission::PinMessages]));
    h.members.set_admin(CHAT, full_bot());

    assert_eq!(
        h.dispatcher.dispatch(message(3, "/mute id9 1h")).await,
        Outcome::Cancelled
    );
    assert_eq!(
        h.dispatcher.dispatch(message(4, "/unmute id9")).await,
        Outcome::Cancelled
    );

    assert!(h.delivery.sent().is_empty());
    // Both commands were removed from the chat
    assert_eq!(h.delivery.deleted().len(), 2);
    assert!(h.delivery.deleted().iter().all(|m| m.message_id == 10));
}

#[tokio::test]
async fn test_command_kept_when_bot_cannot_delete() {
    let h = harness();
    h.members
        .set_admin(CHAT, ChatAdmin::administrator(BOT, [Permission::RestrictMembers]));

    assert_eq!(
        h.dispatcher.dispatch(message(3, "/mute id9 1h")).await,
        Outcome::Cancelled
    );
    assert!(h.delivery.deleted().is_empty());
    assert!(h.delivery.sent().is_empty());
}

#[tokio::test]
async fn test_bot_without_rights_asks_for_them() {
    let h = harness();
    h.members.set_admin(CHAT, ChatAdmin::creator(1));
    h.members
        .set_admin(CHAT, ChatAdmin::administrator(BOT, [Permission::DeleteMessages]));

    let outcome = h.dispatcher.dispatch(message(1, "/mute id9 1h")).await;
    assert_eq!(outcome, Outcome::Cancelled);

    let sent = h.delivery.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].text,
        Config::default().permissions.bot_missing_rights_text
    );
    assert_eq!(sent[0].reply_to, Some(10));
}

#[tokio::test]
async fn test_commands_without_requirements_skip_the_check() {
    let h = harness();
    let outcome = h.dispatcher.dispatch(message(3, "/choice tea or coffee")).await;
    assert!(matches!(outcome, Outcome::Replied(_)));
}
