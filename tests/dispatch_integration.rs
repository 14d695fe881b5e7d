//! Integration tests for the full dispatch chain with the built-in commands

use std::sync::Arc;
use std::time::Duration;

use modguard::command::{CommandRegistry, Dispatcher, Outcome, Services};
use modguard::core::types::{Event, MessageEntity, PlatformUser};
use modguard::core::Config;
use modguard::handlers;
use modguard::services::{
    ChatAdmin, InMemoryDirectory, InMemoryMembers, Permission, RecordingDelivery,
};

const CHAT: i64 = -42;
const BOT: i64 = 1000;

struct Harness {
    dispatcher: Arc<Dispatcher>,
    directory: Arc<InMemoryDirectory>,
    delivery: Arc<RecordingDelivery>,
}

fn harness(directory: InMemoryDirectory) -> Harness {
    let config = Config::default();
    let mut registry = CommandRegistry::new();
    handlers::register_all(&mut registry).unwrap();

    let directory = Arc::new(directory);
    let delivery = Arc::new(RecordingDelivery::new());
    let members = InMemoryMembers::new(BOT);
    members.set_admin(CHAT, ChatAdmin::creator(1));
    members.set_admin(
        CHAT,
        ChatAdmin::administrator(BOT, [Permission::RestrictMembers, Permission::DeleteMessages]),
    );
    let services = Services::new(directory.clone(), delivery.clone(), Arc::new(members), &config);
    Harness {
        dispatcher: Arc::new(Dispatcher::new(registry, &services, &config)),
        directory,
        delivery,
    }
}

fn admin_message(id: i64, text: &str) -> Event {
    let mut event = Event::new(CHAT, PlatformUser::by_id(1).with_name("Admin"), text);
    event.message_id = id;
    event.chat_title = Some("Moderated".into());
    event
}

#[tokio::test]
async fn test_mute_by_id() {
    let h = harness(InMemoryDirectory::new());
    let outcome = h
        .dispatcher
        .dispatch(admin_message(1, "/mute id123 2h spam"))
        .await;

    assert_eq!(
        outcome,
        Outcome::Replied("User id123 can only read messages for 2h\nReason: spam".into())
    );
    assert!(h.directory.get_by_platform_id(1).is_some());
    assert!(h.directory.get_by_platform_id(123).is_some());
    assert_eq!(h.delivery.sent()[0].reply_to, Some(1));
}

#[tokio::test]
async fn test_mute_by_reply_with_alias() {
    let h = harness(InMemoryDirectory::new());
    let event = admin_message(1, "/МУТ 1d")
        .replying_to(PlatformUser::by_id(9).with_name("Flooder"));
    let outcome = h.dispatcher.dispatch(event).await;
    assert_eq!(
        outcome,
        Outcome::Replied("User Flooder can only read messages for 1d".into())
    );
}

#[tokio::test]
async fn test_mute_by_text_mention() {
    let h = harness(InMemoryDirectory::new());
    let event = admin_message(1, "/mute Ann Lee 30m").with_entity(MessageEntity::TextMention {
        user: PlatformUser::by_id(77).with_name("Ann Lee"),
        text: "Ann Lee".into(),
    });
    let outcome = h.dispatcher.dispatch(event).await;
    assert_eq!(
        outcome,
        Outcome::Replied("User Ann Lee can only read messages for 30m".into())
    );
}

#[tokio::test]
async fn test_usage_error_reply() {
    let h = harness(InMemoryDirectory::new());
    let outcome = h.dispatcher.dispatch(admin_message(1, "/mute id123")).await;

    let expected = "Invalid command usage.\nNo value passed for required parameter duration.\nUsage: /mute <target> <duration> [reason]";
    assert_eq!(outcome, Outcome::Rejected(expected.into()));
    assert_eq!(h.delivery.sent()[0].text, expected);
}

#[tokio::test]
async fn test_channel_posts_are_dropped() {
    let h = harness(InMemoryDirectory::new());
    let mut event = admin_message(1, "/unmute id5");
    event.sender_chat = Some(-1001);

    assert_eq!(h.dispatcher.dispatch(event).await, Outcome::Cancelled);
    assert!(h.directory.is_empty());
    assert!(h.delivery.sent().is_empty());
}

#[tokio::test]
async fn test_plain_text_ignored() {
    let h = harness(InMemoryDirectory::new());
    assert_eq!(
        h.dispatcher.dispatch(admin_message(1, "just chatting")).await,
        Outcome::Ignored
    );
    assert!(h.directory.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_first_messages_create_one_sender() {
    let h = harness(InMemoryDirectory::new().with_latency(Duration::from_millis(20)));

    let commands = ["/choice a or b", "/random 3", "/unmute id8", "/choice x or y"];
    let tasks: Vec<_> = commands
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let dispatcher = Arc::clone(&h.dispatcher);
            let event = admin_message(i as i64 + 1, text);
            tokio::spawn(async move { dispatcher.dispatch(event).await })
        })
        .collect();

    for task in tasks {
        assert!(matches!(task.await.unwrap(), Outcome::Replied(_) | Outcome::Cancelled));
    }

    // The sender plus the /unmute target
    assert_eq!(h.directory.created_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_target_and_sender_resolution_share_lock() {
    let h = harness(InMemoryDirectory::new().with_latency(Duration::from_millis(20)));

    let mute = {
        let dispatcher = Arc::clone(&h.dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(admin_message(1, "/mute id123 1h")).await })
    };
    let random = {
        let dispatcher = Arc::clone(&h.dispatcher);
        let mut event = Event::new(CHAT, PlatformUser::by_id(123), "/random 5");
        event.message_id = 2;
        tokio::spawn(async move { dispatcher.dispatch(event).await })
    };

    assert!(matches!(mute.await.unwrap(), Outcome::Replied(_)));
    assert!(matches!(random.await.unwrap(), Outcome::Replied(_)));
    assert_eq!(h.directory.created_count(), 2);
    assert_eq!(h.directory.len(), 2);
}
