//! Modguard - Console Chat
//!
//! Every line typed is delivered to the dispatcher as a chat message from the
//! configured user; bot replies are echoed back. A line may start with
//! `reply:<user id>` to simulate replying to that user's message.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use modguard::command::{CommandRegistry, Dispatcher, Outcome, Services};
use modguard::core::types::{Event, MessageEntity, PlatformUser};
use modguard::core::{Config, Result};
use modguard::handlers;
use modguard::services::{
    ChatAdmin, InMemoryDirectory, InMemoryMembers, Permission, RecordingDelivery,
};

/// Talk to the moderation bot from a terminal
#[derive(Parser, Debug)]
#[command(name = "modguard")]
#[command(about = "Interactive console chat with the moderation bot")]
struct Args {
    /// TOML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Chat the messages are posted in
    #[arg(long, default_value_t = -1000)]
    chat_id: i64,

    /// Platform id of the user typing
    #[arg(long, default_value_t = 1)]
    user_id: i64,

    /// Username of the user typing
    #[arg(long, default_value = "admin")]
    username: String,

    /// Join as a regular member instead of the chat creator
    #[arg(long)]
    member: bool,

    /// Platform id of the bot account
    #[arg(long, default_value_t = 777)]
    bot_id: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::new(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut registry = CommandRegistry::new();
    handlers::register_all(&mut registry)?;
    tracing::info!("Registered {} commands", registry.len());

    let members = InMemoryMembers::new(args.bot_id);
    members.set_admin(
        args.chat_id,
        ChatAdmin::administrator(
            args.bot_id,
            [Permission::RestrictMembers, Permission::DeleteMessages],
        ),
    );
    if !args.member {
        members.set_admin(args.chat_id, ChatAdmin::creator(args.user_id));
    }

    let services = Services::new(
        Arc::new(InMemoryDirectory::new()),
        Arc::new(RecordingDelivery::new().with_echo()),
        Arc::new(members),
        &config,
    );
    let _lock_sweeper = services.locks.spawn_sweeper(config.locks.sweep_interval());
    let _throttle_sweeper = services.throttle.spawn_sweeper(config.throttle.sweep_interval());
    let dispatcher = Arc::new(Dispatcher::new(registry, &services, &config));

    let sender = PlatformUser {
        id: Some(args.user_id),
        username: Some(args.username.clone()),
        full_name: Some(args.username.clone()),
        is_bot: false,
    };
    let message_ids = AtomicI64::new(0);

    println!("\n=== MODGUARD CONSOLE ===");
    println!("Chat {} as @{} (id {})", args.chat_id, args.username, args.user_id);
    println!("Try: /mute id42 2h flood, /random 10, /choice tea or coffee");
    println!("Prefix a line with reply:<id> to reply to that user. quit / q exits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "q" {
            break;
        }

        let mut event = parse_line(args.chat_id, sender.clone(), line);
        event.message_id = message_ids.fetch_add(1, Ordering::SeqCst) + 1;

        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            match dispatcher.dispatch(event).await {
                Outcome::Failed(reason) => println!("[failed] {}", reason),
                Outcome::Cancelled => tracing::debug!("Message cancelled by middleware"),
                _ => {}
            }
        });
    }

    tracing::info!("Console closed");
    Ok(())
}

/// Build an event from a console line, picking up `reply:<id>` and `@mentions`
fn parse_line(chat_id: i64, sender: PlatformUser, line: &str) -> Event {
    let (reply_to, text) = match line.split_once(' ') {
        Some((head, rest)) => match head.strip_prefix("reply:").and_then(|id| id.parse().ok()) {
            Some(id) => (Some(PlatformUser::by_id(id)), rest.trim()),
            None => (None, line),
        },
        None => (None, line),
    };

    let mut event = Event::new(chat_id, sender, text);
    event.reply_to = reply_to;
    event.entities = text
        .split_whitespace()
        .filter_map(|word| word.strip_prefix('@'))
        .filter(|name| !name.is_empty())
        .map(|name| MessageEntity::Mention {
            username: name.to_string(),
        })
        .collect();
    event
}
