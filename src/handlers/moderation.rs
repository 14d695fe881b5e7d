//! /mute and /unmute

use std::time::Duration;

use crate::command::{BodyResult, CommandSpec, HandlerError};
use crate::params::{format_duration, BoundArgs, ParamShape, ParamSpec};
use crate::services::Permission;

const MODERATION_COOLDOWN: Duration = Duration::from_secs(10);

pub fn mute_command() -> CommandSpec {
    CommandSpec::new("mute", mute)
        .alias("мут")
        .usage("/mute <target> <duration> [reason]")
        .rate_limit(MODERATION_COOLDOWN)
        .require(Permission::RestrictMembers)
        .param(ParamSpec::new("message", ParamShape::Message))
        .param(ParamSpec::new("chat", ParamShape::Chat))
        .param(ParamSpec::new("sender", ParamShape::User))
        .param(ParamSpec::new("target", ParamShape::User).label("target user"))
        .param(ParamSpec::new("duration", ParamShape::Duration).label("duration"))
        .param(
            ParamSpec::new("comment", ParamShape::optional(ParamShape::Str))
                .keyword_only()
                .label("reason"),
        )
}

pub fn unmute_command() -> CommandSpec {
    CommandSpec::new("unmute", unmute)
        .alias("анмут")
        .usage("/unmute <target>")
        .rate_limit(MODERATION_COOLDOWN)
        .require(Permission::RestrictMembers)
        .param(ParamSpec::new("chat", ParamShape::Chat))
        .param(ParamSpec::new("target", ParamShape::User).label("target user"))
}

async fn mute(args: BoundArgs) -> BodyResult {
    let chat = args.chat("chat").ok_or(HandlerError::MissingArgument("chat"))?;
    let sender = args.user("sender").ok_or(HandlerError::MissingArgument("sender"))?;
    let target = args.user("target").ok_or(HandlerError::MissingArgument("target"))?;
    let duration = args
        .duration("duration")
        .ok_or(HandlerError::MissingArgument("duration"))?;

    tracing::info!(
        "{} muted {} in {} for {}",
        sender,
        target,
        chat,
        format_duration(duration)
    );

    let mut reply = format!(
        "User {} can only read messages for {}",
        target,
        format_duration(duration)
    );
    if let Some(comment) = args.text("comment") {
        reply.push_str(&format!("\nReason: {}", comment));
    }
    Ok(reply)
}

async fn unmute(args: BoundArgs) -> BodyResult {
    let chat = args.chat("chat").ok_or(HandlerError::MissingArgument("chat"))?;
    let target = args.user("target").ok_or(HandlerError::MissingArgument("target"))?;

    tracing::info!("Lifted restrictions from {} in {}", target, chat);
    Ok(format!("All restrictions lifted from {}", target))
}
