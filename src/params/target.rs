//! Locate the user a moderation command is aimed at
//!
//! Three forms are recognised, in priority order:
//! 1. a reply to the target's message (consumes no tokens)
//! 2. a mention at the start of the arguments (`@name` is one token, a text
//!    mention spans as many tokens as its display text has words)
//! 3. a leading `id<digits>` token

use crate::core::types::{Event, MessageEntity, PlatformUser};

use super::tokens::TokenSeq;

/// The identified target and the tokens left after it
pub fn find_target(
    event: &Event,
    tokens: &TokenSeq,
    allow_bots: bool,
) -> Option<(PlatformUser, TokenSeq)> {
    if let Some(user) = event.reply_to.as_ref().filter(|u| acceptable(u, allow_bots)) {
        return Some((user.clone(), tokens.clone()));
    }

    if let Some((user, width)) =
        mentioned_user(event, tokens).filter(|(u, _)| acceptable(u, allow_bots))
    {
        return Some((user, tokens.skip(width)));
    }

    id_user(tokens)
        .filter(|u| acceptable(u, allow_bots))
        .map(|user| (user, tokens.skip(1)))
}

fn acceptable(user: &PlatformUser, allow_bots: bool) -> bool {
    allow_bots || !user.is_bot
}

/// First mention entity that lines up with the leading tokens
fn mentioned_user(event: &Event, tokens: &TokenSeq) -> Option<(PlatformUser, usize)> {
    let first = tokens.first()?;

    event.entities.iter().find_map(|entity| match entity {
        MessageEntity::Mention { username } => {
            let bare = first.strip_prefix('@')?;
            bare.eq_ignore_ascii_case(username)
                .then(|| (PlatformUser::by_username(username.clone()), 1))
        }
        MessageEntity::TextMention { user, text } => {
            let words: Vec<&str> = text.split_whitespace().collect();
            let leading = tokens.slice(..words.len());
            (!words.is_empty() && leading.iter().eq(words.iter().copied()))
                .then(|| (user.clone(), words.len()))
        }
    })
}

fn id_user(tokens: &TokenSeq) -> Option<PlatformUser> {
    let first = tokens.first()?.to_lowercase();
    let id = first.strip_prefix("id")?.parse::<i64>().ok()?;
    Some(PlatformUser::by_id(id))
}
