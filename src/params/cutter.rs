//! Cutters: composable argument parsers
//!
//! A cutter takes the ambient context and the remaining tokens and produces
//! one value plus whatever tokens it did not consume. Cutters are immutable
//! once built, so a compiled pipeline can be shared by any number of
//! concurrent invocations.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::config::DurationConfig;
use crate::core::types::{ContextValue, Event};
use crate::locks::LockRegistry;
use crate::services::UserDirectory;

use super::duration::parse_duration_from_text;
use super::error::ParamsError;
use super::target::find_target;
use super::tokens::TokenSeq;
use super::value::{ArgValue, DefaultValue};

/// Everything a cutter may read besides the tokens
pub struct CutContext<'a> {
    pub event: &'a Arc<Event>,
    pub directory: &'a dyn UserDirectory,
    /// Per platform id; the same registry the sender is resolved under
    pub locks: &'a LockRegistry<i64>,
    pub durations: &'a DurationConfig,
}

/// A produced value and the tokens left after it
#[derive(Debug, Clone)]
pub struct Cut {
    pub value: ArgValue,
    pub rest: TokenSeq,
}

impl Cut {
    pub fn new(value: ArgValue, rest: TokenSeq) -> Self {
        Self { value, rest }
    }
}

pub type CutFuture<'a> = Pin<Box<dyn Future<Output = Result<Cut, ParamsError>> + Send + 'a>>;

/// Single-token conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Int,
    Float,
    Word,
    /// May span several tokens, see [`parse_duration_from_text`]
    Duration,
}

#[derive(Debug, Clone)]
pub enum Cutter {
    /// The inbound message itself
    Message,
    /// A value the middleware stored in the event context
    Context(&'static str),
    Scalar(Scalar),
    /// Every remaining token, joined with spaces
    Rest,
    /// Falls back to `default` when the inner cutter finds no token
    Optional {
        inner: Box<Cutter>,
        default: DefaultValue,
    },
    /// First alternative that parses wins
    Union(Vec<Cutter>),
    /// Leading token must be one of the listed values (case-sensitive)
    Literal(Vec<String>),
    /// Target user from a reply, mention or `id123` token
    Target { allow_bots: bool },
}

impl From<ContextValue> for ArgValue {
    fn from(value: ContextValue) -> Self {
        match value {
            ContextValue::User(user) => ArgValue::User(user),
            ContextValue::Chat(chat) => ArgValue::Chat(chat),
        }
    }
}

impl Cutter {
    pub fn optional(inner: Cutter, default: DefaultValue) -> Self {
        Self::Optional {
            inner: Box::new(inner),
            default,
        }
    }

    pub fn cut<'a>(&'a self, ctx: &'a CutContext<'a>, tokens: TokenSeq) -> CutFuture<'a> {
        Box::pin(async move {
            match self {
                Self::Message => Ok(Cut::new(ArgValue::Message(Arc::clone(ctx.event)), tokens)),

                Self::Context(key) => {
                    let value = ctx
                        .event
                        .context
                        .get(key)
                        .cloned()
                        .ok_or(ParamsError::MissingContext(*key))?;
                    Ok(Cut::new(value.into(), tokens))
                }

                Self::Scalar(kind) => cut_scalar(*kind, ctx, tokens),

                Self::Rest => {
                    require_token(&tokens)?;
                    let (text, rest) = tokens.take_rest();
                    Ok(Cut::new(ArgValue::Text(text), rest))
                }

                Self::Optional { inner, default } => {
                    match inner.cut(ctx, tokens.clone()).await {
                        Err(ParamsError::RequiredArgumentMissing) => {
                            Ok(Cut::new(default.produce(), tokens))
                        }
                        other => other,
                    }
                }

                Self::Union(alternatives) => {
                    require_token(&tokens)?;
                    let mut details = Vec::new();
                    for alternative in alternatives {
                        match alternative.cut(ctx, tokens.clone()).await {
                            Ok(cut) => return Ok(cut),
                            Err(e) => details.extend(e.detail()),
                        }
                    }
                    Err(ParamsError::Invalid(
                        (!details.is_empty()).then(|| details.join(" ")),
                    ))
                }

                Self::Literal(values) => {
                    let first = require_token(&tokens)?;
                    match values.iter().find(|value| value.as_str() == first) {
                        Some(value) => Ok(Cut::new(ArgValue::Text(value.clone()), tokens.skip(1))),
                        None => Err(ParamsError::Invalid(None)),
                    }
                }

                Self::Target { allow_bots } => {
                    let (user, rest) = find_target(ctx.event, &tokens, *allow_bots)
                        .ok_or(ParamsError::RequiredArgumentMissing)?;
                    let resolved = {
                        let _guard = match user.id {
                            Some(id) => Some(ctx.locks.acquire(id).await),
                            None => None,
                        };
                        ctx.directory.resolve_or_create(&user).await
                    };
                    let record = resolved.map_err(|e| {
                        tracing::warn!("Target lookup failed for {:?}: {}", user, e);
                        ParamsError::UserLookup(e.to_string())
                    })?;
                    Ok(Cut::new(ArgValue::User(record), rest))
                }
            }
        })
    }
}

fn require_token(tokens: &TokenSeq) -> Result<&str, ParamsError> {
    tokens.first().ok_or(ParamsError::RequiredArgumentMissing)
}

fn cut_scalar(kind: Scalar, ctx: &CutContext<'_>, tokens: TokenSeq) -> Result<Cut, ParamsError> {
    let first = require_token(&tokens)?;

    let value = match kind {
        Scalar::Int => ArgValue::Int(first.parse().map_err(|_| ParamsError::Invalid(None))?),
        Scalar::Float => ArgValue::Float(first.parse().map_err(|_| ParamsError::Invalid(None))?),
        Scalar::Word => ArgValue::Text(first.to_string()),
        Scalar::Duration => {
            let parsed = parse_duration_from_text(&tokens.join(), ctx.durations)?;
            return Ok(Cut::new(
                ArgValue::Duration(parsed.duration),
                tokens.skip(parsed.consumed_tokens()),
            ));
        }
    };

    Ok(Cut::new(value, tokens.skip(1)))
}

impl fmt::Display for Cutter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "<Message>"),
            Self::Context(key) => write!(f, "<Context {}>", key),
            Self::Scalar(kind) => write!(f, "<{:?}>", kind),
            Self::Rest => write!(f, "<Rest>"),
            Self::Optional { inner, .. } => write!(f, "<Optional ({})>", inner),
            Self::Union(alternatives) => {
                let parts: Vec<String> = alternatives.iter().map(|a| a.to_string()).collect();
                write!(f, "<Union ({})>", parts.join(" | "))
            }
            Self::Literal(values) => write!(f, "<Literal ({})>", values.join(" | ")),
            Self::Target { allow_bots: true } => write!(f, "<Target>"),
            Self::Target { allow_bots: false } => write!(f, "<Target no bots>"),
        }
    }
}
