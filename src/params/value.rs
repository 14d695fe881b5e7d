//! Values produced by cutters and the keyword-argument map handed to handlers

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;

use crate::core::types::{DomainChat, DomainUser, Event};

use super::duration::format_duration;

#[derive(Debug, Clone)]
pub enum ArgValue {
    Message(Arc<Event>),
    User(DomainUser),
    Chat(DomainChat),
    Int(i64),
    Float(f64),
    Text(String),
    Duration(Duration),
    /// An optional argument that was not given and has no default
    Absent,
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(event) => write!(f, "<message {}>", event.message_id),
            Self::User(user) => write!(f, "{}", user),
            Self::Chat(chat) => write!(f, "{}", chat),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(text) => write!(f, "{:?}", text),
            Self::Duration(d) => write!(f, "{}", format_duration(*d)),
            Self::Absent => write!(f, "none"),
        }
    }
}

/// Default for an optional parameter
#[derive(Clone)]
pub enum DefaultValue {
    Value(ArgValue),
    Factory(Arc<dyn Fn() -> ArgValue + Send + Sync>),
}

impl DefaultValue {
    pub fn produce(&self) -> ArgValue {
        match self {
            Self::Value(value) => value.clone(),
            Self::Factory(factory) => factory(),
        }
    }
}

impl Default for DefaultValue {
    fn default() -> Self {
        Self::Value(ArgValue::Absent)
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Arguments bound for one handler invocation, keyed by parameter name
///
/// Accessors return `None` both for unknown names and for a value of a
/// different kind; `Absent` optionals also read as `None`.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    values: AHashMap<String, ArgValue>,
}

impl BoundArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn message(&self, name: &str) -> Option<&Event> {
        match self.get(name)? {
            ArgValue::Message(event) => Some(event.as_ref()),
            _ => None,
        }
    }

    pub fn user(&self, name: &str) -> Option<&DomainUser> {
        match self.get(name)? {
            ArgValue::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn chat(&self, name: &str) -> Option<&DomainChat> {
        match self.get(name)? {
            ArgValue::Chat(chat) => Some(chat),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ArgValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ArgValue::Float(x) => Some(*x),
            ArgValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ArgValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn duration(&self, name: &str) -> Option<Duration> {
        match self.get(name)? {
            ArgValue::Duration(d) => Some(*d),
            _ => None,
        }
    }
}
