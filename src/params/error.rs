use thiserror::Error;

use super::duration::DurationError;

/// Failure of a single cutter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamsError {
    /// No token left for an argument that needs one. Never shown to users
    /// as-is; the binder turns it into [`InvalidArguments`].
    #[error("required argument was not passed")]
    RequiredArgumentMissing,

    #[error("context value `{0}` is not available")]
    MissingContext(&'static str),

    #[error("invalid argument value")]
    Invalid(Option<String>),

    #[error("invalid duration format: {0}")]
    InvalidFormatDuration(String),

    #[error("duration is too long")]
    ToLongDuration,

    #[error("user lookup failed: {0}")]
    UserLookup(String),
}

impl ParamsError {
    /// Extra text shown to the user after the parameter description
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Invalid(text) => text.clone(),
            Self::ToLongDuration => Some("The duration is too long.".into()),
            Self::UserLookup(_) => Some("Could not fetch user data.".into()),
            Self::RequiredArgumentMissing
            | Self::MissingContext(_)
            | Self::InvalidFormatDuration(_) => None,
        }
    }
}

impl From<DurationError> for ParamsError {
    fn from(e: DurationError) -> Self {
        match e {
            DurationError::Empty => Self::RequiredArgumentMissing,
            DurationError::InvalidFormat(text) => Self::InvalidFormatDuration(text),
            DurationError::TooLong => Self::ToLongDuration,
        }
    }
}

/// The only binding failure users ever see
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid command usage.{}{}", render_explanation(.explanation), render_usage(.usage))]
pub struct InvalidArguments {
    pub explanation: Option<String>,
    pub usage: Option<String>,
}

impl InvalidArguments {
    pub fn new(explanation: Option<String>) -> Self {
        Self {
            explanation,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Option<String>) -> Self {
        self.usage = usage;
        self
    }
}

fn render_explanation(explanation: &Option<String>) -> String {
    match explanation.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!("\n{}", text),
        _ => String::new(),
    }
}

fn render_usage(usage: &Option<String>) -> String {
    match usage {
        Some(pattern) if !pattern.is_empty() => format!("\nUsage: {}", pattern),
        _ => String::new(),
    }
}
