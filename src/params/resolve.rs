//! Registration-time compilation of parameter declarations into cutters
//!
//! Each handler declares its parameters as [`ParamSpec`]s. [`resolve_params`]
//! maps every declared shape to a [`Cutter`] once; the result is cached on the
//! command and reused for every invocation.

use std::fmt;
use std::sync::Arc;

use crate::command::RegistrationError;
use crate::core::types::ContextData;

use super::cutter::{Cutter, Scalar};
use super::value::{ArgValue, DefaultValue};

/// Declared shape of a handler parameter
#[derive(Debug, Clone)]
pub enum ParamShape {
    /// The inbound message
    Message,
    /// The chat the command was sent in
    Chat,
    /// A user; the parameter name decides whether it is the sender or a target
    User,
    Int,
    Float,
    /// One word, or the rest of the line for keyword-only parameters
    Str,
    Duration,
    /// `T` or absent
    Optional(Box<ParamShape>),
    /// Closed alternative of scalar shapes, tried left to right
    Union(Vec<ParamShape>),
    /// One of a fixed set of words
    Literal(Vec<String>),
    /// A ready-made cutter used as-is
    Cutter(Cutter),
}

impl ParamShape {
    pub fn optional(inner: ParamShape) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn literal<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Literal(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Chat => write!(f, "chat"),
            Self::User => write!(f, "user"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "str"),
            Self::Duration => write!(f, "duration"),
            Self::Optional(inner) => write!(f, "optional {}", inner),
            Self::Union(branches) => {
                let parts: Vec<String> = branches.iter().map(|b| b.to_string()).collect();
                write!(f, "union [{}]", parts.join(", "))
            }
            Self::Literal(values) => write!(f, "literal [{}]", values.join(", ")),
            Self::Cutter(cutter) => write!(f, "{}", cutter),
        }
    }
}

/// Declaration of one handler parameter
///
/// `label` and `help` are shown to the user when the argument is missing or
/// malformed; without a label the explanation is left out entirely.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub shape: ParamShape,
    pub keyword_only: bool,
    pub label: Option<String>,
    pub help: Option<String>,
    pub default: Option<DefaultValue>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, shape: ParamShape) -> Self {
        Self {
            name: name.into(),
            shape,
            keyword_only: false,
            label: None,
            help: None,
            default: None,
        }
    }

    pub fn keyword_only(mut self) -> Self {
        self.keyword_only = true;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn default(mut self, value: ArgValue) -> Self {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    /// Default computed afresh on every invocation
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> ArgValue + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    /// Help text prefixed with a newline, or empty
    pub(crate) fn help_suffix(&self) -> String {
        match self.help.as_deref() {
            Some(help) if !help.is_empty() => format!("\n{}", help),
            _ => String::new(),
        }
    }
}

/// A parameter with its compiled cutter
#[derive(Debug, Clone)]
pub struct CompiledParam {
    pub name: String,
    pub cutter: Cutter,
    pub spec: ParamSpec,
}

impl fmt::Display for CompiledParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Param {} cutter={}>", self.name, self.cutter)
    }
}

/// Compile a handler's parameters, in declaration order
pub fn resolve_params(
    handler: &str,
    specs: Vec<ParamSpec>,
) -> Result<Vec<CompiledParam>, RegistrationError> {
    let params = specs
        .into_iter()
        .map(|spec| {
            let cutter = resolve_param(&spec)?;
            Ok(CompiledParam {
                name: spec.name.clone(),
                cutter,
                spec,
            })
        })
        .collect::<Result<Vec<_>, RegistrationError>>()?;

    tracing::trace!(
        "Handler {} params setup finished: [{}]",
        handler,
        params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(params)
}

/// Compile one parameter
///
/// A parameter with a default is treated as optional even when its shape
/// does not say so.
pub fn resolve_param(spec: &ParamSpec) -> Result<Cutter, RegistrationError> {
    let cutter = resolve_shape(spec, &spec.shape, spec.keyword_only)?;

    Ok(match (&spec.default, cutter) {
        (Some(_), cutter @ Cutter::Optional { .. }) => cutter,
        (Some(default), cutter) => Cutter::optional(cutter, default.clone()),
        (None, cutter) => cutter,
    })
}

fn resolve_shape(
    spec: &ParamSpec,
    shape: &ParamShape,
    rest_of_line: bool,
) -> Result<Cutter, RegistrationError> {
    let unresolvable = || RegistrationError::UnresolvableParameterType {
        param: spec.name.clone(),
        shape: shape.to_string(),
    };

    let cutter = match shape {
        ParamShape::Message => Cutter::Message,
        ParamShape::Chat => Cutter::Context(ContextData::CHAT),
        ParamShape::User => match spec.name.as_str() {
            "target" => Cutter::Target { allow_bots: true },
            "target_user" => Cutter::Target { allow_bots: false },
            _ => Cutter::Context(ContextData::USER),
        },
        ParamShape::Int => Cutter::Scalar(Scalar::Int),
        ParamShape::Float => Cutter::Scalar(Scalar::Float),
        ParamShape::Duration => Cutter::Scalar(Scalar::Duration),
        ParamShape::Str if rest_of_line => Cutter::Rest,
        ParamShape::Str => Cutter::Scalar(Scalar::Word),

        ParamShape::Optional(inner) => {
            if matches!(**inner, ParamShape::Optional(_)) {
                return Err(unresolvable());
            }
            Cutter::optional(
                resolve_shape(spec, inner, rest_of_line)?,
                spec.default.clone().unwrap_or_default(),
            )
        }

        ParamShape::Union(branches) => {
            if branches.len() < 2 {
                return Err(unresolvable());
            }
            let cutters = branches
                .iter()
                .map(|branch| resolve_shape(spec, branch, false))
                .collect::<Result<Vec<_>, _>>()?;
            if !cutters.iter().all(is_scalar) {
                return Err(unresolvable());
            }
            Cutter::Union(cutters)
        }

        ParamShape::Literal(values) if values.is_empty() => return Err(unresolvable()),
        ParamShape::Literal(values) => Cutter::Literal(values.clone()),

        ParamShape::Cutter(cutter) => cutter.clone(),
    };
    Ok(cutter)
}

fn is_scalar(cutter: &Cutter) -> bool {
    matches!(cutter, Cutter::Scalar(_) | Cutter::Literal(_))
}
