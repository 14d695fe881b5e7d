//! Binder: drives a compiled pipeline over a live event

use std::sync::Arc;

use crate::command::RegistrationError;
use crate::core::config::DurationConfig;
use crate::core::types::Event;
use crate::locks::LockRegistry;
use crate::services::UserDirectory;

use super::cutter::CutContext;
use super::error::{InvalidArguments, ParamsError};
use super::resolve::{resolve_params, CompiledParam, ParamSpec};
use super::tokens::TokenSeq;
use super::value::BoundArgs;

/// A handler's compiled parameter pipeline plus its usage pattern
#[derive(Debug, Clone)]
pub struct CompiledHandler {
    pub name: String,
    pub usage: Option<String>,
    pub params: Vec<CompiledParam>,
}

impl CompiledHandler {
    pub fn compile(
        name: impl Into<String>,
        usage: Option<String>,
        specs: Vec<ParamSpec>,
    ) -> Result<Self, RegistrationError> {
        let name = name.into();
        let params = resolve_params(&name, specs)?;
        Ok(Self {
            name,
            usage,
            params,
        })
    }

    /// Bind the event's command arguments to the declared parameters
    ///
    /// Every token must be consumed; leftovers are a usage error. Users
    /// named in the arguments are resolved under their `locks` entry.
    pub async fn bind(
        &self,
        event: &Arc<Event>,
        directory: &dyn UserDirectory,
        locks: &LockRegistry<i64>,
        durations: &DurationConfig,
    ) -> Result<BoundArgs, InvalidArguments> {
        let ctx = CutContext {
            event,
            directory,
            locks,
            durations,
        };
        self.bind_tokens(&ctx, TokenSeq::from_text(event.command_args()))
            .await
            .map_err(|e| e.with_usage(self.usage.clone()))
    }

    async fn bind_tokens(
        &self,
        ctx: &CutContext<'_>,
        mut tokens: TokenSeq,
    ) -> Result<BoundArgs, InvalidArguments> {
        let mut args = BoundArgs::new();

        for param in &self.params {
            match param.cutter.cut(ctx, tokens.clone()).await {
                Ok(cut) => {
                    tokens = cut.rest;
                    args.insert(param.name.clone(), cut.value);
                }
                Err(e) => return Err(explain(param, e)),
            }
        }

        tracing::trace!(
            "Making params for handler {} finished: {{{}}}",
            self.name,
            self.params
                .iter()
                .filter_map(|p| args.get(&p.name).map(|v| format!("{}={}", p.name, v)))
                .collect::<Vec<_>>()
                .join(", ")
        );

        if !tokens.is_empty() {
            return Err(InvalidArguments::new(None));
        }
        Ok(args)
    }
}

fn explain(param: &CompiledParam, error: ParamsError) -> InvalidArguments {
    let Some(label) = param.spec.label.as_deref() else {
        return InvalidArguments::new(None);
    };
    let help = param.spec.help_suffix();

    let explanation = match error {
        ParamsError::RequiredArgumentMissing => {
            format!("No value passed for required parameter {}.{}", label, help)
        }
        other => format!(
            "Invalid value for parameter {}.{} {}",
            label,
            help,
            other.detail().unwrap_or_default()
        ),
    };
    InvalidArguments::new(Some(explanation))
}
