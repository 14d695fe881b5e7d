//! Command declarations and the registry that compiles them

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use thiserror::Error;

use crate::params::{BoundArgs, CompiledHandler, ParamSpec};
use crate::services::Permission;

/// Startup failures while registering commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("can't resolve cutter for parameter `{param}` ({shape})")]
    UnresolvableParameterType { param: String, shape: String },

    #[error("command /{0} is already registered")]
    DuplicateCommand(String),

    #[error("command declared without a name")]
    Unnamed,
}

/// Failure inside a command body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("argument `{0}` was not bound")]
    MissingArgument(&'static str),

    #[error("{0}")]
    Failed(String),
}

/// Reply text produced by a command body
pub type BodyResult = std::result::Result<String, HandlerError>;

/// The code run once a command's arguments are bound
#[async_trait]
pub trait CommandBody: Send + Sync {
    async fn run(&self, args: BoundArgs) -> BodyResult;
}

#[async_trait]
impl<F, Fut> CommandBody for F
where
    F: Fn(BoundArgs) -> Fut + Send + Sync,
    Fut: Future<Output = BodyResult> + Send + 'static,
{
    async fn run(&self, args: BoundArgs) -> BodyResult {
        (self)(args).await
    }
}

/// Per-command cooldown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimit {
    /// One call per `limit`
    pub limit: Duration,
    /// Throttle key shared by every command declaring it; defaults to one
    /// derived from the command name
    pub key: Option<String>,
}

/// Declaration of a command, before compilation
pub struct CommandSpec {
    pub names: Vec<String>,
    pub usage: Option<String>,
    pub rate_limit: Option<RateLimit>,
    /// Rights both the caller and the bot must hold in the chat
    pub required_permissions: Vec<Permission>,
    pub params: Vec<ParamSpec>,
    pub body: Arc<dyn CommandBody>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, body: impl CommandBody + 'static) -> Self {
        Self {
            names: vec![name.into()],
            usage: None,
            rate_limit: None,
            required_permissions: Vec::new(),
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Pattern shown after an "Invalid command usage." reply
    pub fn usage(mut self, pattern: impl Into<String>) -> Self {
        self.usage = Some(pattern.into());
        self
    }

    pub fn rate_limit(mut self, limit: Duration) -> Self {
        self.rate_limit = Some(RateLimit { limit, key: None });
        self
    }

    pub fn rate_limit_keyed(mut self, limit: Duration, key: impl Into<String>) -> Self {
        self.rate_limit = Some(RateLimit {
            limit,
            key: Some(key.into()),
        });
        self
    }

    pub fn require(mut self, permission: Permission) -> Self {
        if !self.required_permissions.contains(&permission) {
            self.required_permissions.push(permission);
        }
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }
}

/// A registered command with its compiled parameter pipeline
pub struct Command {
    pub names: Vec<String>,
    pub handler: CompiledHandler,
    pub rate_limit: Option<RateLimit>,
    pub required_permissions: Vec<Permission>,
    pub body: Arc<dyn CommandBody>,
}

impl Command {
    /// Primary name
    pub fn name(&self) -> &str {
        &self.handler.name
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<Command>>,
    by_name: AHashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and add a command
    ///
    /// Parameter resolution happens here, once; a shape that can't be bound
    /// is reported now rather than on the first call.
    pub fn register(&mut self, spec: CommandSpec) -> Result<Arc<Command>, RegistrationError> {
        let names: Vec<String> = spec.names.iter().map(|n| n.to_lowercase()).collect();
        let primary = names.first().cloned().ok_or(RegistrationError::Unnamed)?;

        if let Some(taken) = names.iter().find(|n| self.by_name.contains_key(n.as_str())) {
            return Err(RegistrationError::DuplicateCommand(taken.clone()));
        }

        let handler = CompiledHandler::compile(primary, spec.usage, spec.params)?;
        let command = Arc::new(Command {
            names,
            handler,
            rate_limit: spec.rate_limit,
            required_permissions: spec.required_permissions,
            body: spec.body,
        });

        let index = self.commands.len();
        for name in &command.names {
            self.by_name.insert(name.clone(), index);
        }
        self.commands.push(Arc::clone(&command));
        tracing::debug!("Registered /{}", command.name());
        Ok(command)
    }

    /// Look up by name or alias, case-insensitively
    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        let index = self.by_name.get(name.to_lowercase().as_str())?;
        self.commands.get(*index).cloned()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamShape;

    async fn echo(args: BoundArgs) -> BodyResult {
        Ok(args.text("word").unwrap_or_default().to_string())
    }

    #[test]
    fn test_register_and_lookup_aliases() {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                CommandSpec::new("Echo", echo)
                    .alias("say")
                    .param(ParamSpec::new("word", ParamShape::Str)),
            )
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().name(), "echo");
        assert!(registry.get("echo").unwrap().required_permissions.is_empty());
        assert_eq!(registry.get("SAY").unwrap().name(), "echo");
        assert!(registry.get("shout").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandSpec::new("echo", echo)).unwrap();
        let err = registry
            .register(CommandSpec::new("repeat", echo).alias("echo"))
            .err()
            .unwrap();
        assert_eq!(err, RegistrationError::DuplicateCommand("echo".into()));
        assert!(registry.get("repeat").is_none());
    }

    #[test]
    fn test_bad_parameter_fails_registration() {
        let mut registry = CommandRegistry::new();
        let err = registry
            .register(
                CommandSpec::new("bad", echo)
                    .param(ParamSpec::new("x", ParamShape::Union(vec![ParamShape::Int]))),
            )
            .err()
            .unwrap();
        assert!(matches!(err, RegistrationError::UnresolvableParameterType { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_required_permissions_deduplicated() {
        let mut registry = CommandRegistry::new();
        let command = registry
            .register(
                CommandSpec::new("kick", echo)
                    .require(Permission::RestrictMembers)
                    .require(Permission::DeleteMessages)
                    .require(Permission::RestrictMembers),
            )
            .unwrap();
        assert_eq!(
            command.required_permissions,
            vec![Permission::RestrictMembers, Permission::DeleteMessages]
        );
    }

    #[tokio::test]
    async fn test_function_body() {
        let mut args = BoundArgs::new();
        args.insert("word", crate::params::ArgValue::Text("hi".into()));
        assert_eq!(echo.run(args).await.unwrap(), "hi");
    }
}
