//! Routing of inbound messages through the middleware chain to a command

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::{Config, DurationConfig};
use crate::core::types::Event;
use crate::locks::LockRegistry;
use crate::services::{ChatMembers, MessageDelivery, UserDirectory};
use crate::throttle::ThrottleCoordinator;

use super::middleware::{CommandLog, ContextLoader, PermissionCheck, Throttle};
use super::registry::{Command, CommandRegistry};

/// How a dispatched message ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a command, or not one of ours
    Ignored,
    /// The body ran and produced this reply
    Replied(String),
    /// Arguments could not be bound; the usage message
    Rejected(String),
    /// A middleware stopped the message
    Cancelled,
    /// The body or a collaborator failed
    Failed(String),
}

/// One stage of the chain around every command
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, event: Event, command: &Command, next: Next<'_>) -> Outcome;
}

/// The remainder of the chain after the current stage
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    endpoint: &'a Endpoint,
}

impl Next<'_> {
    pub async fn run(self, event: Event, command: &Command) -> Outcome {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                };
                stage.handle(event, command, next).await
            }
            None => self.endpoint.invoke(event, command).await,
        }
    }
}

/// Final stage: bind the arguments and run the body
struct Endpoint {
    directory: Arc<dyn UserDirectory>,
    locks: Arc<LockRegistry<i64>>,
    durations: DurationConfig,
}

impl Endpoint {
    async fn invoke(&self, event: Event, command: &Command) -> Outcome {
        let event = Arc::new(event);
        let args = match command
            .handler
            .bind(&event, self.directory.as_ref(), &self.locks, &self.durations)
            .await
        {
            Ok(args) => args,
            Err(e) => return Outcome::Rejected(e.to_string()),
        };

        match command.body.run(args).await {
            Ok(reply) => Outcome::Replied(reply),
            Err(e) => {
                tracing::warn!("/{} failed: {}", command.name(), e);
                Outcome::Failed(e.to_string())
            }
        }
    }
}

/// Shared collaborators, built once at startup
#[derive(Clone)]
pub struct Services {
    pub directory: Arc<dyn UserDirectory>,
    pub delivery: Arc<dyn MessageDelivery>,
    pub members: Arc<dyn ChatMembers>,
    pub locks: Arc<LockRegistry<i64>>,
    pub throttle: Arc<ThrottleCoordinator>,
}

impl Services {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        delivery: Arc<dyn MessageDelivery>,
        members: Arc<dyn ChatMembers>,
        config: &Config,
    ) -> Self {
        Self {
            throttle: Arc::new(ThrottleCoordinator::new(
                Arc::clone(&delivery),
                config.throttle.clone(),
            )),
            locks: Arc::new(LockRegistry::new()),
            directory,
            delivery,
            members,
        }
    }
}

pub struct Dispatcher {
    registry: CommandRegistry,
    stages: Vec<Arc<dyn Middleware>>,
    endpoint: Endpoint,
    delivery: Arc<dyn MessageDelivery>,
}

impl Dispatcher {
    /// Dispatcher with the standard chain: context loader, command log,
    /// throttle, permission check
    pub fn new(registry: CommandRegistry, services: &Services, config: &Config) -> Self {
        Self::bare(registry, services, config)
            .with_middleware(ContextLoader::new(
                Arc::clone(&services.directory),
                Arc::clone(&services.locks),
            ))
            .with_middleware(CommandLog)
            .with_middleware(Throttle::new(Arc::clone(&services.throttle)))
            .with_middleware(PermissionCheck::new(
                Arc::clone(&services.members),
                Arc::clone(&services.delivery),
                config.permissions.clone(),
            ))
    }

    /// Dispatcher without any middleware
    pub fn bare(registry: CommandRegistry, services: &Services, config: &Config) -> Self {
        Self {
            registry,
            stages: Vec::new(),
            endpoint: Endpoint {
                directory: Arc::clone(&services.directory),
                locks: Arc::clone(&services.locks),
                durations: config.duration.clone(),
            },
            delivery: Arc::clone(&services.delivery),
        }
    }

    /// Append a stage; stages run in the order they were added
    pub fn with_middleware(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Run one inbound message to completion
    ///
    /// Replies and usage errors are sent back to the chat as a reply to the
    /// triggering message.
    pub async fn dispatch(&self, event: Event) -> Outcome {
        let Some((name, _)) = event.command() else {
            return Outcome::Ignored;
        };
        let Some(command) = self.registry.get(&name) else {
            tracing::debug!("Unknown command /{}", name);
            return Outcome::Ignored;
        };

        let chat_id = event.chat_id;
        let reply_to = Some(event.message_id);
        let next = Next {
            stages: &self.stages,
            endpoint: &self.endpoint,
        };
        let outcome = next.run(event, &command).await;

        if let Outcome::Replied(text) | Outcome::Rejected(text) = &outcome {
            if let Err(e) = self.delivery.send(chat_id, reply_to, text).await {
                tracing::warn!("Could not deliver reply to /{}: {}", command.name(), e);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::registry::{BodyResult, CommandSpec};
    use crate::core::types::PlatformUser;
    use crate::params::{BoundArgs, ParamShape, ParamSpec};
    use crate::services::{InMemoryDirectory, InMemoryMembers, RecordingDelivery};

    async fn double(args: BoundArgs) -> BodyResult {
        let n = args.int("n").unwrap_or_default();
        Ok(format!("{}", n * 2))
    }

    struct Stop;

    #[async_trait]
    impl Middleware for Stop {
        async fn handle(&self, _event: Event, _command: &Command, _next: Next<'_>) -> Outcome {
            Outcome::Cancelled
        }
    }

    fn setup() -> (CommandRegistry, Services, Arc<RecordingDelivery>) {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                CommandSpec::new("double", double)
                    .usage("/double <n>")
                    .param(ParamSpec::new("n", ParamShape::Int).label("n")),
            )
            .unwrap();
        let delivery = Arc::new(RecordingDelivery::new());
        let services = Services::new(
            Arc::new(InMemoryDirectory::new()),
            delivery.clone(),
            Arc::new(InMemoryMembers::new(0)),
            &Config::default(),
        );
        (registry, services, delivery)
    }

    fn message(text: &str) -> Event {
        let mut event = Event::new(-1, PlatformUser::by_id(5), text);
        event.message_id = 100;
        event
    }

    #[tokio::test]
    async fn test_bare_dispatch_replies() {
        let (registry, services, delivery) = setup();
        let dispatcher = Dispatcher::bare(registry, &services, &Config::default());

        let outcome = dispatcher.dispatch(message("/double 21")).await;
        assert_eq!(outcome, Outcome::Replied("42".into()));
        let sent = delivery.sent();
        assert_eq!(sent[0].text, "42");
        assert_eq!(sent[0].reply_to, Some(100));
    }

    #[tokio::test]
    async fn test_usage_error_is_sent() {
        let (registry, services, delivery) = setup();
        let dispatcher = Dispatcher::bare(registry, &services, &Config::default());

        let outcome = dispatcher.dispatch(message("/double")).await;
        let expected = "Invalid command usage.\nNo value passed for required parameter n.\nUsage: /double <n>";
        assert_eq!(outcome, Outcome::Rejected(expected.into()));
        assert_eq!(delivery.sent()[0].text, expected);
    }

    #[tokio::test]
    async fn test_non_commands_are_ignored() {
        let (registry, services, delivery) = setup();
        let dispatcher = Dispatcher::bare(registry, &services, &Config::default());

        assert_eq!(dispatcher.dispatch(message("hello")).await, Outcome::Ignored);
        assert_eq!(dispatcher.dispatch(message("/triple 2")).await, Outcome::Ignored);
        assert!(delivery.sent().is_empty());
    }

    #[tokio::test]
    async fn test_middleware_can_stop_chain() {
        let (registry, services, delivery) = setup();
        let dispatcher =
            Dispatcher::bare(registry, &services, &Config::default()).with_middleware(Stop);

        assert_eq!(dispatcher.dispatch(message("/double 1")).await, Outcome::Cancelled);
        assert!(delivery.sent().is_empty());
    }
}
