//! Command registration and dispatch
//!
//! Event -> Dispatcher -> [ContextLoader -> CommandLog -> Throttle -> PermissionCheck] -> bind -> body

pub mod dispatcher;
pub mod middleware;
pub mod registry;

pub use dispatcher::{Dispatcher, Middleware, Next, Outcome, Services};
pub use middleware::{CommandLog, ContextLoader, PermissionCheck, Throttle};
pub use registry::{
    BodyResult, Command, CommandBody, CommandRegistry, CommandSpec, HandlerError, RateLimit,
    RegistrationError,
};
