//! Built-in commands

pub mod games;
pub mod moderation;

use crate::command::{CommandRegistry, RegistrationError};

pub use games::{choice_command, random_command};
pub use moderation::{mute_command, unmute_command};

/// Register every built-in command
pub fn register_all(registry: &mut CommandRegistry) -> Result<(), RegistrationError> {
    registry.register(mute_command())?;
    registry.register(unmute_command())?;
    registry.register(random_command())?;
    registry.register(choice_command())?;
    Ok(())
}
