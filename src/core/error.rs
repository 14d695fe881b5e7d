use thiserror::Error;

use crate::command::RegistrationError;

/// Failures that abort startup
#[derive(Error, Debug)]
pub enum ModguardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModguardError>;
