//! Runtime configuration with documented constants
//!
//! Every tuning knob the binding, locking and throttling layers use is
//! collected here. Values are loaded from TOML; any missing section or field
//! falls back to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{ModguardError, Result};

/// Top-level configuration, constructed once at startup and handed to every
/// component that needs it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub duration: DurationConfig,
    pub throttle: ThrottleConfig,
    pub locks: LockConfig,
    pub permissions: PermissionConfig,
    pub logging: LoggingConfig,
}

/// Duration parser tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationConfig {
    /// Shortest restriction that can be issued (seconds)
    ///
    /// Anything parsed at or below this value is raised to exactly this
    /// value. Restrictions of a few seconds are indistinguishable from no
    /// restriction for the people in the chat.
    pub floor_secs: u64,

    /// Consecutive non-matching prefixes tolerated while growing a candidate
    ///
    /// The parser extends its candidate one token at a time. Once this many
    /// extensions in a row fail to parse, the trailing text is treated as
    /// something else (a comment, usually) and the scan stops.
    pub max_consecutive_failures: u32,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            floor_secs: 30,
            max_consecutive_failures: 3,
        }
    }
}

impl DurationConfig {
    pub fn floor(&self) -> Duration {
        Duration::from_secs(self.floor_secs)
    }
}

/// Command throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Cooldown applied to commands without an explicit rate limit (seconds)
    pub default_limit_secs: u64,

    /// Prefix of the throttle key derived from a command name
    pub key_prefix: String,

    /// Highest consecutive-call count that still produces a notice
    ///
    /// A successful call counts as 1, so the default of 2 posts exactly one
    /// notice per burst: on the first blocked call.
    pub notice_threshold: u32,

    /// Text of the transient "blocked" notice
    pub notice_text: String,

    /// Interval between passes that drop keys whose cooldown has run out
    /// (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            default_limit_secs: 1,
            key_prefix: "antiflood_".into(),
            notice_threshold: 2,
            notice_text: "Command temporarily blocked".into(),
            sweep_interval_secs: 60,
        }
    }
}

impl ThrottleConfig {
    pub fn default_limit(&self) -> Duration {
        Duration::from_secs(self.default_limit_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Lock registry maintenance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Interval between sweeps that evict unheld locks (seconds)
    ///
    /// Registry entries are never removed by their holders; this sweep is
    /// the only thing bounding the map's growth.
    pub sweep_interval_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 1800,
        }
    }
}

impl LockConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Administrator-rights checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Reply sent when the bot itself lacks the rights a command needs
    pub bot_missing_rights_text: String,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            bot_missing_rights_text: "Give me the matching admin rights so I can moderate this chat"
                .into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "modguard=info".into(),
        }
    }
}

impl Config {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate().map_err(ModguardError::Config)?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.duration.max_consecutive_failures == 0 {
            return Err("duration.max_consecutive_failures must be at least 1".into());
        }

        // A zero interval would turn the sweeper into a busy loop
        if self.locks.sweep_interval_secs == 0 {
            return Err("locks.sweep_interval_secs must be positive".into());
        }
        if self.throttle.sweep_interval_secs == 0 {
            return Err("throttle.sweep_interval_secs must be positive".into());
        }

        if self.throttle.notice_text.trim().is_empty() {
            return Err("throttle.notice_text must not be empty".into());
        }
        if self.permissions.bot_missing_rights_text.trim().is_empty() {
            return Err("permissions.bot_missing_rights_text must not be empty".into());
        }

        Ok(())
    }
}
