//! Modguard - chat moderation assistant core
//!
//! Typed command-argument binding, per-key async locks with idle eviction,
//! and command throttling with self-cleaning notices.

pub mod command;
pub mod core;
pub mod handlers;
pub mod locks;
pub mod params;
pub mod services;
pub mod throttle;
