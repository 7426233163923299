//! Error types for timer lifecycle operations.

use thiserror::Error;

use bosswatch_core::TimeError;

/// Errors surfaced by [`crate::TimerController`] operations.
///
/// Validation failures are reported to the caller for user-facing messaging;
/// persistence and scheduling problems never appear here — they are logged
/// and the in-memory state stays authoritative.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    /// The alias did not resolve to any catalog entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The time fragment did not parse.
    #[error(transparent)]
    InvalidTime(#[from] TimeError),

    /// A manually added spawn time was not ahead of now.
    #[error("spawn time must be in the future")]
    NotFuture,

    /// The scope may not register timers (whitelist denial).
    #[error("scope is not enabled for timers")]
    ScopeDisabled,

    /// The group's entity filter excludes this entity.
    #[error("entity is not allowed in this group")]
    EntityFiltered,

    /// Group-scope reset without the caller-supplied privilege signal.
    #[error("reset requires group admin privileges")]
    NotPrivileged,
}
