//! Timer lifecycle orchestration for bosswatch.
//!
//! The [`TimerController`] ties the core pieces together: on a death report
//! it resolves the entity and death time, checks permissions, computes the
//! spawn time, replaces any previous timer for the same (scope, entity) pair,
//! persists the store, and (re)schedules reminders. Cancel and reset tear the
//! same state down symmetrically.

mod controller;
mod error;
pub mod format;
mod transport;

pub use controller::{ResetOutcome, TimerController};
pub use error::AgentError;
pub use transport::{Transport, TransportError, reminder_sink};
