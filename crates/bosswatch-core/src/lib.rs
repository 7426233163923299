//! Core types and state for bosswatch.
//!
//! This crate provides the pieces of the boss timer that hold no scheduling
//! logic of their own:
//! - The entity catalog (aliases, respawn durations, display metadata)
//! - The clock resolver for user-supplied time fragments
//! - The permission/visibility gate over group and private scopes
//! - The snapshot-backed timer store

mod catalog;
mod clock;
mod config;
mod error;
mod permission;
mod store;
mod types;

pub use catalog::{EntityCatalog, EntityDef};
pub use clock::{resolve_absolute, resolve_relative};
pub use config::BotConfig;
pub use error::{StoreError, TimeError};
pub use permission::{GroupSet, allowed_entities, group_enabled, group_set, is_core, user_enabled, visible};
pub use store::TimerStore;
pub use types::{Scope, Timer};
