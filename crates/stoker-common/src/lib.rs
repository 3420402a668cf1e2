//! # Stoker Common
//!
//! Shared error taxonomy and types for the stoker control plane.
//!
//! Every crate in the workspace speaks in terms of [`SupervisorError`]
//! and [`SupervisorResult`]; lifecycle errors (`AlreadyRunning`,
//! `NotRunning`, `DetachedMode`) are expected, recoverable conditions
//! and must never be treated as fatal by callers.

pub mod errors;
pub mod types;

pub use errors::{SupervisorError, SupervisorResult};
pub use types::{LaunchSpec, DEFAULT_JAR_NAME, DEFAULT_MAX_MEMORY_MB};
