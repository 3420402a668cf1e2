//! # Stoker Management
//!
//! The panel-level layer: configuration loading, the instance
//! registry, and the adapters that plug both into the RCON surface.

pub mod auth;
pub mod config;
pub mod manager;

pub use auth::StaticPasswordVerifier;
pub use config::{InstanceConfig, PanelConfig, PanelOptions, RconOptions};
pub use manager::{InstanceHandle, InstanceManager};
