//! Configuration management for the enroller
//!
//! This module handles loading and managing configuration settings
//! for the CLI and for library callers such as a scheduler.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{
    DiscoverySettings, DiscudemySettings, EnrollmentSettings, LoggingSettings, PlatformSettings,
    RealDiscountSettings, Settings,
};
