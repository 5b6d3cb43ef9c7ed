//! Session management for the course platform
//!
//! This module builds authenticated platform clients from browser cookies or
//! credentials, validates them, and tracks their lifecycle.

pub mod manager;
pub mod platform;
pub mod state;

pub use manager::SessionManager;
pub use platform::{ApiResponse, EnrolledPage, PlatformApi, PlatformClient};
pub use state::{Identity, Session, SessionAuth, SessionState, ValidatedSession};
