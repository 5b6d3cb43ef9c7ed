//! Version information

/// Crate version from Cargo metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the crate version
pub fn get_version() -> &'static str {
    VERSION
}

/// `coupon-enroller/<version>`
pub fn user_agent_product() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), VERSION)
}
