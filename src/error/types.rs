//! Error type definitions
//!
//! Defines the main error types used throughout the enroller, following the
//! failure taxonomy callers branch on: authentication, browser storage,
//! per-source discovery, transient network and rate limiting.

use std::time::Duration;
use thiserror::Error;

/// Why an authentication attempt or an authenticated call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Input rejected before anything was sent (empty identifier or secret)
    MalformedInput,
    /// The platform rejected the identifier/secret pair
    BadCredentials,
    /// Browser cookies did not resolve to a logged-in identity
    NoBrowserSession,
    /// A previously valid session stopped being accepted
    SessionExpired,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AuthFailure::MalformedInput => "malformed input",
            AuthFailure::BadCredentials => "bad credentials",
            AuthFailure::NoBrowserSession => "no usable browser session",
            AuthFailure::SessionExpired => "session expired",
        };
        f.write_str(text)
    }
}

/// Main error type for the enroller
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failures, terminal for the session they concern
    #[error("Authentication error ({kind}): {reason}")]
    Auth { kind: AuthFailure, reason: String },

    /// Browser cookie storage was locked, absent or held no platform cookies
    #[error("Cookie access error for {browser}: {reason}")]
    CookieAccess { browser: String, reason: String },

    /// No cookie adapter exists for the requested browser
    #[error("Unsupported browser: {browser}")]
    UnsupportedBrowser { browser: String },

    /// A single course source failed; never fatal to discovery as a whole
    #[error("Source error [{source_id}]: {message}")]
    Source { source_id: String, message: String },

    /// Every configured source failed or none were configured
    #[error("No usable course sources")]
    NoUsableSources,

    /// No installed browser yielded a usable session
    #[error("No usable browsers: {0}")]
    NoUsableBrowsers(String),

    /// The remote platform asked us to slow down
    #[error("Rate limited by remote platform")]
    RateLimited { retry_after: Option<Duration> },

    /// Transient transport failure outside reqwest (timeouts, resets)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation stopped by cooperative cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// Network/HTTP client errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Browser SQLite store errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn auth(kind: AuthFailure, reason: impl Into<String>) -> Self {
        Self::Auth {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a cookie access error
    pub fn cookie_access(browser: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CookieAccess {
            browser: browser.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported browser error
    pub fn unsupported_browser(browser: impl Into<String>) -> Self {
        Self::UnsupportedBrowser {
            browser: browser.into(),
        }
    }

    /// Create a source error
    pub fn source(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller may retry the same operation.
    ///
    /// Timeouts surface as [`Error::Network`] and are retryable like any other
    /// transient transport failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Transport(_) | Error::RateLimited { .. }
        )
    }

    /// The authentication failure kind, if this is an auth error
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            Error::Auth { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
