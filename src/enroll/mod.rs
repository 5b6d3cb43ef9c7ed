//! Rate-limited enrollment
//!
//! The [`EnrollmentExecutor`] walks a course list against one
//! [`ValidatedSession`](crate::session::ValidatedSession), pacing calls per
//! [`RateLimitPolicy`] and mapping every response to an
//! [`EnrollmentOutcome`](crate::types::EnrollmentOutcome).

pub mod classify;
pub mod executor;
pub mod policy;

pub use classify::{Verdict, classify};
pub use executor::EnrollmentExecutor;
pub use policy::RateLimitPolicy;
