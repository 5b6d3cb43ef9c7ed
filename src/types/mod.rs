//! Type definitions for the enroller
//!
//! This module contains the data model shared by every pipeline stage.

pub mod browser;
pub mod course;
pub mod outcome;
pub mod serde_helpers;

pub use browser::{
    BrowserDescriptor, CookieFamily, DetectedBrowser, PathHint, PathRoot, Platform, PlatformDirs,
};
pub use course::{CourseKey, CourseRecord, RawCourse};
pub use outcome::{EnrollmentOutcome, EnrollmentStatus};
